use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Remote source unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl SourceError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        // The cut must land on a char boundary; the body is server-supplied
        // and may be arbitrary UTF-8.
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        )
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => SourceError::Auth(truncated),
            404 => SourceError::TableNotFound(truncated),
            429 => SourceError::Unavailable("rate limited".to_string()),
            500..=599 => SourceError::Unavailable(truncated),
            _ => SourceError::InvalidResponse(format!("Status {status}: {truncated}")),
        }
    }
}
