use thiserror::Error;

/// Classified failure of a backend operation.
///
/// Raw transport errors never cross this boundary: everything a caller sees
/// is one of these variants, and [`ApiError::user_message`] is the only
/// string that may reach the UI layer.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No matching item: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server rejected request: {0}")]
    Server(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            404 => ApiError::NotFound(truncated),
            400..=599 => ApiError::Server(format!("Status {}: {}", status, truncated)),
            _ => ApiError::Unknown(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Whether this is the domain-level "nothing there" signal. For the feed
    /// it marks exhaustion, not a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Short message safe to display to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NotFound(_) => "Nothing found".to_string(),
            ApiError::Network(_) => "Connection problem - check your network".to_string(),
            ApiError::Server(_) => "The server could not handle that - try again".to_string(),
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Unknown(_) => "Something went wrong - try again".to_string(),
        }
    }
}
