use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// 401, or a 403 from a request the token did not cover.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::Forbidden(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Forbidden(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}
