use thiserror::Error;

use shared_models::AppError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Internal(err.to_string())
    }
}
