use thiserror::Error;

use shared_api::ApiError;
use shared_models::{AppError, Role};

#[derive(Error, Debug)]
pub enum QueueSyncError {
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connect timed out after {timeout_ms} ms")]
    ConnectTimeout { timeout_ms: u64 },

    #[error("Channel resolution failed: {0}")]
    ChannelResolution(String),

    #[error("Backend request failed: {0}")]
    Api(#[from] ApiError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for QueueSyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        QueueSyncError::Transport(err.to_string())
    }
}

impl QueueSyncError {
    /// Map an error raised while mounting a view onto the view-level
    /// taxonomy for a viewer of `role`.
    pub fn into_app_error(self, role: Role) -> AppError {
        match self {
            QueueSyncError::Api(err) if err.is_auth() => AppError::auth_required(role.sign_in_route()),
            QueueSyncError::ChannelResolution(msg) => AppError::ChannelResolution(msg),
            QueueSyncError::Api(err) => AppError::ChannelResolution(err.to_string()),
            QueueSyncError::Serialization(err) => AppError::Internal(err.to_string()),
            other => AppError::Transport(other.to_string()),
        }
    }
}
