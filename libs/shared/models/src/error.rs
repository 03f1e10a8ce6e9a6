use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Authentication required, sign in at {sign_in_route}")]
    AuthRequired { sign_in_route: String },

    #[error("Queue unavailable: {0}")]
    ChannelResolution(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Action failed: {0}")]
    Action(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Terminal errors end the current view instead of being retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppError::AuthRequired { .. } | AppError::ChannelResolution(_))
    }

    pub fn auth_required(route: &str) -> Self {
        tracing::debug!("Redirecting unauthenticated viewer to {}", route);
        AppError::AuthRequired {
            sign_in_route: route.to_string(),
        }
    }
}
