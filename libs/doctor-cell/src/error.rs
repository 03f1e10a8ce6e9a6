use thiserror::Error;

use shared_api::ApiError;
use shared_models::{AppError, Role};

#[derive(Error, Debug)]
pub enum DoctorQueueError {
    #[error("No patient is being served")]
    Unavailable,

    #[error("A completion is already waiting for the queue to advance")]
    InFlight,

    #[error("No schedule selected")]
    NoScheduleSelected,

    #[error("Unknown schedule {0}")]
    UnknownSchedule(i64),

    #[error("Backend request failed: {0}")]
    Api(#[from] ApiError),
}

impl From<DoctorQueueError> for AppError {
    fn from(err: DoctorQueueError) -> Self {
        match err {
            DoctorQueueError::Api(ApiError::Unauthorized(_)) => {
                AppError::auth_required(Role::Doctor.sign_in_route())
            }
            other => AppError::Action(other.to_string()),
        }
    }
}
