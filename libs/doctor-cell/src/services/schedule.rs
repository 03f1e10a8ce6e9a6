use tracing::{debug, instrument};

use shared_api::{ApiError, BackendClient};

use crate::error::DoctorQueueError;
use crate::models::Schedule;

pub struct ScheduleService {
    client: BackendClient,
}

impl ScheduleService {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// The doctor's schedules, oldest first. The backend answers 400 when
    /// a doctor has none; that is an empty list here.
    #[instrument(skip(self, auth_token))]
    pub async fn list_schedules(
        &self,
        doctor_id: i64,
        auth_token: &str,
    ) -> Result<Vec<Schedule>, DoctorQueueError> {
        let path = format!("/doctor/{}/schedules", doctor_id);

        let mut schedules: Vec<Schedule> = match self.client.get(&path, Some(auth_token)).await {
            Ok(schedules) => schedules,
            Err(ApiError::Status { status: 400, body }) => {
                debug!("No schedules for doctor {}: {}", doctor_id, body);
                Vec::new()
            }
            Err(ApiError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        schedules.sort_by(|a, b| (a.date, &a.start_time).cmp(&(b.date, &b.start_time)));
        debug!("Doctor {} has {} schedules", doctor_id, schedules.len());
        Ok(schedules)
    }
}
