use tracing::{debug, instrument};

use queue_sync_cell::CounterState;
use shared_api::BackendClient;

use crate::error::DoctorQueueError;
use crate::models::WaitingEntry;

pub struct WaitingListService {
    client: BackendClient,
}

impl WaitingListService {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Patients still queued for `schedule_id`, ordered by queue number.
    #[instrument(skip(self, auth_token))]
    pub async fn fetch_waiting(
        &self,
        schedule_id: i64,
        auth_token: &str,
    ) -> Result<Vec<WaitingEntry>, DoctorQueueError> {
        let path = format!("/doctor/queue?scheduleId={}&status=QUEUED", schedule_id);
        let mut entries: Vec<WaitingEntry> = self.client.get(&path, Some(auth_token)).await?;

        entries.sort_by_key(|entry| entry.queue_number);
        debug!("Schedule {} has {} queued patients", schedule_id, entries.len());
        Ok(entries)
    }
}

/// Counter to show after a waiting-list refresh.
///
/// An empty list means nobody is left to serve. A queue that has not
/// started but already has patients points at the first of them.
pub fn reconcile_counter(counter: Option<CounterState>, waiting: &[WaitingEntry]) -> Option<CounterState> {
    let Some(first) = waiting.first() else {
        return Some(CounterState::NotStarted);
    };

    match counter {
        None | Some(CounterState::NotStarted) => Some(CounterState::Serving(first.queue_number)),
        started => started,
    }
}
