use std::time::Duration;

use reqwest::Method;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use queue_sync_cell::{ChannelId, CounterState};
use shared_api::BackendClient;

use crate::error::DoctorQueueError;

/// Doctor-only "complete current patient" command.
///
/// The backend gives no idempotency guarantee, so the action disables
/// itself from the moment a request is sent until the queue advances,
/// the request fails, or `pending_timeout` passes.
pub struct CompletionAction {
    client: BackendClient,
    pending_timeout: Duration,
    in_flight: Option<Instant>,
}

impl CompletionAction {
    pub fn new(client: BackendClient, pending_timeout: Duration) -> Self {
        Self {
            client,
            pending_timeout,
            in_flight: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight
            .is_some_and(|sent| sent.elapsed() < self.pending_timeout)
    }

    pub fn is_available(&self, counter: Option<CounterState>) -> bool {
        counter.is_some_and(CounterState::is_started) && !self.is_pending()
    }

    /// The queue moved; a pending completion has landed.
    pub fn acknowledge(&mut self) {
        if let Some(sent) = self.in_flight.take() {
            debug!("Completion acknowledged after {:?}", sent.elapsed());
        }
    }

    /// Forget a pending completion without it having landed.
    pub fn reset(&mut self) {
        if self.in_flight.take().is_some() {
            debug!("Pending completion dropped");
        }
    }

    #[instrument(skip(self, auth_token))]
    pub async fn complete(
        &mut self,
        channel: ChannelId,
        schedule_id: i64,
        counter: Option<CounterState>,
        auth_token: &str,
    ) -> Result<(), DoctorQueueError> {
        if !counter.is_some_and(CounterState::is_started) {
            return Err(DoctorQueueError::Unavailable);
        }
        if self.is_pending() {
            return Err(DoctorQueueError::InFlight);
        }

        self.in_flight = Some(Instant::now());
        let path = format!("/doctor/complete/{}/{}", schedule_id, channel);

        match self.client.send_command(Method::POST, &path, Some(auth_token)).await {
            Ok(()) => {
                info!("Completion sent for schedule {} on channel {}", schedule_id, channel);
                Ok(())
            }
            Err(e) => {
                self.in_flight = None;
                warn!("Completion for schedule {} rejected: {}", schedule_id, e);
                Err(e.into())
            }
        }
    }
}
