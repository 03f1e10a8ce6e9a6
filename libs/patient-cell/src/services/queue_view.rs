use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};

use auth_cell::{require_role, IdentityProvider};
use queue_sync_cell::{
    AppointmentQueue, ConnectionState, CounterState, LiveCounterSubscription, QueueContext,
    QueueStatus, QueueViewModel, RouteParams, ViewChange,
};
use shared_models::{AppError, Role, Session};

use crate::models::PatientQueueSnapshot;

/// A mounted patient queue screen for one appointment.
///
/// Counter events and connection changes are queued by the subscription and
/// applied to the view model only inside [`PatientQueueView::next_change`],
/// so all state changes happen on the caller's task.
pub struct PatientQueueView {
    appointment_id: i64,
    appointment: AppointmentQueue,
    model: QueueViewModel,
    subscription: LiveCounterSubscription,
    counters: mpsc::UnboundedReceiver<CounterState>,
    connection: watch::Receiver<ConnectionState>,
    identity: watch::Receiver<Option<Session>>,
    mounted: bool,
}

impl PatientQueueView {
    #[instrument(skip(ctx, identity))]
    pub async fn mount(
        ctx: &QueueContext,
        identity: Arc<IdentityProvider>,
        appointment_id: i64,
    ) -> Result<Self, AppError> {
        let session = require_role(&identity, Role::Patient)?;

        let resolution = ctx
            .resolver()
            .resolve(Role::Patient, RouteParams::patient(appointment_id), &session.token)
            .await
            .map_err(|e| e.into_app_error(Role::Patient))?;

        let (viewer, appointment) = match (resolution.viewer_position, resolution.appointment) {
            (Some(viewer), Some(appointment)) => (viewer, appointment),
            _ => {
                return Err(AppError::ChannelResolution(format!(
                    "appointment {} has no queue position",
                    appointment_id
                )))
            }
        };

        let mut model = QueueViewModel::new(Some(viewer));
        if let Some(initial) = resolution.initial_counter {
            model.apply_counter(initial);
        }

        let mut subscription = ctx.subscription();
        let (tx, counters) = mpsc::unbounded_channel();
        subscription.on_update(move |counter| {
            let _ = tx.send(counter);
        });
        let connection = subscription.watch_connection();
        subscription.open(resolution.channel).await;

        let mut identity_rx = identity.subscribe();
        identity_rx.borrow_and_update();

        info!(
            "Patient view mounted for appointment {} (position {}, doctor {})",
            appointment_id, viewer, resolution.channel
        );

        Ok(Self {
            appointment_id,
            appointment,
            model,
            subscription,
            counters,
            connection,
            identity: identity_rx,
            mounted: true,
        })
    }

    pub fn snapshot(&self) -> PatientQueueSnapshot {
        let viewer_position = self.model.viewer().unwrap_or(self.appointment.queue_number);
        let status = self.model.status().unwrap_or(QueueStatus::Loading);

        PatientQueueSnapshot {
            appointment_id: self.appointment_id,
            doctor_id: self.appointment.doctor_id,
            doctor_name: self.appointment.doctor_name.clone(),
            viewer_position,
            counter: self.model.counter(),
            connection: self.model.connection(),
            stale: self.model.is_stale(),
            status,
            status_message: status.message(),
            window: self.model.window(),
        }
    }

    /// Wait for the next thing the screen should react to. Returns `None`
    /// once the view is unmounted.
    pub async fn next_change(&mut self) -> Option<ViewChange<PatientQueueSnapshot>> {
        while self.mounted {
            tokio::select! {
                Some(counter) = self.counters.recv() => {
                    self.model.apply_counter(counter);
                    debug!("Appointment {} sees counter {}", self.appointment_id, counter);
                    return Some(ViewChange::Updated(self.snapshot()));
                }
                Ok(()) = self.connection.changed() => {
                    let state = *self.connection.borrow_and_update();
                    if self.model.apply_connection(state) {
                        return Some(ViewChange::Updated(self.snapshot()));
                    }
                }
                Ok(()) = self.identity.changed() => {
                    let still_patient = self
                        .identity
                        .borrow_and_update()
                        .as_ref()
                        .is_some_and(|session| session.role() == Role::Patient);
                    if !still_patient {
                        info!("Patient signed out, leaving queue view");
                        self.unmount().await;
                        return Some(ViewChange::SignedOut {
                            sign_in_route: Role::Patient.sign_in_route().to_string(),
                        });
                    }
                }
                else => break,
            }
        }
        None
    }

    pub async fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.subscription.close().await;
        info!("Patient view unmounted for appointment {}", self.appointment_id);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }
}
