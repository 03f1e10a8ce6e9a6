use tracing::{debug, instrument, warn};

use shared_api::BackendClient;
use shared_models::Role;

use crate::error::QueueSyncError;
use crate::models::{AppointmentQueue, ChannelId, ChannelResolution, CounterState, RouteParams};

/// Works out which doctor channel a viewer observes.
#[derive(Clone)]
pub struct ChannelResolver {
    client: BackendClient,
}

impl ChannelResolver {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, auth_token))]
    pub async fn resolve(
        &self,
        role: Role,
        route: RouteParams,
        auth_token: &str,
    ) -> Result<ChannelResolution, QueueSyncError> {
        match role {
            Role::Doctor => {
                let doctor_id = route.doctor_id.ok_or_else(|| {
                    QueueSyncError::ChannelResolution("doctor id missing from route".to_string())
                })?;
                debug!("Doctor {} observes its own channel", doctor_id);

                Ok(ChannelResolution {
                    channel: ChannelId(doctor_id),
                    viewer_position: None,
                    initial_counter: None,
                    appointment: None,
                })
            }
            Role::Patient => {
                let appointment_id = route.appointment_id.ok_or_else(|| {
                    QueueSyncError::ChannelResolution("appointment id missing from route".to_string())
                })?;
                let appointment = self.fetch_appointment_queue(appointment_id, auth_token).await?;

                if let Some(route_doctor) = route.doctor_id {
                    if route_doctor != appointment.doctor_id {
                        warn!(
                            "Route doctor {} differs from appointment doctor {}, using the appointment",
                            route_doctor, appointment.doctor_id
                        );
                    }
                }

                Ok(ChannelResolution {
                    channel: ChannelId(appointment.doctor_id),
                    viewer_position: Some(appointment.queue_number),
                    initial_counter: Some(CounterState::from_snapshot(appointment.current_queue)),
                    appointment: Some(appointment),
                })
            }
            Role::Staff => Err(QueueSyncError::ChannelResolution(
                "staff accounts have no queue channel".to_string(),
            )),
        }
    }

    pub async fn fetch_appointment_queue(
        &self,
        appointment_id: i64,
        auth_token: &str,
    ) -> Result<AppointmentQueue, QueueSyncError> {
        let path = format!("/patient/appointment/{}/queue", appointment_id);

        match self.client.get::<AppointmentQueue>(&path, Some(auth_token)).await {
            Ok(appointment) => {
                debug!(
                    "Appointment {} holds position {} with doctor {}",
                    appointment_id, appointment.queue_number, appointment.doctor_id
                );
                Ok(appointment)
            }
            Err(e) if e.is_auth() => Err(QueueSyncError::Api(e)),
            Err(e) => {
                warn!("Queue lookup for appointment {} failed: {}", appointment_id, e);
                Err(QueueSyncError::ChannelResolution(format!(
                    "appointment {} has no queue: {}",
                    appointment_id, e
                )))
            }
        }
    }
}
