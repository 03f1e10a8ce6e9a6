//! A fake clinic backend for whole-flow tests.
//!
//! HTTP endpoints are served by wiremock; the realtime side is an
//! [`InMemoryBroker`]. Completing a patient over HTTP advances the shared
//! counter and publishes it on the doctor's channel, the way the real
//! backend pushes after a completion.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use queue_sync_cell::test_support::InMemoryBroker;
use queue_sync_cell::{ChannelId, QueueContext};
use shared_config::AppConfig;
use shared_utils::test_utils::MockBackendResponses;

pub const DOCTOR_ID: i64 = 7;
pub const SCHEDULE_ID: i64 = 2;

#[derive(Clone)]
struct QueueState {
    current: Arc<AtomicI64>,
    finished: Arc<AtomicBool>,
    last_number: u32,
}

impl QueueState {
    fn current(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }
}

struct WaitingListResponder(QueueState);

impl Respond for WaitingListResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        if self.0.finished.load(Ordering::SeqCst) {
            return ResponseTemplate::new(200).set_body_json(json!([]));
        }
        let first = self.0.current().max(1) as u32;
        let names: Vec<String> = (first..=self.0.last_number).map(|n| format!("Patient {}", n)).collect();
        let entries: Vec<(u32, &str)> = (first..=self.0.last_number)
            .zip(names.iter().map(String::as_str))
            .collect();
        ResponseTemplate::new(200).set_body_json(MockBackendResponses::waiting_list_response(&entries))
    }
}

struct AppointmentResponder {
    state: QueueState,
    first_appointment_id: i64,
}

impl Respond for AppointmentResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let appointment_id = request
            .url
            .path_segments()
            .and_then(|mut segments| segments.nth(2))
            .and_then(|id| id.parse::<i64>().ok())
            .unwrap_or_default();
        let position = (appointment_id - self.first_appointment_id + 1).max(1) as u32;
        let current = self.state.current();

        ResponseTemplate::new(200).set_body_json(MockBackendResponses::appointment_queue_response(
            position,
            DOCTOR_ID,
            (current > 0).then_some(current),
        ))
    }
}

struct CompleteResponder {
    state: QueueState,
    broker: InMemoryBroker,
}

impl Respond for CompleteResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let current = self.state.current();
        let next = if current >= i64::from(self.state.last_number) { -1 } else { current + 1 };
        self.state.current.store(next, Ordering::SeqCst);
        self.state.finished.store(next < 0, Ordering::SeqCst);
        self.broker.publish(ChannelId(DOCTOR_ID), next);
        ResponseTemplate::new(200).set_body_string("Completed")
    }
}

/// One doctor, one schedule, patients `1..=last_number`, appointment ids
/// starting at 100 for patient 1.
pub struct FakeClinic {
    pub server: MockServer,
    pub broker: InMemoryBroker,
    state: QueueState,
}

impl FakeClinic {
    pub const FIRST_APPOINTMENT_ID: i64 = 100;

    pub async fn start(current: i64, last_number: u32) -> Self {
        let server = MockServer::start().await;
        let broker = InMemoryBroker::new();
        let state = QueueState {
            current: Arc::new(AtomicI64::new(current)),
            finished: Arc::new(AtomicBool::new(false)),
            last_number,
        };

        Mock::given(method("GET"))
            .and(path(format!("/doctor/{}/schedules", DOCTOR_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "scheduleId": SCHEDULE_ID, "doctorId": DOCTOR_ID, "date": "2025-06-01", "startTime": "09:00:00" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/doctor/queue"))
            .respond_with(WaitingListResponder(state.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/patient/appointment/\d+/queue$"))
            .respond_with(AppointmentResponder {
                state: state.clone(),
                first_appointment_id: Self::FIRST_APPOINTMENT_ID,
            })
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/doctor/complete/{}/{}", SCHEDULE_ID, DOCTOR_ID)))
            .respond_with(CompleteResponder {
                state: state.clone(),
                broker: broker.clone(),
            })
            .mount(&server)
            .await;

        Self { server, broker, state }
    }

    pub fn config(&self) -> AppConfig {
        AppConfig {
            backend_base_url: self.server.uri(),
            request_timeout: Duration::from_secs(2),
            reconnect_initial_backoff: Duration::from_millis(30),
            reconnect_max_backoff: Duration::from_millis(100),
            completion_pending_timeout: Duration::from_secs(5),
            token_poll_interval: Duration::from_millis(20),
            ..AppConfig::default()
        }
    }

    pub fn context(&self) -> QueueContext {
        QueueContext::with_connector(&self.config(), Arc::new(self.broker.clone()))
    }

    pub fn current(&self) -> i64 {
        self.state.current()
    }

    pub fn appointment_for(position: u32) -> i64 {
        Self::FIRST_APPOINTMENT_ID + i64::from(position) - 1
    }
}
