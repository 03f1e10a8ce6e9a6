use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire value the backend uses for a queue that has not started.
pub const NOT_STARTED_WIRE: i64 = -1;

/// One doctor's queue stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChannelId {
    fn from(doctor_id: i64) -> Self {
        ChannelId(doctor_id)
    }
}

/// The position currently being served on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterState {
    NotStarted,
    Serving(u32),
}

impl CounterState {
    /// Decode a pushed counter value. Any negative value is the sentinel.
    pub fn from_wire(value: i64) -> Self {
        if value < 0 {
            CounterState::NotStarted
        } else {
            CounterState::Serving(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }

    /// Decode the counter carried by the initial appointment snapshot,
    /// where a missing or zero value also means the queue has not started.
    pub fn from_snapshot(value: Option<i64>) -> Self {
        match value {
            Some(v) if v > 0 => Self::from_wire(v),
            _ => CounterState::NotStarted,
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            CounterState::NotStarted => NOT_STARTED_WIRE,
            CounterState::Serving(position) => i64::from(position),
        }
    }

    pub fn position(self) -> Option<u32> {
        match self {
            CounterState::NotStarted => None,
            CounterState::Serving(position) => Some(position),
        }
    }

    pub fn is_started(self) -> bool {
        matches!(self, CounterState::Serving(_))
    }
}

impl fmt::Display for CounterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterState::NotStarted => f.write_str("-"),
            CounterState::Serving(position) => write!(f, "{}", position),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Body of a message on `queue-updates/{doctorId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueUpdate {
    #[serde(default)]
    pub doctor_id: Option<i64>,
    pub current_queue_number: i64,
    #[serde(default)]
    pub message: Option<String>,
}

impl QueueUpdate {
    pub fn counter(&self) -> CounterState {
        CounterState::from_wire(self.current_queue_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    Loading,
    NotStarted,
    Waiting { ahead: u32 },
    YourTurn,
    Completed,
}

impl QueueStatus {
    pub fn message(&self) -> String {
        match self {
            QueueStatus::Loading => "Loading queue status...".to_string(),
            QueueStatus::NotStarted => "Not started yet".to_string(),
            QueueStatus::Waiting { ahead } => format!("Patients ahead: {}", ahead),
            QueueStatus::YourTurn => "It's your turn!".to_string(),
            QueueStatus::Completed => "Your consultation is completed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Completed,
    Current,
    Waiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSlot {
    pub position: u32,
    pub kind: SlotKind,
    pub is_viewer: bool,
}

/// Route parameters a view was opened with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteParams {
    pub doctor_id: Option<i64>,
    pub appointment_id: Option<i64>,
}

impl RouteParams {
    pub fn patient(appointment_id: i64) -> Self {
        Self {
            doctor_id: None,
            appointment_id: Some(appointment_id),
        }
    }

    pub fn doctor(doctor_id: i64) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            appointment_id: None,
        }
    }
}

/// Patient-facing queue snapshot from `GET /patient/appointment/{id}/queue`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentQueue {
    pub queue_number: u32,
    pub doctor_id: i64,
    #[serde(default)]
    pub current_queue: Option<i64>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub appointment_date_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelResolution {
    pub channel: ChannelId,
    pub viewer_position: Option<u32>,
    pub initial_counter: Option<CounterState>,
    pub appointment: Option<AppointmentQueue>,
}

/// What a mounted view reports to its host.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewChange<S> {
    Updated(S),
    SignedOut { sign_in_route: String },
}
