use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use queue_sync_cell::{ConnectionState, CounterState};

/// One consultation session from `GET /doctor/{doctorId}/schedules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub schedule_id: i64,
    #[serde(default)]
    pub doctor_id: Option<i64>,
    pub date: NaiveDate,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl Schedule {
    pub fn label(&self) -> String {
        match &self.end_time {
            Some(end) => format!("{} {}-{}", self.date, self.start_time, end),
            None => format!("{} - {}", self.date, self.start_time),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[serde(default)]
    pub profile_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingAppointment {
    #[serde(default)]
    pub appointment_id: Option<i64>,
    #[serde(default)]
    pub patient: Option<PatientSummary>,
}

/// A queued patient from `GET /doctor/queue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingEntry {
    pub queue_number: u32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub appointment: Option<WaitingAppointment>,
}

impl WaitingEntry {
    pub fn patient_name(&self) -> &str {
        self.appointment
            .as_ref()
            .and_then(|appointment| appointment.patient.as_ref())
            .and_then(|patient| patient.profile_name.as_deref())
            .unwrap_or("Unknown patient")
    }
}

/// Everything the doctor queue screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct DoctorQueueSnapshot {
    pub doctor_id: i64,
    pub schedules: Vec<Schedule>,
    pub selected_schedule: Option<i64>,
    pub counter: Option<CounterState>,
    pub current_patient: Option<WaitingEntry>,
    pub waiting: Vec<WaitingEntry>,
    pub connection: ConnectionState,
    pub stale: bool,
    pub can_complete: bool,
    pub completion_pending: bool,
    pub notice: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiting_entry_decodes_nested_patient() {
        let entry: WaitingEntry = serde_json::from_str(
            r#"{"queueId":4,"queueNumber":3,"status":"QUEUED",
                "appointment":{"appointmentId":9,"patient":{"profileName":"Nimal Silva"}}}"#,
        )
        .unwrap();

        assert_eq!(entry.queue_number, 3);
        assert_eq!(entry.patient_name(), "Nimal Silva");
    }

    #[test]
    fn test_waiting_entry_without_patient_has_placeholder_name() {
        let entry: WaitingEntry = serde_json::from_str(r#"{"queueNumber":1}"#).unwrap();
        assert_eq!(entry.patient_name(), "Unknown patient");
    }

    #[test]
    fn test_schedule_label() {
        let schedule: Schedule = serde_json::from_str(
            r#"{"scheduleId":2,"doctorId":7,"date":"2025-06-01","startTime":"09:00"}"#,
        )
        .unwrap();
        assert_eq!(schedule.label(), "2025-06-01 - 09:00");
    }
}
