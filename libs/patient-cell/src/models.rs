use queue_sync_cell::{ConnectionState, CounterState, QueueStatus, WindowSlot};

/// Everything the patient queue screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientQueueSnapshot {
    pub appointment_id: i64,
    pub doctor_id: i64,
    pub doctor_name: Option<String>,
    pub viewer_position: u32,
    pub counter: Option<CounterState>,
    pub connection: ConnectionState,
    pub stale: bool,
    pub status: QueueStatus,
    pub status_message: String,
    pub window: Vec<WindowSlot>,
}

impl PatientQueueSnapshot {
    /// Counter as the screen shows it; `...` until the first value arrives.
    pub fn counter_label(&self) -> String {
        match self.counter {
            Some(counter) => counter.to_string(),
            None => "...".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(counter: Option<CounterState>) -> PatientQueueSnapshot {
        PatientQueueSnapshot {
            appointment_id: 1,
            doctor_id: 7,
            doctor_name: None,
            viewer_position: 3,
            counter,
            connection: ConnectionState::Connecting,
            stale: false,
            status: QueueStatus::Loading,
            status_message: QueueStatus::Loading.message(),
            window: Vec::new(),
        }
    }

    #[test]
    fn test_counter_label_before_and_after_first_value() {
        assert_eq!(snapshot(None).counter_label(), "...");
        assert_eq!(snapshot(Some(CounterState::Serving(12))).counter_label(), "12");
    }
}
