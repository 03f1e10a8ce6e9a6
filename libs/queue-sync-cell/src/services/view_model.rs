use tracing::{debug, warn};

use crate::models::{ConnectionState, CounterState, QueueStatus, SlotKind, WindowSlot};

const WINDOW_BEHIND: i64 = 3;
const WINDOW_AHEAD_OF_VIEWER: i64 = 3;
const WINDOW_AHEAD_OF_CURRENT: i64 = 5;

/// Classify the viewer's place in the queue. First matching rule wins.
pub fn derive_status(
    counter: Option<CounterState>,
    viewer: u32,
    connection: ConnectionState,
) -> QueueStatus {
    let Some(counter) = counter else {
        debug!("No counter received yet ({})", connection);
        return QueueStatus::Loading;
    };

    match counter {
        CounterState::NotStarted => QueueStatus::NotStarted,
        CounterState::Serving(current) if viewer == current => QueueStatus::YourTurn,
        CounterState::Serving(current) if viewer > current => QueueStatus::Waiting {
            ahead: viewer - current,
        },
        CounterState::Serving(_) => QueueStatus::Completed,
    }
}

/// Positions around the counter and the viewer, oldest first.
///
/// The range runs from `max(1, current - 3)` to `max(viewer + 3, current + 5)`.
/// A viewer already served before that range is prepended as a lone slot, so
/// the window stays bounded however far the counter has moved on.
pub fn neighbor_window(counter: CounterState, viewer: u32) -> Vec<WindowSlot> {
    let current = counter.to_wire();
    let viewer = i64::from(viewer);

    let mut start = (current - WINDOW_BEHIND).max(1);
    if counter.is_started() {
        start = start.min(current);
    }
    let end = (viewer + WINDOW_AHEAD_OF_VIEWER).max(current + WINDOW_AHEAD_OF_CURRENT);

    let detached_viewer = (viewer < start).then_some(viewer);

    detached_viewer
        .into_iter()
        .chain(start..=end)
        .filter_map(|position| u32::try_from(position).ok())
        .map(|position| {
            let kind = match counter {
                CounterState::Serving(current) if position == current => SlotKind::Current,
                CounterState::Serving(current) if position < current => SlotKind::Completed,
                _ => SlotKind::Waiting,
            };
            WindowSlot {
                position,
                kind,
                is_viewer: i64::from(position) == viewer,
            }
        })
        .collect()
}

/// Latest counter and connection state for one view, plus the viewer's position.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueViewModel {
    viewer: Option<u32>,
    counter: Option<CounterState>,
    connection: ConnectionState,
}

impl QueueViewModel {
    pub fn new(viewer: Option<u32>) -> Self {
        Self {
            viewer,
            counter: None,
            connection: ConnectionState::Disconnected,
        }
    }

    /// Record a counter value. Returns whether anything changed.
    pub fn apply_counter(&mut self, next: CounterState) -> bool {
        if let (Some(CounterState::Serving(prev)), CounterState::Serving(value)) = (self.counter, next) {
            if value < prev {
                warn!("Counter moved backwards from {} to {}", prev, value);
            }
        }
        let changed = self.counter != Some(next);
        self.counter = Some(next);
        changed
    }

    pub fn apply_connection(&mut self, next: ConnectionState) -> bool {
        let changed = self.connection != next;
        self.connection = next;
        changed
    }

    pub fn viewer(&self) -> Option<u32> {
        self.viewer
    }

    pub fn counter(&self) -> Option<CounterState> {
        self.counter
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// `None` for viewers without a position of their own.
    pub fn status(&self) -> Option<QueueStatus> {
        self.viewer
            .map(|viewer| derive_status(self.counter, viewer, self.connection))
    }

    pub fn window(&self) -> Vec<WindowSlot> {
        match (self.counter, self.viewer) {
            (Some(counter), Some(viewer)) => neighbor_window(counter, viewer),
            _ => Vec::new(),
        }
    }

    /// A value is on screen but the stream behind it is not live.
    pub fn is_stale(&self) -> bool {
        self.counter.is_some() && !self.connection.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(window: &[WindowSlot]) -> Vec<u32> {
        window.iter().map(|slot| slot.position).collect()
    }

    #[test]
    fn test_status_rules() {
        let connected = ConnectionState::Connected;
        assert_eq!(derive_status(None, 5, ConnectionState::Connecting), QueueStatus::Loading);
        assert_eq!(derive_status(None, 5, connected), QueueStatus::Loading);
        assert_eq!(derive_status(Some(CounterState::NotStarted), 5, connected), QueueStatus::NotStarted);
        assert_eq!(derive_status(Some(CounterState::Serving(5)), 5, connected), QueueStatus::YourTurn);
        assert_eq!(
            derive_status(Some(CounterState::Serving(24)), 28, connected),
            QueueStatus::Waiting { ahead: 4 }
        );
        assert_eq!(derive_status(Some(CounterState::Serving(9)), 5, connected), QueueStatus::Completed);
    }

    #[test]
    fn test_known_counter_survives_disconnect() {
        assert_eq!(
            derive_status(Some(CounterState::Serving(15)), 20, ConnectionState::Error),
            QueueStatus::Waiting { ahead: 5 }
        );
    }

    #[test]
    fn test_window_for_waiting_viewer() {
        let window = neighbor_window(CounterState::Serving(24), 28);

        assert_eq!(positions(&window), (21..=31).collect::<Vec<_>>());
        let current = window.iter().find(|slot| slot.position == 24).unwrap();
        assert_eq!(current.kind, SlotKind::Current);
        let viewer = window.iter().find(|slot| slot.is_viewer).unwrap();
        assert_eq!(viewer.position, 28);
        assert_eq!(viewer.kind, SlotKind::Waiting);
        assert!(window.iter().filter(|slot| slot.position < 24).all(|slot| slot.kind == SlotKind::Completed));
    }

    #[test]
    fn test_window_far_behind_viewer_extends_end() {
        let window = neighbor_window(CounterState::Serving(2), 20);
        assert_eq!(window.first().unwrap().position, 1);
        assert_eq!(window.last().unwrap().position, 23);
    }

    #[test]
    fn test_window_includes_viewer_already_served() {
        let window = neighbor_window(CounterState::Serving(30), 4);
        assert_eq!(positions(&window), vec![4, 27, 28, 29, 30, 31, 32, 33, 34, 35]);
        assert!(window.iter().any(|slot| slot.is_viewer && slot.kind == SlotKind::Completed));
        assert!(window.iter().any(|slot| slot.position == 30 && slot.kind == SlotKind::Current));
    }

    #[test]
    fn test_window_stays_bounded_for_long_served_viewer() {
        let window = neighbor_window(CounterState::Serving(100_000), 1);

        assert_eq!(window.len(), 10);
        assert_eq!(window[0].position, 1);
        assert!(window[0].is_viewer);
        assert_eq!(window[0].kind, SlotKind::Completed);
        assert_eq!(window[1].position, 99_997);
        assert_eq!(window.last().unwrap().position, 100_005);
    }

    #[test]
    fn test_window_not_started_has_no_current_slot() {
        let window = neighbor_window(CounterState::NotStarted, 2);
        assert_eq!(positions(&window), vec![1, 2, 3, 4, 5]);
        assert!(window.iter().all(|slot| slot.kind == SlotKind::Waiting));
    }

    #[test]
    fn test_window_counter_at_zero_is_included() {
        let window = neighbor_window(CounterState::Serving(0), 1);
        assert_eq!(window.first().unwrap().position, 0);
        assert_eq!(window.first().unwrap().kind, SlotKind::Current);
    }

    #[test]
    fn test_window_always_contains_viewer_and_current() {
        for current in 0..40u32 {
            for viewer in 1..40u32 {
                let window = neighbor_window(CounterState::Serving(current), viewer);
                assert!(window.iter().any(|slot| slot.position == viewer && slot.is_viewer));
                assert!(window.iter().any(|slot| slot.position == current && slot.kind == SlotKind::Current));
            }
        }
    }

    #[test]
    fn test_view_model_transitions() {
        let mut model = QueueViewModel::new(Some(10));
        assert_eq!(model.status(), Some(QueueStatus::Loading));

        model.apply_connection(ConnectionState::Connected);
        assert!(model.apply_counter(CounterState::Serving(8)));
        assert_eq!(model.status(), Some(QueueStatus::Waiting { ahead: 2 }));

        assert!(model.apply_counter(CounterState::Serving(10)));
        assert_eq!(model.status(), Some(QueueStatus::YourTurn));

        assert!(model.apply_counter(CounterState::NotStarted));
        assert_eq!(model.status(), Some(QueueStatus::NotStarted));
    }

    #[test]
    fn test_view_model_stale_keeps_value() {
        let mut model = QueueViewModel::new(Some(20));
        model.apply_connection(ConnectionState::Connected);
        model.apply_counter(CounterState::Serving(15));
        assert!(!model.is_stale());

        model.apply_connection(ConnectionState::Error);
        assert!(model.is_stale());
        assert_eq!(model.counter(), Some(CounterState::Serving(15)));
    }

    #[test]
    fn test_view_model_accepts_backward_jump() {
        let mut model = QueueViewModel::new(Some(5));
        model.apply_counter(CounterState::Serving(9));
        assert!(model.apply_counter(CounterState::Serving(3)));
        assert_eq!(model.status(), Some(QueueStatus::Waiting { ahead: 2 }));
    }

    #[test]
    fn test_doctor_view_model_has_no_status() {
        let mut model = QueueViewModel::new(None);
        model.apply_counter(CounterState::Serving(3));
        assert_eq!(model.status(), None);
        assert!(model.window().is_empty());
    }
}
