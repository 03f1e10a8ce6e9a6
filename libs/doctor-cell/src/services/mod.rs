pub mod completion;
pub mod queue_view;
pub mod schedule;
pub mod waiting_list;

pub use completion::CompletionAction;
pub use queue_view::DoctorQueueView;
pub use schedule::ScheduleService;
pub use waiting_list::{reconcile_counter, WaitingListService};
