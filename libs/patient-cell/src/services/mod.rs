pub mod queue_view;

pub use queue_view::*;
