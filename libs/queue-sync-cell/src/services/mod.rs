pub mod context;
pub mod resolver;
pub mod stomp;
pub mod subscription;
pub mod transport;
pub mod view_model;

pub use context::*;
pub use resolver::*;
pub use stomp::*;
pub use subscription::*;
pub use transport::*;
pub use view_model::*;
