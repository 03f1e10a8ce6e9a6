pub mod error;
pub mod guard;
pub mod services;

pub use error::*;
pub use guard::*;
pub use services::*;
