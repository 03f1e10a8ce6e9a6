pub mod models;
pub mod services;
pub mod error;
pub mod test_support;

pub use models::*;
pub use error::*;
pub use services::*;
