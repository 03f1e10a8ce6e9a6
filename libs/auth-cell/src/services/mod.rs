pub mod identity;
pub mod store;

pub use identity::IdentityProvider;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
