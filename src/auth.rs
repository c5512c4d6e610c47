//! Auth mechanisms, credentials, providers, and the lazy credential cache.

pub mod cache;
pub mod credential;
pub mod mechanism;
pub mod provider;
pub mod secret;

pub use cache::*;
pub use credential::*;
pub use mechanism::*;
pub use provider::*;
pub use secret::*;
