//! Application-facing stores consumed by the command line.

pub mod secrets;
pub mod sync_store;

pub use secrets::{SecretsSnapshot, SecretsStore};
pub use sync_store::{SyncStore, SyncStoreSnapshot};
