//! Local vault — encrypted secret storage.
//!
//! This module provides:
//! - `Secret`, `SecretListItem` and legacy types (`secret`)
//! - Binary vault file format (`format`)
//! - Synchronous file-backed `VaultStore` (`store`)
//! - The async `VaultGateway` seam the rest of the crate talks to,
//!   and its file implementation `FileVault` (`gateway`)

pub mod format;
pub mod gateway;
pub mod secret;
pub mod store;

pub use gateway::{FileVault, VaultGateway};
pub use secret::{
    is_legacy_secret, migrate_legacy_secret, LegacyListItem, LegacySecret, Secret,
    SecretListItem, SecretMetadata, SecretType, SyncStatus,
};
pub use store::VaultStore;
