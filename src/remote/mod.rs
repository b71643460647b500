//! Remote secret store access.

pub mod client;
pub mod identity;
pub mod types;

pub use client::{RemoteClient, RemoteConfig, RemoteStore, TOKEN_HEADER};
pub use identity::{is_valid_identity_token, IdentitySource, StaticIdentity, StoredIdentity};
pub use types::{RemoteMetadata, RemoteSecret, TokenInfo};
