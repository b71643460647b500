//! Cryptographic primitives for the local vault.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption with associated data (`encryption`)
//! - Argon2id password-based key derivation (`kdf`)
//! - HKDF-based per-secret key and verifier key derivation (`keys`)

pub mod encryption;
pub mod kdf;
pub mod keys;

pub use encryption::{decrypt, encrypt};
pub use kdf::{derive_master_key_with_params, generate_salt, Argon2Params};
pub use keys::{derive_secret_key, derive_verifier_key, MasterKey};
