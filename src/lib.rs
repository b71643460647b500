pub mod app;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod remote;
pub mod state;
pub mod sync;
pub mod vault;

#[cfg(feature = "keyring-store")]
pub mod keyring;
