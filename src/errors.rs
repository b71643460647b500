use thiserror::Error;

/// All errors that can occur in VaultSync.
#[derive(Debug, Error)]
pub enum VaultSyncError {
    // --- Sync / remote errors ---
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote secret store is unreachable: {0}")]
    Connectivity(String),

    #[error("Remote request failed: {0}")]
    Fetch(String),

    #[error("Failed to write secret '{id}' to the local vault: {message}")]
    Write { id: String, message: String },

    #[error("Unrecognized secret format: {0}")]
    LegacyFormat(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong password or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Vault errors ---
    #[error("Vault is not initialized — run `vaultsync init` first")]
    VaultNotInitialized,

    #[error("Vault is already initialized")]
    VaultAlreadyInitialized,

    #[error("Invalid vault format: {0}")]
    InvalidVaultFormat(String),

    #[error("Wrong master password")]
    WrongPassword,

    #[error("Secret '{0}' not found")]
    SecretNotFound(String),

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    // --- Keyring errors ---
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

/// Coarse classification of a [`VaultSyncError`] so callers can branch
/// on the kind of failure instead of matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Connectivity,
    Fetch,
    Write,
    LegacyFormat,
    Vault,
    Config,
    Io,
}

impl VaultSyncError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) => ErrorKind::Auth,
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Write { .. } => ErrorKind::Write,
            Self::LegacyFormat(_) => ErrorKind::LegacyFormat,
            Self::EncryptionFailed(_)
            | Self::DecryptionFailed
            | Self::KeyDerivationFailed(_)
            | Self::VaultNotInitialized
            | Self::VaultAlreadyInitialized
            | Self::InvalidVaultFormat(_)
            | Self::WrongPassword
            | Self::SecretNotFound(_)
            | Self::InvalidSecret(_)
            | Self::SerializationError(_) => ErrorKind::Vault,
            Self::KeyringError(_) | Self::ConfigError(_) | Self::CommandFailed(_) => {
                ErrorKind::Config
            }
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<reqwest::Error> for VaultSyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            VaultSyncError::Connectivity(e.to_string())
        } else {
            VaultSyncError::Fetch(e.to_string())
        }
    }
}

/// Convenience type alias for VaultSync results.
pub type Result<T> = std::result::Result<T, VaultSyncError>;
