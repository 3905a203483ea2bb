use std::path::PathBuf;

/// All domain errors for Keydrop.
///
/// Each variant carries enough context to tell the user what went wrong
/// with the bytes they dropped, without needing a debugger.
#[derive(Debug, thiserror::Error)]
pub enum KeydropError {
    #[error(
        "No applicable interpretation for this input\n\n  \
         The data is not a key, a revocation certificate or a message, and the\n  \
         current view cannot encrypt or sign it.\n  \
         Open a keyring with encryption keys, or unlock a private key first."
    )]
    NoInterpretation,

    #[error("Parse error: {reason}")]
    Parse { reason: String },

    #[error("Verification failed: {reason}")]
    Verification { reason: String },

    #[error(
        "Private key is locked\n\n  \
         Unlock it first: keydrop open <fragment> --passphrase <passphrase>"
    )]
    KeyLocked,

    #[error(
        "Invalid fragment '{fragment}': {reason}\n\n  \
         Expected one of:\n    \
         → an empty fragment (empty keyring)\n    \
         → '#.' (new key pair)\n    \
         → '#/path/to/file' (fetch from the configured base URL)\n    \
         → '#<base64url>' (inline keys)"
    )]
    Routing { fragment: String, reason: String },

    #[error("OpenPGP operation failed: {reason}")]
    Provider { reason: String },

    #[error("Fetching {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error(
        "Invalid key request: {detail}\n\n  \
         Name, email and passphrase are required, and the email must look\n  \
         like user@example.org."
    )]
    InvalidKeyRequest { detail: String },

    #[error("Nothing can be dropped here: the current view accepts no files")]
    NoHandler,

    #[error(
        "No private key is open\n\n  \
         Open one first: keydrop key <fragment> ..."
    )]
    NoPrivateKey,

    #[error("The keyring queue has shut down")]
    QueueClosed,

    #[error("Invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    #[error(
        "File not found: {path}\n\n  \
         Check that the path is correct and the file exists."
    )]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KeydropError {
    /// Wrap an opaque failure reported by the cryptographic provider.
    pub fn provider(reason: impl std::fmt::Display) -> Self {
        Self::Provider {
            reason: reason.to_string(),
        }
    }

    /// Wrap a failure to interpret input bytes.
    pub fn parse(reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KeydropError>;
