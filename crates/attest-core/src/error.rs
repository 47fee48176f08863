//! Error types for manifest generation and verification.

use std::path::Path;

/// Attestation errors.
///
/// Per-file integrity failures are not errors: they are accumulated in a
/// [`crate::verify::VerifyReport`] so every entry gets checked.
#[derive(Debug, thiserror::Error)]
pub enum AttestError {
    /// Bad flag value, named-but-empty env var, malformed config file.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Required input (manifest, signature, key file) is missing.
    #[error("{message}")]
    Precondition { message: String },

    /// Signing failed or the signature did not verify.
    #[error("{reason}")]
    Crypto { reason: String },

    /// I/O failure outside the per-file integrity checks.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AttestError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub(crate) fn crypto(reason: impl Into<String>) -> Self {
        Self::Crypto {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn missing_file(what: &str, path: &Path, hint: &str) -> Self {
        Self::precondition(format!("{what} not found: {} ({hint})", path.display()))
    }

    /// Exit code for CLI.
    ///
    /// Failure kinds are distinguished by message only.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. }
            | Self::Precondition { .. }
            | Self::Crypto { .. }
            | Self::Io { .. } => 1,
        }
    }
}

/// Context line for a failed read.
pub(crate) fn read_context(what: &str, path: &Path) -> String {
    format!("failed to read {what}: {}", path.display())
}

/// Result type for attestation operations.
pub type AttestResult<T> = Result<T, AttestError>;
