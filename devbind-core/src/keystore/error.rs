//! Key store error types

use thiserror::Error;

/// Errors that can occur while managing bound keys.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// No key is stored under the alias
    #[error("No key stored under alias {0}")]
    NotFound(String),

    /// The alias was re-generated since the handle was issued
    #[error("Key under alias {0} was replaced")]
    KeyMismatch(String),

    /// Stored key material could not be decoded
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}
