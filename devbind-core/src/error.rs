use thiserror::Error;

use crate::keystore::KeyStoreError;

/// Callback type tag this engine accepts.
pub const DEVICE_BINDING_CALLBACK: &str = "DeviceBindingCallback";

/// Upper bound on a callback payload accepted for parsing (64KB).
pub const MAX_CALLBACK_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum DevbindError {
    #[error("Invalid callback response: {0}")]
    InvalidCallbackResponse(String),

    #[error("Invalid assertion: {0}")]
    InvalidAssertion(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
}

impl DevbindError {
    pub(crate) fn invalid_callback(detail: impl Into<String>) -> Self {
        Self::InvalidCallbackResponse(detail.into())
    }

    pub(crate) fn invalid_assertion(detail: impl Into<String>) -> Self {
        Self::InvalidAssertion(detail.into())
    }
}

pub type Result<T> = std::result::Result<T, DevbindError>;
