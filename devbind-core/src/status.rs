//! Host-visible binding outcomes.

use thiserror::Error;

/// Message used when an unsupported outcome carries no detail.
pub const DEFAULT_UNSUPPORTED_MESSAGE: &str =
    "Device not supported. Please verify the biometric or PIN settings";

/// Terminal failure of a binding attempt.
///
/// Each variant maps to the client error code written into the callback's
/// `clientError` slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceBindingStatus {
    #[error("Authentication timed out")]
    Timeout,

    #[error("User terminated the authentication")]
    Abort,

    #[error("{}", .0.as_deref().unwrap_or(DEFAULT_UNSUPPORTED_MESSAGE))]
    Unsupported(Option<String>),
}

impl DeviceBindingStatus {
    /// Code reported back to the server.
    pub fn client_error(&self) -> &'static str {
        match self {
            Self::Timeout => "Timeout",
            Self::Abort => "Abort",
            Self::Unsupported(_) => "Unsupported",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Result of a binding attempt. Success writes no error code.
pub type BindingOutcome = Result<(), DeviceBindingStatus>;
