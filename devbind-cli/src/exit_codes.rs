//! Exit codes following sysexits.h conventions.
//!
//! These codes give each binding outcome and failure mode a distinct status,
//! so scripts can react without parsing messages.

use devbind_core::{DevbindError, DeviceBindingStatus, KeyStoreError};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (malformed callback, invalid or mismatched assertion).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Device not supported for the requested authentication type.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNSUPPORTED: i32 = 69;

/// I/O error (cannot write output file, key store failure).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Authentication did not complete before the deadline.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const TIMEOUT: i32 = 75;

/// The user cancelled or failed the presence check.
/// Maps to EX_NOPERM from sysexits.h.
pub const ABORTED: i32 = 77;

/// Text appended to `--help`.
pub const HELP_TEXT: &str = "Exit codes:
  0   Success
  64  Usage error
  65  Invalid callback or assertion
  66  Input file not found
  69  Device not supported
  74  I/O error
  75  Authentication timed out
  77  User terminated the authentication";

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn from_status(status: &DeviceBindingStatus) -> Self {
        let code = match status {
            DeviceBindingStatus::Timeout => TIMEOUT,
            DeviceBindingStatus::Abort => ABORTED,
            DeviceBindingStatus::Unsupported(_) => UNSUPPORTED,
        };
        Self::error(code, status.to_string())
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Typed errors first, then classify by inspecting the chain
        for cause in err.chain() {
            if let Some(status) = cause.downcast_ref::<DeviceBindingStatus>() {
                return Self::error(Self::from_status(status).code, message);
            }
            if let Some(devbind) = cause.downcast_ref::<DevbindError>() {
                let code = match devbind {
                    DevbindError::InvalidCallbackResponse(_)
                    | DevbindError::InvalidAssertion(_)
                    | DevbindError::SerializationError(_) => DATA_ERROR,
                    DevbindError::KeyStore(_) => IO_ERROR,
                };
                return Self::error(code, message);
            }
            if cause.downcast_ref::<KeyStoreError>().is_some() {
                return Self::error(IO_ERROR, message);
            }
        }

        let code = if message.contains("Failed to read") {
            INPUT_ERROR
        } else if message.contains("verification failed") || message.contains("expired") {
            DATA_ERROR
        } else if message.contains("Failed to write") || message.contains("key store") {
            IO_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
