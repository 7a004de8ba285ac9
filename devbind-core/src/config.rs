//! Binding configuration
//!
//! Host-level settings for the binder, loaded from environment variables with
//! sensible defaults.

use std::time::Duration;

use crate::assertion::ClaimOptions;

/// Timeout applied when the callback carries none (default: 60s)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Longest timeout honoured (one year). It also bounds the assertion's
/// validity window, so a signature accepted before the deadline never
/// outlives its own `exp`.
pub const MAX_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

/// Binder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfig {
    /// Timeout used when the callback omits `timeout`
    pub default_timeout: Duration,
    /// Application identifier placed in the `iss` claim (default: none)
    pub issuer: Option<String>,
    /// Platform name placed in the `platform` claim (default: host OS)
    pub platform: Option<String>,
    /// Name written into the `deviceName` slot on success (default: none)
    pub device_name: Option<String>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            issuer: None,
            platform: Some(std::env::consts::OS.to_string()),
            device_name: None,
        }
    }
}

impl BindingConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DEVBIND_DEFAULT_TIMEOUT_SECS` - fallback timeout (default: 60)
    /// - `DEVBIND_ISSUER` - `iss` claim (default: unset)
    /// - `DEVBIND_DEVICE_NAME` - device name reported on success (default: unset)
    pub fn from_env() -> Self {
        let default_timeout = std::env::var("DEVBIND_DEFAULT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let issuer = non_empty_var("DEVBIND_ISSUER");
        let device_name = non_empty_var("DEVBIND_DEVICE_NAME");

        Self {
            default_timeout,
            issuer,
            device_name,
            ..Self::default()
        }
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Optional claims for the assertion signer.
    pub fn claim_options(&self) -> ClaimOptions {
        ClaimOptions {
            issuer: self.issuer.clone(),
            platform: self.platform.clone(),
        }
    }

    /// Timeout in effect for a request that carries `timeout_secs`, capped at
    /// [`MAX_TIMEOUT_SECS`].
    pub fn effective_timeout(&self, timeout_secs: Option<u64>) -> Duration {
        timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
            .min(Duration::from_secs(MAX_TIMEOUT_SECS))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
