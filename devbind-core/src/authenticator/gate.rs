//! User presence gate.
//!
//! The gate is the biometric or device credential check a bound key must pass
//! before it signs. It is the only step of a binding that waits on the user.

use std::time::Duration;

use async_trait::async_trait;

use crate::callback::BindingRequest;

/// Which verification methods the gate may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Strong biometric only.
    Biometric,
    /// Biometric, falling back to the device credential (PIN, pattern, password).
    BiometricOrCredential,
}

/// Result of a gating step. Exactly one is surfaced per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Granted,
    /// The user dismissed the prompt.
    Cancelled,
    /// Verification did not succeed (no match, lockout, hardware error).
    Failed(String),
}

/// Text shown by the gating prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub title: String,
    pub subtitle: String,
    pub description: String,
}

impl From<&BindingRequest> for Prompt {
    fn from(request: &BindingRequest) -> Self {
        Self {
            title: request.title.clone(),
            subtitle: request.subtitle.clone(),
            description: request.description.clone(),
        }
    }
}

/// Platform user presence check.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait UserPresenceGate: Send + Sync {
    /// Whether the gate can run in `mode` (hardware present, user enrolled).
    /// Must not prompt the user.
    fn is_available(&self, mode: GateMode) -> bool;

    /// Prompt the user and wait for the result.
    async fn authenticate(&self, prompt: &Prompt, mode: GateMode) -> GateOutcome;
}

/// Gate for hosts without any presence hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGate;

#[async_trait]
impl UserPresenceGate for UnavailableGate {
    fn is_available(&self, _mode: GateMode) -> bool {
        false
    }

    async fn authenticate(&self, _prompt: &Prompt, _mode: GateMode) -> GateOutcome {
        GateOutcome::Failed("no user presence hardware".into())
    }
}

/// Gate returning a preset outcome, optionally after a delay.
/// WARNING: Do not use in production - it never asks the user!
#[derive(Debug, Clone)]
pub struct FixedGate {
    outcome: GateOutcome,
    available: bool,
    fallback: bool,
    delay: Option<Duration>,
}

impl FixedGate {
    pub fn new(outcome: GateOutcome) -> Self {
        Self {
            outcome,
            available: true,
            fallback: true,
            delay: None,
        }
    }

    pub fn granting() -> Self {
        Self::new(GateOutcome::Granted)
    }

    /// Report the gate as unavailable in every mode.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Report only strong biometrics, no device credential fallback.
    pub fn without_fallback(mut self) -> Self {
        self.fallback = false;
        self
    }

    /// Wait `delay` before answering, like a user taking their time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl UserPresenceGate for FixedGate {
    fn is_available(&self, mode: GateMode) -> bool {
        match mode {
            GateMode::Biometric => self.available,
            GateMode::BiometricOrCredential => self.available && self.fallback,
        }
    }

    async fn authenticate(&self, _prompt: &Prompt, _mode: GateMode) -> GateOutcome {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
