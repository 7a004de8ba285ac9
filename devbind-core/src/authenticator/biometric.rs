use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{
    AuthenticatorError, BoundKeys, GateMode, GateOutcome, KeyBindingAuthenticator, Prompt,
    UserPresenceGate,
};
use crate::callback::AuthenticationType;
use crate::keystore::KeyHandle;

/// Key binding behind a user presence gate.
#[derive(Clone)]
struct Gated {
    keys: BoundKeys,
    gate: Arc<dyn UserPresenceGate>,
    prompt: Prompt,
    mode: GateMode,
}

impl Gated {
    fn is_supported(&self) -> bool {
        self.gate.is_available(self.mode)
    }

    async fn sign(
        &self,
        key: &KeyHandle,
        kid: &str,
        user_id: &str,
        challenge: &str,
        expiration: DateTime<Utc>,
    ) -> Result<String, AuthenticatorError> {
        match self.gate.authenticate(&self.prompt, self.mode).await {
            GateOutcome::Granted => {
                debug!(mode = ?self.mode, "User presence confirmed");
                self.keys.sign(key, kid, user_id, challenge, expiration)
            }
            GateOutcome::Cancelled => Err(AuthenticatorError::UserCancelled),
            GateOutcome::Failed(reason) => {
                warn!(mode = ?self.mode, reason = %reason, "User presence check failed");
                Err(AuthenticatorError::AuthenticationFailed(reason))
            }
        }
    }
}

/// Requires a strong biometric before signing. No device credential fallback.
#[derive(Clone)]
pub struct BiometricOnlyAuthenticator {
    inner: Gated,
}

impl BiometricOnlyAuthenticator {
    pub fn new(keys: BoundKeys, gate: Arc<dyn UserPresenceGate>, prompt: Prompt) -> Self {
        Self {
            inner: Gated {
                keys,
                gate,
                prompt,
                mode: GateMode::Biometric,
            },
        }
    }
}

#[async_trait]
impl KeyBindingAuthenticator for BiometricOnlyAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::BiometricOnly
    }

    fn is_supported(&self) -> bool {
        self.inner.is_supported()
    }

    fn generate_key_pair(&self, user_id: &str) -> Result<KeyHandle, AuthenticatorError> {
        self.inner.keys.generate(user_id)
    }

    async fn sign(
        &self,
        key: &KeyHandle,
        kid: &str,
        user_id: &str,
        challenge: &str,
        expiration: DateTime<Utc>,
    ) -> Result<String, AuthenticatorError> {
        self.inner
            .sign(key, kid, user_id, challenge, expiration)
            .await
    }

    fn delete_keys(&self, user_id: &str) -> Result<(), AuthenticatorError> {
        self.inner.keys.delete(user_id)
    }
}

/// Accepts a biometric or the device credential (PIN, pattern, password).
#[derive(Clone)]
pub struct BiometricAllowFallbackAuthenticator {
    inner: Gated,
}

impl BiometricAllowFallbackAuthenticator {
    pub fn new(keys: BoundKeys, gate: Arc<dyn UserPresenceGate>, prompt: Prompt) -> Self {
        Self {
            inner: Gated {
                keys,
                gate,
                prompt,
                mode: GateMode::BiometricOrCredential,
            },
        }
    }
}

#[async_trait]
impl KeyBindingAuthenticator for BiometricAllowFallbackAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::BiometricAllowFallback
    }

    fn is_supported(&self) -> bool {
        self.inner.is_supported()
    }

    fn generate_key_pair(&self, user_id: &str) -> Result<KeyHandle, AuthenticatorError> {
        self.inner.keys.generate(user_id)
    }

    async fn sign(
        &self,
        key: &KeyHandle,
        kid: &str,
        user_id: &str,
        challenge: &str,
        expiration: DateTime<Utc>,
    ) -> Result<String, AuthenticatorError> {
        self.inner
            .sign(key, kid, user_id, challenge, expiration)
            .await
    }

    fn delete_keys(&self, user_id: &str) -> Result<(), AuthenticatorError> {
        self.inner.keys.delete(user_id)
    }
}
