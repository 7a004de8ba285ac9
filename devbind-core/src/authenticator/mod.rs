//! Key binding authenticators.
//!
//! One capability interface, [`KeyBindingAuthenticator`], with a variant per
//! [`AuthenticationType`]:
//!
//! - [`NoneAuthenticator`] - signs without a presence check
//! - [`BiometricOnlyAuthenticator`] - strong biometric, no fallback
//! - [`BiometricAllowFallbackAuthenticator`] - biometric or device credential
//!
//! The [`DefaultAuthenticatorFactory`] picks the variant for a request.

mod biometric;
mod gate;
mod none;

pub use biometric::{BiometricAllowFallbackAuthenticator, BiometricOnlyAuthenticator};
pub use gate::{FixedGate, GateMode, GateOutcome, Prompt, UnavailableGate, UserPresenceGate};
pub use none::NoneAuthenticator;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::assertion::AssertionSigner;
use crate::callback::{AuthenticationType, BindingRequest};
use crate::keystore::{KeyAlias, KeyHandle};

/// Errors surfaced by an authenticator.
#[derive(Debug, Error)]
pub enum AuthenticatorError {
    /// The user dismissed the gating prompt
    #[error("User cancelled the authentication")]
    UserCancelled,

    /// The gating step ran and did not verify the user
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The key pair could not be generated or stored
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// The assertion could not be produced
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The bound key could not be removed
    #[error("Key deletion failed: {0}")]
    KeyDeletion(String),
}

/// Generates bound keys and signs challenges with them.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait KeyBindingAuthenticator: Send + Sync {
    fn authentication_type(&self) -> AuthenticationType;

    /// Capability check. Must not prompt the user or touch the key store.
    fn is_supported(&self) -> bool;

    /// Generate a fresh key pair under the alias for `user_id`, replacing any
    /// existing one.
    fn generate_key_pair(&self, user_id: &str) -> Result<KeyHandle, AuthenticatorError>;

    /// Produce a signed assertion over the challenge. Gated variants prompt
    /// the user first; this is the only call that may wait on the user.
    async fn sign(
        &self,
        key: &KeyHandle,
        kid: &str,
        user_id: &str,
        challenge: &str,
        expiration: DateTime<Utc>,
    ) -> Result<String, AuthenticatorError>;

    /// Remove the key bound to `user_id`. Idempotent.
    fn delete_keys(&self, user_id: &str) -> Result<(), AuthenticatorError>;
}

/// Resolves the authenticator for a request.
pub trait AuthenticatorFactory: Send + Sync {
    fn create(&self, request: &BindingRequest) -> Arc<dyn KeyBindingAuthenticator>;
}

/// Factory keyed on [`AuthenticationType`].
#[derive(Clone)]
pub struct DefaultAuthenticatorFactory {
    signer: AssertionSigner,
    gate: Arc<dyn UserPresenceGate>,
}

impl DefaultAuthenticatorFactory {
    pub fn new(signer: AssertionSigner, gate: Arc<dyn UserPresenceGate>) -> Self {
        Self { signer, gate }
    }
}

impl AuthenticatorFactory for DefaultAuthenticatorFactory {
    fn create(&self, request: &BindingRequest) -> Arc<dyn KeyBindingAuthenticator> {
        let keys = BoundKeys::new(self.signer.clone());
        match request.authentication_type {
            AuthenticationType::None => Arc::new(NoneAuthenticator::new(keys)),
            AuthenticationType::BiometricOnly => Arc::new(BiometricOnlyAuthenticator::new(
                keys,
                self.gate.clone(),
                Prompt::from(request),
            )),
            AuthenticationType::BiometricAllowFallback => {
                Arc::new(BiometricAllowFallbackAuthenticator::new(
                    keys,
                    self.gate.clone(),
                    Prompt::from(request),
                ))
            }
        }
    }
}

/// Key lifecycle shared by all variants.
#[derive(Clone)]
pub struct BoundKeys {
    signer: AssertionSigner,
}

impl BoundKeys {
    pub fn new(signer: AssertionSigner) -> Self {
        Self { signer }
    }

    fn generate(&self, user_id: &str) -> Result<KeyHandle, AuthenticatorError> {
        self.signer
            .store()
            .generate(&KeyAlias::for_user(user_id))
            .map_err(|e| AuthenticatorError::KeyGeneration(e.to_string()))
    }

    fn sign(
        &self,
        key: &KeyHandle,
        kid: &str,
        user_id: &str,
        challenge: &str,
        expiration: DateTime<Utc>,
    ) -> Result<String, AuthenticatorError> {
        self.signer
            .sign(key, kid, user_id, challenge, expiration)
            .map_err(|e| AuthenticatorError::Signing(e.to_string()))
    }

    fn delete(&self, user_id: &str) -> Result<(), AuthenticatorError> {
        self.signer
            .store()
            .delete(&KeyAlias::for_user(user_id))
            .map_err(|e| AuthenticatorError::KeyDeletion(e.to_string()))
    }
}
