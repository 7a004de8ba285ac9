//! Device binding orchestrator.
//!
//! Drives one binding attempt over a parsed [`DeviceBindingCallback`]:
//!
//! 1. Resolve the authenticator and the device identifier
//! 2. Probe support; unsupported devices stop before any key exists
//! 3. Generate a fresh key pair under the user's alias
//! 4. Sign the challenge (the only step that waits on the user)
//! 5. Check the deadline, then write the response slots
//!
//! Every failure after key generation started removes the key and records the
//! client error code in the callback before returning.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::assertion::AssertionSigner;
use crate::authenticator::{
    AuthenticatorError, AuthenticatorFactory, DefaultAuthenticatorFactory,
    KeyBindingAuthenticator, UserPresenceGate,
};
use crate::callback::DeviceBindingCallback;
use crate::config::BindingConfig;
use crate::device::DeviceIdentifierProvider;
use crate::error::Result;
use crate::keystore::{KeyAlias, KeyStore};
use crate::status::{BindingOutcome, DeviceBindingStatus};

/// Binds keys on this device for callbacks issued by the server.
pub struct DeviceBinder {
    store: Arc<dyn KeyStore>,
    factory: Arc<dyn AuthenticatorFactory>,
    device_ids: Arc<dyn DeviceIdentifierProvider>,
    config: BindingConfig,
}

impl DeviceBinder {
    /// Create a binder using the default authenticator factory over `store`.
    pub fn new(
        store: Arc<dyn KeyStore>,
        gate: Arc<dyn UserPresenceGate>,
        device_ids: Arc<dyn DeviceIdentifierProvider>,
        config: BindingConfig,
    ) -> Self {
        let signer = AssertionSigner::new(store.clone(), config.claim_options());
        Self {
            factory: Arc::new(DefaultAuthenticatorFactory::new(signer, gate)),
            store,
            device_ids,
            config,
        }
    }

    /// Replace the authenticator factory.
    pub fn with_factory(mut self, factory: Arc<dyn AuthenticatorFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Run one binding attempt.
    ///
    /// On success the `jws` slot holds the assertion, `deviceId` holds the
    /// device identifier when one resolves, and `deviceName` holds the
    /// configured name if any. On failure the `clientError` slot holds the
    /// code of the returned status and no key is left behind for the user.
    #[instrument(
        level = "info",
        skip_all,
        fields(authentication_type = %callback.request().authentication_type)
    )]
    pub async fn bind(&self, callback: &mut DeviceBindingCallback) -> BindingOutcome {
        let request = callback.request().clone();
        let authenticator = self.factory.create(&request);
        let device_id = self.device_ids.identifier();

        if !authenticator.is_supported() {
            warn!("Authenticator not supported on this device");
            let status = DeviceBindingStatus::Unsupported(None);
            callback.set_client_error(status.client_error());
            return Err(status);
        }

        let timeout = self.config.effective_timeout(request.timeout_secs);
        let started = Instant::now();
        let kid = Uuid::new_v4().to_string();

        let key = match authenticator.generate_key_pair(&request.user_id) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Key generation failed");
                let status = DeviceBindingStatus::Unsupported(Some(e.to_string()));
                return Err(self.fail(authenticator.as_ref(), callback, &request.user_id, status));
            }
        };
        debug!(kid = %kid, alias = %key.alias, "Generated key pair");

        let expiration = expiration_after(timeout);
        let signed = authenticator
            .sign(&key, &kid, &request.user_id, &request.challenge, expiration)
            .await;

        let jws = match signed {
            Ok(jws) => jws,
            Err(e) => {
                let status = match e {
                    AuthenticatorError::UserCancelled
                    | AuthenticatorError::AuthenticationFailed(_) => {
                        info!(error = %e, "User did not complete the authentication");
                        DeviceBindingStatus::Abort
                    }
                    other => {
                        warn!(error = %other, "Signing failed");
                        DeviceBindingStatus::Unsupported(Some(other.to_string()))
                    }
                };
                return Err(self.fail(authenticator.as_ref(), callback, &request.user_id, status));
            }
        };

        let elapsed = started.elapsed();
        if elapsed > timeout {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_secs = timeout.as_secs(),
                "Signature produced after the deadline"
            );
            return Err(self.fail(
                authenticator.as_ref(),
                callback,
                &request.user_id,
                DeviceBindingStatus::Timeout,
            ));
        }

        callback.set_jws(jws);
        match device_id {
            Some(device_id) => callback.set_device_id(device_id),
            None => debug!("No device identifier available, leaving deviceId empty"),
        }
        if let Some(name) = &self.config.device_name {
            callback.set_device_name(name.as_str());
        }

        info!(kid = %kid, elapsed_ms = elapsed.as_millis() as u64, "Device bound");
        Ok(())
    }

    /// Remove the key bound to `user_id`.
    ///
    /// Returns whether a key was present.
    #[instrument(level = "info", skip_all)]
    pub fn unbind(&self, user_id: &str) -> Result<bool> {
        let alias = KeyAlias::for_user(user_id);
        let existed = self.store.contains(&alias);
        self.store.delete(&alias)?;
        info!(alias = %alias, existed, "Unbound device key");
        Ok(existed)
    }

    fn fail(
        &self,
        authenticator: &dyn KeyBindingAuthenticator,
        callback: &mut DeviceBindingCallback,
        user_id: &str,
        status: DeviceBindingStatus,
    ) -> DeviceBindingStatus {
        if let Err(e) = authenticator.delete_keys(user_id) {
            warn!(error = %e, "Failed to remove key after unsuccessful binding");
        }
        callback.set_client_error(status.client_error());
        status
    }
}

/// `exp` for an attempt. The timeout is already capped by
/// [`BindingConfig::effective_timeout`], so the deadline check and the claim
/// use the same window.
fn expiration_after(timeout: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|window| Utc::now().checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::assertion::verify_assertion;
    use crate::authenticator::{FixedGate, GateOutcome, UnavailableGate};
    use crate::callback::{AuthenticationType, BindingRequest};
    use crate::device::{NoDeviceId, StaticDeviceId};
    use crate::keystore::{KeyHandle, MemoryKeyStore};
    use crate::test_support::{callback_value, CHALLENGE, USER_ID};

    const JWS_SLOT: &str = "IDToken1jws";
    const DEVICE_ID_SLOT: &str = "IDToken1deviceId";
    const DEVICE_NAME_SLOT: &str = "IDToken1deviceName";
    const CLIENT_ERROR_SLOT: &str = "IDToken1clientError";

    fn callback(authentication_type: &str, timeout: Option<u64>) -> DeviceBindingCallback {
        DeviceBindingCallback::from_value(callback_value(authentication_type, timeout)).unwrap()
    }

    fn binder(store: Arc<MemoryKeyStore>, gate: impl UserPresenceGate + 'static) -> DeviceBinder {
        DeviceBinder::new(
            store,
            Arc::new(gate),
            Arc::new(StaticDeviceId("device-1".into())),
            BindingConfig::default(),
        )
    }

    fn alias() -> KeyAlias {
        KeyAlias::for_user(USER_ID)
    }

    /// Authenticator with scripted behaviour that counts its calls.
    #[derive(Default)]
    struct Scripted {
        unsupported: bool,
        fail_generate: bool,
        sign_error: Option<&'static str>,
        sign_delay: Option<Duration>,
        generated: AtomicUsize,
        deleted: AtomicUsize,
    }

    #[async_trait]
    impl KeyBindingAuthenticator for Scripted {
        fn authentication_type(&self) -> AuthenticationType {
            AuthenticationType::None
        }

        fn is_supported(&self) -> bool {
            !self.unsupported
        }

        fn generate_key_pair(
            &self,
            user_id: &str,
        ) -> std::result::Result<KeyHandle, AuthenticatorError> {
            self.generated.fetch_add(1, Ordering::SeqCst);
            if self.fail_generate {
                return Err(AuthenticatorError::KeyGeneration("keystore locked".into()));
            }
            Ok(KeyHandle {
                alias: KeyAlias::for_user(user_id),
                public_key: vec![0; 4],
            })
        }

        async fn sign(
            &self,
            _key: &KeyHandle,
            kid: &str,
            _user_id: &str,
            _challenge: &str,
            _expiration: DateTime<Utc>,
        ) -> std::result::Result<String, AuthenticatorError> {
            if let Some(delay) = self.sign_delay {
                tokio::time::sleep(delay).await;
            }
            match self.sign_error {
                Some(message) => Err(AuthenticatorError::Signing(message.into())),
                None => Ok(format!("signed-{kid}")),
            }
        }

        fn delete_keys(&self, _user_id: &str) -> std::result::Result<(), AuthenticatorError> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedFactory(Arc<Scripted>);

    impl AuthenticatorFactory for ScriptedFactory {
        fn create(&self, _request: &BindingRequest) -> Arc<dyn KeyBindingAuthenticator> {
            self.0.clone()
        }
    }

    fn scripted_binder(scripted: Arc<Scripted>) -> DeviceBinder {
        binder(Arc::new(MemoryKeyStore::new()), FixedGate::granting())
            .with_factory(Arc::new(ScriptedFactory(scripted)))
    }

    // ========================================================================
    // Success
    // ========================================================================

    #[tokio::test]
    async fn test_none_binds_immediately() {
        let store = Arc::new(MemoryKeyStore::new());
        let binder = binder(store.clone(), UnavailableGate);
        let mut callback = callback("NONE", Some(20));

        binder.bind(&mut callback).await.unwrap();

        let jws = callback.input_value(JWS_SLOT).unwrap();
        let verified = verify_assertion(jws).unwrap();
        assert_eq!(verified.claims.sub, USER_ID);
        assert!(verified.check_challenge(CHALLENGE).is_ok());
        assert!(verified.claims.exp >= verified.claims.iat + 19);
        assert_eq!(callback.input_value(DEVICE_ID_SLOT), Some("device-1"));
        assert_eq!(callback.input_value(DEVICE_NAME_SLOT), Some(""));
        assert_eq!(callback.input_value(CLIENT_ERROR_SLOT), Some(""));
        assert!(store.contains(&alias()));
    }

    #[tokio::test]
    async fn test_biometric_binds_with_granted_gate() {
        let store = Arc::new(MemoryKeyStore::new());
        let binder = binder(store.clone(), FixedGate::granting());
        let mut callback = callback("BIOMETRIC_ALLOW_FALLBACK", None);

        binder.bind(&mut callback).await.unwrap();

        let verified = verify_assertion(callback.input_value(JWS_SLOT).unwrap()).unwrap();
        assert!(verified.claims.exp >= verified.claims.iat + 59);
        assert!(store.contains(&alias()));
    }

    #[tokio::test]
    async fn test_oversized_timeout_bounds_expiration() {
        let binder = binder(Arc::new(MemoryKeyStore::new()), FixedGate::granting());
        let mut callback = callback("NONE", Some(u64::MAX));

        binder.bind(&mut callback).await.unwrap();

        let verified = verify_assertion(callback.input_value(JWS_SLOT).unwrap()).unwrap();
        let window = verified.claims.exp - verified.claims.iat;
        let cap = crate::config::MAX_TIMEOUT_SECS as i64;
        assert!((cap - 1..=cap + 1).contains(&window));
    }

    #[tokio::test]
    async fn test_missing_device_id_leaves_slot_empty() {
        let binder = DeviceBinder::new(
            Arc::new(MemoryKeyStore::new()),
            Arc::new(UnavailableGate),
            Arc::new(NoDeviceId),
            BindingConfig::default().with_device_name("Work laptop"),
        );
        let mut callback = callback("NONE", None);

        binder.bind(&mut callback).await.unwrap();

        assert!(!callback.input_value(JWS_SLOT).unwrap().is_empty());
        assert_eq!(callback.input_value(DEVICE_ID_SLOT), Some(""));
        assert_eq!(callback.input_value(DEVICE_NAME_SLOT), Some("Work laptop"));
    }

    #[tokio::test]
    async fn test_each_bind_uses_fresh_kid() {
        let binder = binder(Arc::new(MemoryKeyStore::new()), UnavailableGate);

        let mut first = callback("NONE", None);
        let mut second = callback("NONE", None);
        binder.bind(&mut first).await.unwrap();
        binder.bind(&mut second).await.unwrap();

        let first = verify_assertion(first.input_value(JWS_SLOT).unwrap()).unwrap();
        let second = verify_assertion(second.input_value(JWS_SLOT).unwrap()).unwrap();
        assert_ne!(first.kid(), second.kid());
        assert_ne!(first.public_key, second.public_key);
    }

    // ========================================================================
    // Failures
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_slow_signature_times_out() {
        let store = Arc::new(MemoryKeyStore::new());
        let gate = FixedGate::granting().with_delay(Duration::from_secs(2));
        let binder = binder(store.clone(), gate);
        let mut callback = callback("BIOMETRIC_ONLY", Some(1));

        let outcome = binder.bind(&mut callback).await;

        assert_eq!(outcome, Err(DeviceBindingStatus::Timeout));
        assert_eq!(callback.input_value(JWS_SLOT), Some(""));
        assert_eq!(callback.input_value(CLIENT_ERROR_SLOT), Some("Timeout"));
        assert!(!store.contains(&alias()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signature_within_timeout_succeeds() {
        let store = Arc::new(MemoryKeyStore::new());
        let gate = FixedGate::granting().with_delay(Duration::from_secs(2));
        let binder = binder(store.clone(), gate);
        let mut callback = callback("BIOMETRIC_ONLY", Some(5));

        binder.bind(&mut callback).await.unwrap();
        assert!(store.contains(&alias()));
    }

    #[tokio::test]
    async fn test_cancelled_gate_aborts() {
        let store = Arc::new(MemoryKeyStore::new());
        let binder = binder(store.clone(), FixedGate::new(GateOutcome::Cancelled));
        let mut callback = callback("BIOMETRIC_ONLY", None);

        let outcome = binder.bind(&mut callback).await;

        assert_eq!(outcome, Err(DeviceBindingStatus::Abort));
        assert_eq!(callback.input_value(CLIENT_ERROR_SLOT), Some("Abort"));
        assert_eq!(callback.input_value(JWS_SLOT), Some(""));
        assert!(!store.contains(&alias()));
    }

    #[tokio::test]
    async fn test_failed_gate_aborts() {
        let store = Arc::new(MemoryKeyStore::new());
        let gate = FixedGate::new(GateOutcome::Failed("too many attempts".into()));
        let binder = binder(store.clone(), gate);
        let mut callback = callback("BIOMETRIC_ALLOW_FALLBACK", None);

        assert_eq!(
            binder.bind(&mut callback).await,
            Err(DeviceBindingStatus::Abort)
        );
        assert!(!store.contains(&alias()));
    }

    #[tokio::test]
    async fn test_unsupported_skips_key_generation() {
        let scripted = Arc::new(Scripted {
            unsupported: true,
            ..Default::default()
        });
        let binder = scripted_binder(scripted.clone());
        let mut callback = callback("NONE", None);

        let outcome = binder.bind(&mut callback).await;

        assert_eq!(outcome, Err(DeviceBindingStatus::Unsupported(None)));
        assert_eq!(callback.input_value(CLIENT_ERROR_SLOT), Some("Unsupported"));
        assert_eq!(scripted.generated.load(Ordering::SeqCst), 0);
        assert_eq!(scripted.deleted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unavailable_gate_is_unsupported() {
        let store = Arc::new(MemoryKeyStore::new());
        let binder = binder(store.clone(), UnavailableGate);
        let mut callback = callback("BIOMETRIC_ONLY", None);

        let outcome = binder.bind(&mut callback).await;

        assert_eq!(outcome, Err(DeviceBindingStatus::Unsupported(None)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_key_generation_failure_is_unsupported() {
        let scripted = Arc::new(Scripted {
            fail_generate: true,
            ..Default::default()
        });
        let binder = scripted_binder(scripted.clone());
        let mut callback = callback("NONE", None);

        match binder.bind(&mut callback).await {
            Err(DeviceBindingStatus::Unsupported(Some(message))) => {
                assert!(message.contains("keystore locked"))
            }
            other => panic!("expected Unsupported with message, got {other:?}"),
        }
        assert_eq!(scripted.deleted.load(Ordering::SeqCst), 1);
        assert_eq!(callback.input_value(CLIENT_ERROR_SLOT), Some("Unsupported"));
    }

    #[tokio::test]
    async fn test_signing_failure_is_unsupported() {
        let scripted = Arc::new(Scripted {
            sign_error: Some("hardware error"),
            ..Default::default()
        });
        let binder = scripted_binder(scripted.clone());
        let mut callback = callback("NONE", None);

        match binder.bind(&mut callback).await {
            Err(DeviceBindingStatus::Unsupported(Some(message))) => {
                assert!(message.contains("hardware error"))
            }
            other => panic!("expected Unsupported with message, got {other:?}"),
        }
        assert_eq!(scripted.generated.load(Ordering::SeqCst), 1);
        assert_eq!(scripted.deleted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_latency_times_out() {
        let scripted = Arc::new(Scripted {
            sign_delay: Some(Duration::from_secs(2)),
            ..Default::default()
        });
        let binder = scripted_binder(scripted.clone());
        let mut callback = callback("NONE", Some(1));

        assert_eq!(
            binder.bind(&mut callback).await,
            Err(DeviceBindingStatus::Timeout)
        );
        assert_eq!(callback.input_value(JWS_SLOT), Some(""));
        assert_eq!(scripted.deleted.load(Ordering::SeqCst), 1);
    }

    // ========================================================================
    // Unbind
    // ========================================================================

    #[tokio::test]
    async fn test_unbind_removes_key() {
        let store = Arc::new(MemoryKeyStore::new());
        let binder = binder(store.clone(), UnavailableGate);
        binder.bind(&mut callback("NONE", None)).await.unwrap();

        assert!(binder.unbind(USER_ID).unwrap());
        assert!(!store.contains(&alias()));
        assert!(!binder.unbind(USER_ID).unwrap());
    }
}
