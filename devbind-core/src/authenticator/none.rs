use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AuthenticatorError, BoundKeys, KeyBindingAuthenticator};
use crate::callback::AuthenticationType;
use crate::keystore::KeyHandle;

/// Binds a key without any user presence check.
#[derive(Clone)]
pub struct NoneAuthenticator {
    keys: BoundKeys,
}

impl NoneAuthenticator {
    pub fn new(keys: BoundKeys) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl KeyBindingAuthenticator for NoneAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::None
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn generate_key_pair(&self, user_id: &str) -> Result<KeyHandle, AuthenticatorError> {
        self.keys.generate(user_id)
    }

    async fn sign(
        &self,
        key: &KeyHandle,
        kid: &str,
        user_id: &str,
        challenge: &str,
        expiration: DateTime<Utc>,
    ) -> Result<String, AuthenticatorError> {
        self.keys.sign(key, kid, user_id, challenge, expiration)
    }

    fn delete_keys(&self, user_id: &str) -> Result<(), AuthenticatorError> {
        self.keys.delete(user_id)
    }
}
