//! Device-local key storage.
//!
//! The binding engine never sees raw key bytes. It asks a [`KeyStore`] to
//! generate a key pair under an alias derived from the user identity, to sign
//! bytes with it, and to delete it again. Hosts with a platform keystore plug
//! in their own implementation; two software stores ship with the crate:
//!
//! - [`MemoryKeyStore`] - process-local, for tests and short-lived hosts
//! - [`FileKeyStore`] - one CBOR file per alias (feature `file-store`)
//!
//! Keys are ML-DSA-65 (FIPS 204) key pairs.

mod error;
#[cfg(feature = "file-store")]
mod file;
mod memory;

pub use error::KeyStoreError;
#[cfg(feature = "file-store")]
pub use file::FileKeyStore;
pub use memory::MemoryKeyStore;

use std::fmt;

use pqcrypto_mldsa::mldsa65;
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};
use sha3::{Digest, Sha3_256};
use zeroize::Zeroizing;

/// JOSE algorithm name of the bound keys.
pub const ALGORITHM: &str = "ML-DSA-65";

/// Domain separator mixed into alias derivation.
const ALIAS_DOMAIN: &[u8] = b"devbind-key-alias:";

/// Stable storage name for a user's bound key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyAlias(String);

impl KeyAlias {
    /// Derive the alias for a user identity (hex SHA3-256).
    pub fn for_user(user_id: &str) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(ALIAS_DOMAIN);
        hasher.update(user_id.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a generated key pair. Carries only public material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
    pub alias: KeyAlias,
    pub public_key: Vec<u8>,
}

impl KeyHandle {
    pub fn algorithm(&self) -> &'static str {
        ALGORITHM
    }
}

/// Secure storage for bound key pairs.
///
/// `generate` replaces any key already stored under the alias. `delete` is
/// idempotent. Implementations must be thread-safe (`Send + Sync`); no
/// ordering is promised between concurrent writers of the same alias.
pub trait KeyStore: Send + Sync {
    /// Generate a fresh key pair under `alias`.
    fn generate(&self, alias: &KeyAlias) -> Result<KeyHandle, KeyStoreError>;

    /// Sign `message` with the key referenced by `handle`.
    fn sign(&self, handle: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, KeyStoreError>;

    /// Remove the key stored under `alias`, if any.
    fn delete(&self, alias: &KeyAlias) -> Result<(), KeyStoreError>;

    /// Whether a key is stored under `alias`.
    fn contains(&self, alias: &KeyAlias) -> bool;
}

/// Key pair as held by the software stores.
pub(crate) struct KeyMaterial {
    pub public_key: Vec<u8>,
    pub secret_key: Zeroizing<Vec<u8>>,
}

impl KeyMaterial {
    pub fn generate() -> Self {
        let (public_key, secret_key) = mldsa65::keypair();
        Self {
            public_key: public_key.as_bytes().to_vec(),
            secret_key: Zeroizing::new(secret_key.as_bytes().to_vec()),
        }
    }

    pub fn handle(&self, alias: &KeyAlias) -> KeyHandle {
        KeyHandle {
            alias: alias.clone(),
            public_key: self.public_key.clone(),
        }
    }

    /// Sign after checking the handle still refers to this key.
    pub fn sign(&self, handle: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, KeyStoreError> {
        if self.public_key != handle.public_key {
            return Err(KeyStoreError::KeyMismatch(handle.alias.to_string()));
        }

        let secret_key = mldsa65::SecretKey::from_bytes(&self.secret_key)
            .map_err(|e| KeyStoreError::InvalidKey(format!("secret key: {e:?}")))?;
        let signature = mldsa65::detached_sign(message, &secret_key);
        Ok(signature.as_bytes().to_vec())
    }
}

/// Verify an ML-DSA-65 detached signature.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(public_key) = mldsa65::PublicKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = mldsa65::DetachedSignature::from_bytes(signature) else {
        return false;
    };
    mldsa65::verify_detached_signature(&signature, message, &public_key).is_ok()
}
