//! Signed binding assertions.
//!
//! An assertion is a compact JWS (`header.claims.signature`, each part
//! base64url without padding) signed with the freshly bound key. The header
//! embeds the public key so the server can register it on first use:
//!
//! ```json
//! { "alg": "ML-DSA-65", "typ": "JWS", "kid": "<uuid>",
//!   "jwk": { "kty": "AKP", "alg": "ML-DSA-65", "pub": "<base64url>" } }
//! ```
//!
//! Claims carry the subject, the server challenge and the validity window.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DevbindError, Result};
use crate::keystore::{verify_signature, KeyHandle, KeyStore, ALGORITHM};

/// Token type placed in the JOSE header.
pub const TOKEN_TYPE: &str = "JWS";

/// JWK key type for algorithm-keyed public keys.
pub const KEY_TYPE: &str = "AKP";

/// Upper bound on an assertion accepted for verification (32KB).
pub const MAX_ASSERTION_SIZE: usize = 32 * 1024;

/// Public key of the bound key pair, as embedded in the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    pub kty: String,
    pub alg: String,
    #[serde(rename = "pub")]
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
    pub jwk: PublicJwk,
}

/// Claim set signed by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// User identity the key is bound to
    pub sub: String,
    /// Server-issued challenge, verbatim
    pub challenge: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Not before (Unix seconds)
    pub nbf: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Application identifier, when configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Host platform name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// Optional claims added to every assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimOptions {
    pub issuer: Option<String>,
    pub platform: Option<String>,
}

/// Produces assertions with keys held by a [`KeyStore`].
#[derive(Clone)]
pub struct AssertionSigner {
    store: Arc<dyn KeyStore>,
    options: ClaimOptions,
}

impl AssertionSigner {
    pub fn new(store: Arc<dyn KeyStore>, options: ClaimOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    /// Sign the claim set for `user_id` and `challenge` with `key`.
    pub fn sign(
        &self,
        key: &KeyHandle,
        kid: &str,
        user_id: &str,
        challenge: &str,
        expiration: DateTime<Utc>,
    ) -> Result<String> {
        let issued_at = Utc::now().timestamp();

        let header = AssertionHeader {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
            kid: kid.to_string(),
            jwk: PublicJwk {
                kty: KEY_TYPE.to_string(),
                alg: ALGORITHM.to_string(),
                public_key: URL_SAFE_NO_PAD.encode(&key.public_key),
            },
        };
        let claims = AssertionClaims {
            sub: user_id.to_string(),
            challenge: challenge.to_string(),
            iat: issued_at,
            nbf: issued_at,
            exp: expiration.timestamp(),
            iss: self.options.issuer.clone(),
            platform: self.options.platform.clone(),
        };

        let signing_input = format!("{}.{}", encode_json(&header)?, encode_json(&claims)?);
        let signature = self.store.sign(key, signing_input.as_bytes())?;

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    let bytes =
        serde_json::to_vec(value).map_err(|e| DevbindError::SerializationError(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn decode_part<T: for<'de> Deserialize<'de>>(part: &str, what: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| DevbindError::invalid_assertion(format!("{what} is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| DevbindError::invalid_assertion(format!("{what} is not valid JSON: {e}")))
}

/// An assertion whose signature checked out against its embedded key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    pub header: AssertionHeader,
    pub claims: AssertionClaims,
    pub public_key: Vec<u8>,
}

impl VerifiedAssertion {
    pub fn kid(&self) -> &str {
        &self.header.kid
    }

    /// Ensure the assertion answers `expected`.
    pub fn check_challenge(&self, expected: &str) -> Result<()> {
        if self.claims.challenge == expected {
            Ok(())
        } else {
            Err(DevbindError::invalid_assertion("challenge mismatch"))
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.claims.exp
    }
}

/// Verify a compact assertion against the public key in its own header.
///
/// This proves possession of the key, not that the key belongs to the user;
/// relying parties compare `public_key` with what they registered.
pub fn verify_assertion(token: &str) -> Result<VerifiedAssertion> {
    if token.len() > MAX_ASSERTION_SIZE {
        return Err(DevbindError::invalid_assertion(format!(
            "token too large: {} bytes (max {MAX_ASSERTION_SIZE})",
            token.len()
        )));
    }

    let token = token.trim();
    let mut parts = token.split('.');
    let (Some(header_part), Some(claims_part), Some(signature_part), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(DevbindError::invalid_assertion(
            "expected three dot-separated parts",
        ));
    };

    let header: AssertionHeader = decode_part(header_part, "header")?;
    if header.alg != ALGORITHM || header.jwk.alg != ALGORITHM || header.jwk.kty != KEY_TYPE {
        return Err(DevbindError::invalid_assertion(format!(
            "unsupported algorithm `{}`",
            header.alg
        )));
    }

    let public_key = URL_SAFE_NO_PAD
        .decode(&header.jwk.public_key)
        .map_err(|e| DevbindError::invalid_assertion(format!("public key is not base64url: {e}")))?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_part)
        .map_err(|e| DevbindError::invalid_assertion(format!("signature is not base64url: {e}")))?;

    let signing_input = &token[..header_part.len() + 1 + claims_part.len()];
    if !verify_signature(&public_key, signing_input.as_bytes(), &signature) {
        return Err(DevbindError::invalid_assertion("signature verification failed"));
    }

    let claims: AssertionClaims = decode_part(claims_part, "claims")?;
    Ok(VerifiedAssertion {
        header,
        claims,
        public_key,
    })
}
