//! Devbind Core - Device binding engine
//!
//! This crate binds a user identity to a key pair generated on the current
//! device. The server issues a device binding callback carrying a challenge;
//! the device generates a fresh key, optionally gates its use behind a user
//! presence check, signs the challenge and writes the signed assertion back
//! into the callback.
//!
//! # Features
//!
//! - Strict callback parsing with round-trip of unknown fields
//! - Post-quantum assertions using ML-DSA-65 (FIPS 204)
//! - Biometric or device credential gating through a pluggable gate
//! - In-memory and file-backed key stores with secret zeroization
//! - Closed outcome set (`Timeout`, `Abort`, `Unsupported`) with cleanup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use devbind_core::{
//!     BindingConfig, DeviceBinder, DeviceBindingCallback, MachineIdProvider, MemoryKeyStore,
//!     UnavailableGate,
//! };
//!
//! # async fn example(json: &str) -> devbind_core::Result<()> {
//! let mut callback = DeviceBindingCallback::from_json(json)?;
//!
//! let binder = DeviceBinder::new(
//!     Arc::new(MemoryKeyStore::new()),
//!     Arc::new(UnavailableGate),
//!     Arc::new(MachineIdProvider::new()),
//!     BindingConfig::from_env(),
//! );
//!
//! match binder.bind(&mut callback).await {
//!     Ok(()) => println!("bound"),
//!     Err(status) => println!("{}: {status}", status.client_error()),
//! }
//! let response = callback.to_json()?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod authenticator;
pub mod binder;
pub mod callback;
pub mod config;
pub mod device;
pub mod error;
pub mod keystore;
pub mod status;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use assertion::{
    verify_assertion, AssertionClaims, AssertionHeader, AssertionSigner, ClaimOptions,
    VerifiedAssertion,
};
pub use authenticator::{
    AuthenticatorError, AuthenticatorFactory, BiometricAllowFallbackAuthenticator,
    BiometricOnlyAuthenticator, DefaultAuthenticatorFactory, FixedGate, GateMode, GateOutcome,
    KeyBindingAuthenticator, NoneAuthenticator, Prompt, UnavailableGate, UserPresenceGate,
};
pub use binder::DeviceBinder;
pub use callback::{
    AuthenticationType, BindingRequest, CallbackPayload, DeviceBindingCallback, NamedValue,
    ResponseSlots,
};
pub use config::BindingConfig;
pub use device::{DeviceIdentifierProvider, MachineIdProvider, NoDeviceId, StaticDeviceId};
pub use error::{DevbindError, Result, DEVICE_BINDING_CALLBACK, MAX_CALLBACK_SIZE};
pub use keystore::{KeyAlias, KeyHandle, KeyStore, KeyStoreError, MemoryKeyStore};
pub use status::{BindingOutcome, DeviceBindingStatus};

#[cfg(feature = "file-store")]
pub use keystore::FileKeyStore;
