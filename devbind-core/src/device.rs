//! Device identity.
//!
//! The binder reports a stable, non-reversible device identifier alongside the
//! assertion so the server can tell a user's devices apart. Absence is a
//! normal case, not an error.

use std::fs;
use std::path::PathBuf;

use sha3::{Digest, Sha3_256};
use tracing::debug;

/// Salt mixed into machine-derived identifiers.
const DEVICE_ID_SALT: &[u8] = b"devbind-device-id:";

/// Locations of the host machine id, in lookup order.
const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Resolves the identifier of the current device.
pub trait DeviceIdentifierProvider: Send + Sync {
    fn identifier(&self) -> Option<String>;
}

/// Identifier derived from the host machine id.
///
/// The raw id is never reported; the hex SHA3-256 of salt and id is.
#[derive(Debug, Clone)]
pub struct MachineIdProvider {
    paths: Vec<PathBuf>,
}

impl Default for MachineIdProvider {
    fn default() -> Self {
        Self {
            paths: MACHINE_ID_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl MachineIdProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the machine id from `paths` instead of the system locations.
    pub fn with_paths(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl DeviceIdentifierProvider for MachineIdProvider {
    fn identifier(&self) -> Option<String> {
        for path in &self.paths {
            match fs::read_to_string(path) {
                Ok(contents) => {
                    let machine_id = contents.trim();
                    if machine_id.is_empty() {
                        continue;
                    }
                    let mut hasher = Sha3_256::new();
                    hasher.update(DEVICE_ID_SALT);
                    hasher.update(machine_id.as_bytes());
                    return Some(hex::encode(hasher.finalize()));
                }
                Err(e) => debug!(path = %path.display(), error = %e, "Machine id not readable"),
            }
        }
        None
    }
}

/// Fixed identifier supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDeviceId(pub String);

impl DeviceIdentifierProvider for StaticDeviceId {
    fn identifier(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Provider for hosts with no device identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDeviceId;

impl DeviceIdentifierProvider for NoDeviceId {
    fn identifier(&self) -> Option<String> {
        None
    }
}
