//! File-backed key store.
//!
//! Each alias is stored as `<dir>/<alias>.key`, a CBOR document holding the
//! key pair. Each write goes to its own temporary name and is renamed into
//! place, so a generate either fully replaces the previous key or leaves it
//! untouched and concurrent writers for one alias never share a temp file.
//! On Unix the files are created with mode `0600`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{KeyAlias, KeyHandle, KeyMaterial, KeyStore, KeyStoreError, ALGORITHM};

/// Version of the on-disk key file format.
const KEY_FILE_VERSION: u8 = 1;

const KEY_FILE_EXTENSION: &str = "key";

/// On-disk representation of a key pair.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyFile {
    version: u8,
    algorithm: String,
    public_key: Vec<u8>,
    secret_key: Vec<u8>,
}

/// Key store persisting one file per alias under a directory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, alias: &KeyAlias) -> PathBuf {
        self.dir
            .join(alias.as_str())
            .with_extension(KEY_FILE_EXTENSION)
    }

    fn load(&self, alias: &KeyAlias) -> Result<KeyMaterial, KeyStoreError> {
        let path = self.path_for(alias);
        let bytes = match fs::read(&path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeyStoreError::NotFound(alias.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let file: KeyFile = ciborium::from_reader(bytes.as_slice())
            .map_err(|e| KeyStoreError::Serialization(e.to_string()))?;

        if file.version != KEY_FILE_VERSION || file.algorithm != ALGORITHM {
            return Err(KeyStoreError::InvalidKey(format!(
                "unsupported key file (version {}, algorithm {})",
                file.version, file.algorithm
            )));
        }

        Ok(KeyMaterial {
            public_key: file.public_key.clone(),
            secret_key: Zeroizing::new(file.secret_key.clone()),
        })
    }

    fn store(&self, alias: &KeyAlias, key: &KeyMaterial) -> Result<(), KeyStoreError> {
        let file = KeyFile {
            version: KEY_FILE_VERSION,
            algorithm: ALGORITHM.to_string(),
            public_key: key.public_key.clone(),
            secret_key: key.secret_key.to_vec(),
        };

        let mut bytes = Zeroizing::new(Vec::new());
        ciborium::into_writer(&file, &mut *bytes)
            .map_err(|e| KeyStoreError::Serialization(e.to_string()))?;

        let path = self.path_for(alias);
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let written = write_private(&tmp, &bytes).and_then(|()| fs::rename(&tmp, &path));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        Ok(written?)
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut out = create_private(path)?;
    out.write_all(bytes)?;
    out.sync_all()
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

impl KeyStore for FileKeyStore {
    #[instrument(level = "debug", skip(self), fields(alias = %alias))]
    fn generate(&self, alias: &KeyAlias) -> Result<KeyHandle, KeyStoreError> {
        let key = KeyMaterial::generate();
        self.store(alias, &key)?;
        debug!("Stored key file");
        Ok(key.handle(alias))
    }

    fn sign(&self, handle: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, KeyStoreError> {
        self.load(&handle.alias)?.sign(handle, message)
    }

    #[instrument(level = "debug", skip(self), fields(alias = %alias))]
    fn delete(&self, alias: &KeyAlias) -> Result<(), KeyStoreError> {
        match fs::remove_file(self.path_for(alias)) {
            Ok(()) => {
                debug!("Removed key file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, alias: &KeyAlias) -> bool {
        self.path_for(alias).is_file()
    }
}
