//! Persistent byte store.
//!
//! Values are opaque bytes under stable string keys. Anything secret is
//! sealed by the signing core before it gets here.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Stable keys used by a session.
pub mod keys {
    pub const CREDENTIAL_ID: &str = "keygrant/credential-id";
    pub const IDENTITY_ARCHIVE: &str = "keygrant/identity-archive";
    pub const CREATED: &str = "keygrant/delegations/created";
    pub const RECEIVED: &str = "keygrant/delegations/received";
    pub const REVOCATION_CACHE: &str = "keygrant/revocation-cache";
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Byte-oriented key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store. Clones share contents, which lets tests reopen a
/// session over the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// One file per key under a root directory; `/` in a key is a directory
/// separator. Writes go through a temporary file and a rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            let valid = !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
            if !valid {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// CBOR encoding for structured values kept in a store.
pub(crate) fn to_cbor<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok(out)
}

pub(crate) fn from_cbor<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get(keys::CREATED).unwrap(), None);
        store.set(keys::CREATED, b"one").unwrap();
        store.set(keys::CREATED, b"two").unwrap();
        assert_eq!(store.get(keys::CREATED).unwrap().as_deref(), Some(&b"two"[..]));
        store.remove(keys::CREATED).unwrap();
        store.remove(keys::CREATED).unwrap();
        assert_eq!(store.get(keys::CREATED).unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        exercise(&store);

        let shared = store.clone();
        store.set(keys::CREDENTIAL_ID, b"abc").unwrap();
        assert_eq!(shared.get(keys::CREDENTIAL_ID).unwrap().as_deref(), Some(&b"abc"[..]));
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        exercise(&store);

        store.set(keys::IDENTITY_ARCHIVE, &[0, 1, 2]).unwrap();
        assert!(dir.path().join("keygrant").join("identity-archive").exists());

        let reopened = FileStore::new(dir.path());
        assert_eq!(
            reopened.get(keys::IDENTITY_ARCHIVE).unwrap(),
            Some(vec![0, 1, 2])
        );
    }

    #[test]
    fn test_file_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        for key in ["../outside", "a//b", "", "a/./b", "with space"] {
            assert!(
                matches!(store.set(key, b"x"), Err(StoreError::InvalidKey(_))),
                "{key:?}"
            );
        }
    }
}
