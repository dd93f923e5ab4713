use crate::errors::StoreError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Synchronous string key-value storage for small per-user state.
/// Implementations may fail on quota or availability; callers must catch.
pub trait KeyValueStore: Send + Sync {
    fn read_key(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write_key(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One file per key under a state directory
/// (default `~/.local/share/duewatch/<key>.json`).
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join("duewatch"))
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileKvStore {
    fn read_key(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { key: key.to_string(), source }),
        }
    }

    fn write_key(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write { key: key.to_string(), source };
        fs::create_dir_all(&self.dir).map_err(write_err)?;
        fs::write(self.path_for(key), value).map_err(write_err)
    }
}

/// Process-local store. Used when no state directory can be resolved, and in tests.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn read_key(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write_key(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(dir.path());
        assert_eq!(store.read_key("absent").unwrap(), None);
    }

    #[test]
    fn file_store_creates_directory_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(dir.path().join("nested").join("state"));
        store.write_key("k", "{\"a\":1}").unwrap();
        assert_eq!(store.read_key("k").unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(store.path_for("k").ends_with("nested/state/k.json"));
    }

    #[test]
    fn memory_store_overwrites() {
        let store = MemoryKvStore::new();
        store.write_key("k", "1").unwrap();
        store.write_key("k", "2").unwrap();
        assert_eq!(store.read_key("k").unwrap().as_deref(), Some("2"));
    }
}
