//! # File-Backed Storage
//!
//! Every table the mesh persists is a single JSON document that is read
//! whole, mutated, and written whole on each call. Nothing is cached between
//! calls, so two handles to the same path always observe the latest save.
//!
//! ## Guarantees
//!
//! 1. **Atomic replace**: `save()` writes a sibling `.tmp` file and renames
//!    it over the target, so readers never see a half-written document
//! 2. **Forgiving load**: a missing or corrupt file loads as `T::default()`
//!
//! Concurrent writers from different processes can still lose updates
//! (last rename wins). Within one process all calls are synchronous.

use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::constants::{
    ACCOUNTS_FILE, BALANCES_FILE, CHAIN_FILE, CONTRACTS_FILE, NODES_FILE,
};

/// Errors raised while persisting a table.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("storage i/o error on {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The value could not be encoded as JSON.
    #[error("failed to encode {path}: {source}")]
    Encode {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Typed handle to one JSON file.
#[derive(Debug)]
pub struct JsonFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonFile<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Creates a handle. The file is not touched until `load`/`save`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole document.
    ///
    /// Absent files and files that fail to parse load as `T::default()`.
    #[must_use]
    pub fn load(&self) -> T {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "unreadable store, using defaults");
                return T::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupt store, using defaults");
                T::default()
            }
        }
    }

    /// Replaces the whole document.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the file cannot be
    /// written and renamed into place.
    pub fn save(&self, value: &T) -> StorageResult<()> {
        let data = serde_json::to_vec(value).map_err(|source| StorageError::Encode {
            path: self.path.clone(),
            source,
        })?;

        self.write_atomic(&data).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Loads, applies `f`, saves, and returns whatever `f` returned.
    ///
    /// # Errors
    ///
    /// Propagates save failures.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> StorageResult<R> {
        let mut value = self.load();
        let out = f(&mut value);
        self.save(&value)?;
        Ok(out)
    }

    fn write_atomic(&self, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)
    }
}

/// Directory holding every persisted table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `nodes.json`.
    #[must_use]
    pub fn nodes(&self) -> PathBuf {
        self.root.join(NODES_FILE)
    }

    /// `chain.json`.
    #[must_use]
    pub fn chain(&self) -> PathBuf {
        self.root.join(CHAIN_FILE)
    }

    /// `balances.json`.
    #[must_use]
    pub fn balances(&self) -> PathBuf {
        self.root.join(BALANCES_FILE)
    }

    /// `contracts.json`.
    #[must_use]
    pub fn contracts(&self) -> PathBuf {
        self.root.join(CONTRACTS_FILE)
    }

    /// `accounts.json`.
    #[must_use]
    pub fn accounts(&self) -> PathBuf {
        self.root.join(ACCOUNTS_FILE)
    }
}

impl Default for DataDir {
    fn default() -> Self {
        Self::new("SavedGames")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(dir.path().join("absent.json"));
        assert!(file.load().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<BTreeMap<String, i64>> = JsonFile::new(dir.path().join("b.json"));

        let mut balances = BTreeMap::new();
        balances.insert("alice".to_string(), 5);
        file.save(&balances).unwrap();

        assert_eq!(file.load().get("alice"), Some(&5));
        // Temp file is renamed away
        assert!(!dir.path().join("b.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(&path, b"{not json").unwrap();

        let file: JsonFile<Vec<u32>> = JsonFile::new(path);
        assert!(file.load().is_empty());
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(dir.path().join("nested/deeper/x.json"));
        file.save(&vec![1, 2, 3]).unwrap();
        assert_eq!(file.load(), vec![1, 2, 3]);
    }

    #[test]
    fn test_update_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(dir.path().join("u.json"));

        let len = file.update(|v| {
            v.push(7);
            v.len()
        })
        .unwrap();

        assert_eq!(len, 1);
        assert_eq!(file.load(), vec![7]);
    }

    #[test]
    fn test_data_dir_layout() {
        let data = DataDir::new("/tmp/coliseum");
        assert!(data.nodes().ends_with("nodes.json"));
        assert!(data.chain().ends_with("chain.json"));
        assert!(data.accounts().ends_with("accounts.json"));
    }
}
