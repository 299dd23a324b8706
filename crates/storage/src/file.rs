//! File-backed store
//!
//! One file per key under a root directory. Writes go to a temporary file in
//! the same directory and are renamed over the target, so a reader never sees
//! a half-written value.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{entry_size, KeyValueStore, StorageError};

const EXTENSION: &str = "kv";

/// Durable store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    quota_bytes: usize,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl AsRef<Path>, quota_bytes: usize) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::Configuration(format!(
                "cannot create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root, quota_bytes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\', '\0']);
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.{EXTENSION}")))
    }

    /// Bytes used by every key except `skip`
    fn used_bytes_except(&self, skip: &str) -> Result<usize, StorageError> {
        let mut total = 0;
        for key in self.keys()? {
            if key == skip {
                continue;
            }
            let path = self.path_for(&key)?;
            let len = fs::metadata(&path)
                .map(|m| m.len() as usize)
                .map_err(|e| StorageError::Read(format!("{}: {}", path.display(), e)))?;
            total += key.len() + len;
        }
        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read(format!("{}: {}", path.display(), e))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        let required = self.used_bytes_except(key)? + entry_size(key, value);
        if required > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                required,
                limit: self.quota_bytes,
            });
        }

        let write_err = |e: std::io::Error| StorageError::Write(format!("{key}: {e}"));

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(write_err)?;
        tmp.write_all(value.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        tracing::trace!(key, bytes = value.len(), "File store: wrote key");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Write(format!("{key}: {e}"))),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| StorageError::Read(format!("{}: {}", self.root.display(), e)))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::Read(e.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(&format!(".{EXTENSION}")) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
