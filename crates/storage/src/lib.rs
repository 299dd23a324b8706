//! Paperchat Storage
//!
//! Durable key-value storage with the semantics of browser local storage:
//! string keys, string values, synchronous access, and a byte quota.
//! - File-backed store for durable state on disk
//! - In-memory store for tests and ephemeral sessions, with quota and
//!   failure simulation

pub mod file;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

pub use file::FileStore;
pub use memory::{MemoryStore, WriteOp, WriteRecord};

/// Default quota, matching the usual browser local storage allowance
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Storage configuration error: {0}")]
    Configuration(String),

    #[error("Storage quota exceeded writing {key}: {required} bytes needed, {limit} allowed")]
    QuotaExceeded {
        key: String,
        required: usize,
        limit: usize,
    },

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("Storage read failed: {0}")]
    Read(String),

    #[error("Storage write failed: {0}")]
    Write(String),
}

impl From<StorageError> for paperchat_common::Error {
    fn from(err: StorageError) -> Self {
        paperchat_common::Error::PersistenceFailure(err.to_string())
    }
}

/// Durable key-value store
///
/// Implementations use interior mutability; clones of a handle share state.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key; removing an absent key succeeds
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Shared handle used by the repositories
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Storage service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Storage provider (memory, file)
    pub provider: String,
    /// Root directory for the file provider
    pub dir: PathBuf,
    /// Maximum total bytes (keys plus values)
    pub quota_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            dir: PathBuf::from(".paperchat"),
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl StorageConfig {
    /// Create storage config from environment variables
    pub fn from_env() -> Result<Self, StorageError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let provider = std::env::var("STORAGE_PROVIDER").unwrap_or(defaults.provider);

        let dir = std::env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.dir);

        let quota_bytes = match std::env::var("STORAGE_QUOTA_BYTES") {
            Ok(raw) => raw.parse().map_err(|_| {
                StorageError::Configuration(format!(
                    "STORAGE_QUOTA_BYTES must be a byte count, got {raw:?}"
                ))
            })?,
            Err(_) => defaults.quota_bytes,
        };

        Ok(Self {
            provider,
            dir,
            quota_bytes,
        })
    }
}

/// Factory for creating KeyValueStore implementations.
pub struct StoreFactory;

impl StoreFactory {
    /// Create a store based on configuration.
    pub fn create(config: StorageConfig) -> Result<SharedStore, StorageError> {
        match config.provider.as_str() {
            "file" => {
                tracing::info!(dir = %config.dir.display(), "Creating file-backed store");
                Ok(Arc::new(FileStore::open(&config.dir, config.quota_bytes)?))
            }
            "memory" => {
                tracing::info!("Creating in-memory store");
                Ok(Arc::new(MemoryStore::with_quota(config.quota_bytes)))
            }
            provider => Err(StorageError::Configuration(format!(
                "Unknown storage provider: {}. Supported providers: memory, file",
                provider
            ))),
        }
    }
}

/// Bytes a key/value pair counts against the quota
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}
