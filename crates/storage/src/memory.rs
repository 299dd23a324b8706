//! In-memory store
//!
//! Keeps entries in a shared map and journals every write so tests can
//! assert exactly when persistence happened. Thread-safe via `Arc<Mutex<>>`;
//! clones share the same entries.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{entry_size, KeyValueStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Set,
    Remove,
}

/// One journaled write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub key: String,
    pub op: WriteOp,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
    fail_writes: bool,
    fail_reads: bool,
    journal: Vec<WriteRecord>,
}

impl MemoryState {
    fn used_bytes_except(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }
}

/// In-memory key-value store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes past `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        let store = Self::new();
        store.lock_state().quota_bytes = Some(quota_bytes);
        store
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock_state().fail_writes = fail;
    }

    /// Make every subsequent `get` fail (or succeed again)
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock_state().fail_reads = fail;
    }

    /// Change the quota; `None` removes it
    pub fn set_quota(&self, quota_bytes: Option<usize>) {
        self.lock_state().quota_bytes = quota_bytes;
    }

    /// Every successful write since creation or the last reset
    pub fn journal(&self) -> Vec<WriteRecord> {
        self.lock_state().journal.clone()
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.lock_state().journal.len()
    }

    /// Number of successful writes that touched `key`
    pub fn writes_to(&self, key: &str) -> usize {
        self.lock_state()
            .journal
            .iter()
            .filter(|record| record.key == key)
            .count()
    }

    /// Forget journaled writes, keeping the entries
    pub fn reset_journal(&self) {
        self.lock_state().journal.clear();
    }

    /// Total bytes held
    pub fn used_bytes(&self) -> usize {
        self.lock_state().used_bytes_except("")
    }

    fn lock_state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .expect("memory store lock poisoned — prior test panicked")
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Write(format!("memory store lock poisoned: {e}")))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let state = self
            .state
            .lock()
            .map_err(|e| StorageError::Read(format!("memory store lock poisoned: {e}")))?;
        if state.fail_reads {
            return Err(StorageError::Read(format!("simulated failure reading {key}")));
        }
        Ok(state.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut state = self.try_lock()?;

        if state.fail_writes {
            return Err(StorageError::Write(format!("simulated failure writing {key}")));
        }

        if let Some(limit) = state.quota_bytes {
            let required = state.used_bytes_except(key) + entry_size(key, value);
            if required > limit {
                tracing::debug!(key, required, limit, "Memory store: quota exceeded");
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    required,
                    limit,
                });
            }
        }

        state.entries.insert(key.to_string(), value.to_string());
        state.journal.push(WriteRecord {
            key: key.to_string(),
            op: WriteOp::Set,
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut state = self.try_lock()?;

        if state.fail_writes {
            return Err(StorageError::Write(format!("simulated failure removing {key}")));
        }

        state.entries.remove(key);
        state.journal.push(WriteRecord {
            key: key.to_string(),
            op: WriteOp::Remove,
        });
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let state = self
            .state
            .lock()
            .map_err(|e| StorageError::Read(format!("memory store lock poisoned: {e}")))?;
        Ok(state.entries.keys().cloned().collect())
    }
}
