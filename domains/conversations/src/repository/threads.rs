//! Thread directory repository
//!
//! Owns the ordered thread list of one paper, stored as a JSON array under
//! `chat-threads-{resource}`. Every mutating operation builds the new list,
//! writes it, and only then replaces the in-memory copy, so a failed write
//! leaves the directory exactly as it was.
//!
//! The active thread is session state and is not persisted; a reload resumes
//! on the first thread.

use chrono::{DateTime, Utc};
use paperchat_common::{Error, ResourceKey, Result};
use paperchat_storage::SharedStore;

use crate::domain::entities::Thread;
use crate::repository::messages::MessageLogStore;

/// Directory behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryOptions {
    /// Refuse to delete the only remaining thread
    pub protect_last_thread: bool,
}

/// What the store holds for a directory key
enum StoredDirectory {
    Threads(Vec<Thread>),
    /// Absent, empty or malformed
    Missing,
    Unreadable(Error),
}

pub struct ThreadDirectory {
    store: SharedStore,
    logs: MessageLogStore,
    resource: ResourceKey,
    threads: Vec<Thread>,
    active_id: Option<String>,
    options: DirectoryOptions,
}

impl ThreadDirectory {
    /// Load the directory for a resource, creating the main thread if needed
    ///
    /// An absent, empty or malformed directory is replaced by the main thread.
    /// If the store cannot be read, the main thread is used in memory only so
    /// the stored directory is not overwritten.
    pub fn load(
        store: SharedStore,
        logs: MessageLogStore,
        resource_id: &str,
        options: DirectoryOptions,
    ) -> Result<Self> {
        let resource = ResourceKey::derive(resource_id)?;

        let (threads, initialize) = match Self::read_threads(&store, &resource) {
            StoredDirectory::Threads(threads) => (threads, false),
            StoredDirectory::Missing => (vec![Thread::main()], true),
            StoredDirectory::Unreadable(e) => {
                tracing::warn!(%resource, error = %e, "Thread directory unreadable, using main thread");
                (vec![Thread::main()], false)
            }
        };

        let directory = Self {
            active_id: threads.first().map(|t| t.id.clone()),
            store,
            logs,
            resource,
            threads,
            options,
        };

        if initialize {
            // The directory stays usable in memory; the next mutation retries the write
            if let Err(e) = directory.persist(&directory.threads) {
                tracing::warn!(
                    resource = %directory.resource,
                    error = %e,
                    "Failed to persist initial thread directory"
                );
            } else {
                tracing::info!(resource = %directory.resource, "Initialized thread directory");
            }
        }

        Ok(directory)
    }

    /// Read a resource's stored threads without initializing anything
    ///
    /// `None` when the directory is absent or holds no readable thread.
    pub fn peek(store: &SharedStore, resource_id: &str) -> Result<Option<Vec<Thread>>> {
        let resource = ResourceKey::derive(resource_id)?;
        match Self::read_threads(store, &resource) {
            StoredDirectory::Threads(threads) => Ok(Some(threads)),
            StoredDirectory::Missing => Ok(None),
            StoredDirectory::Unreadable(e) => Err(e),
        }
    }

    fn read_threads(store: &SharedStore, resource: &ResourceKey) -> StoredDirectory {
        let raw = match store.get(&resource.directory_key()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return StoredDirectory::Missing,
            Err(e) => return StoredDirectory::Unreadable(e.into()),
        };

        let records: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(%resource, error = %e, "Corrupt thread directory, reinitializing");
                return StoredDirectory::Missing;
            }
        };

        let mut threads: Vec<Thread> = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<Thread>(record) {
                Ok(thread) if threads.iter().any(|t| t.id == thread.id) => {
                    tracing::warn!(%resource, thread_id = %thread.id, "Dropping duplicate thread");
                }
                Ok(thread) => threads.push(thread),
                Err(e) => {
                    tracing::warn!(%resource, error = %e, "Dropping unreadable thread record");
                }
            }
        }

        if threads.is_empty() {
            StoredDirectory::Missing
        } else {
            StoredDirectory::Threads(threads)
        }
    }

    fn persist(&self, threads: &[Thread]) -> Result<()> {
        let value = serde_json::to_string(threads)?;
        self.store.set(&self.resource.directory_key(), &value)?;
        tracing::debug!(resource = %self.resource, count = threads.len(), "Saved thread directory");
        Ok(())
    }

    pub fn resource(&self) -> &ResourceKey {
        &self.resource
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn get(&self, thread_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_thread(&self) -> Option<&Thread> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    /// Create a thread, make it active and persist the directory
    pub fn create(&mut self, title: Option<&str>) -> Result<Thread> {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => title.to_string(),
            None => format!("Thread {}", self.threads.len() + 1),
        };

        let mut thread = Thread::new(title)?;
        while self.get(&thread.id).is_some() {
            thread = Thread::new(thread.title)?;
        }

        let mut next = self.threads.clone();
        next.push(thread.clone());
        self.persist(&next)?;

        self.threads = next;
        self.active_id = Some(thread.id.clone());

        tracing::info!(resource = %self.resource, thread_id = %thread.id, "Created thread");
        Ok(thread)
    }

    /// Rename a thread and persist the directory
    pub fn rename(&mut self, thread_id: &str, title: &str) -> Result<()> {
        let title = Thread::validate_title(title)?;
        let index = self.index_of(thread_id)?;

        let mut next = self.threads.clone();
        next[index].title = title;
        self.persist(&next)?;

        self.threads = next;
        Ok(())
    }

    /// Make an existing thread active; not persisted
    pub fn switch_active(&mut self, thread_id: &str) -> Result<()> {
        self.index_of(thread_id)?;
        self.active_id = Some(thread_id.to_string());
        Ok(())
    }

    /// Delete a thread and its message log
    ///
    /// Deleting the only thread recreates the main thread unless
    /// `protect_last_thread` is set, in which case it is refused.
    pub fn delete(&mut self, thread_id: &str) -> Result<()> {
        let index = self.index_of(thread_id)?;

        if self.threads.len() == 1 && self.options.protect_last_thread {
            return Err(Error::LastThreadProtected);
        }

        let mut next = self.threads.clone();
        next.remove(index);
        if next.is_empty() {
            next.push(Thread::main());
        }
        self.persist(&next)?;

        self.threads = next;
        let active_survives = self
            .active_id
            .as_deref()
            .is_some_and(|id| self.threads.iter().any(|t| t.id == id));
        if !active_survives {
            self.active_id = self.threads.first().map(|t| t.id.clone());
        }

        // An orphaned log is harmless and is swept by the cache manager
        if let Err(e) = self.logs.clear(&self.resource, thread_id) {
            tracing::warn!(
                resource = %self.resource,
                thread_id,
                error = %e,
                "Failed to remove message log of deleted thread"
            );
        }

        tracing::info!(resource = %self.resource, thread_id, "Deleted thread");
        Ok(())
    }

    /// Record activity on a thread and persist the directory
    pub fn touch(&mut self, thread_id: &str, when: DateTime<Utc>) -> Result<()> {
        let index = self.index_of(thread_id)?;

        let mut next = self.threads.clone();
        next[index].last_message_at = when;
        self.persist(&next)?;

        self.threads = next;
        Ok(())
    }

    fn index_of(&self, thread_id: &str) -> Result<usize> {
        self.threads
            .iter()
            .position(|t| t.id == thread_id)
            .ok_or_else(|| Error::ThreadNotFound(thread_id.to_string()))
    }
}
