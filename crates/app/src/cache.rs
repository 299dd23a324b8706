//! Cache maintenance across papers and conversations

use std::collections::HashMap;

use chrono::Duration;
use paperchat_common::keyspace::{is_chat_key, is_metadata_key};
use paperchat_common::{KeyKind, Result};
use paperchat_conversations::{ThreadDirectory, DEFAULT_THREAD_ID};
use paperchat_papers::MetadataCache;
use paperchat_storage::SharedStore;

/// Entry counts by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub papers: usize,
    pub chats: usize,
    pub total: usize,
}

impl CacheStats {
    fn new(papers: usize, chats: usize) -> Self {
        Self {
            papers,
            chats,
            total: papers + chats,
        }
    }
}

#[derive(Clone)]
pub struct CacheManager {
    store: SharedStore,
    metadata: MetadataCache,
}

impl CacheManager {
    pub fn new(store: SharedStore) -> Self {
        Self {
            metadata: MetadataCache::new(store.clone()),
            store,
        }
    }

    /// Count metadata entries and chat entries (directories plus logs)
    pub fn stats(&self) -> Result<CacheStats> {
        let keys = self.store.keys()?;
        let papers = keys.iter().filter(|k| is_metadata_key(k)).count();
        let chats = keys.iter().filter(|k| is_chat_key(k)).count();
        Ok(CacheStats::new(papers, chats))
    }

    pub fn clear_paper_metadata(&self) -> Result<usize> {
        self.metadata.clear_all()
    }

    /// Remove every thread directory and message log
    pub fn clear_chat_threads(&self) -> Result<usize> {
        let keys: Vec<String> = self
            .store
            .keys()?
            .into_iter()
            .filter(|k| is_chat_key(k))
            .collect();

        for key in &keys {
            self.store.remove(key)?;
        }

        tracing::info!(removed = keys.len(), "Cleared chat data");
        Ok(keys.len())
    }

    /// Remove all paper and chat data; returns what was removed
    pub fn clear_all(&self) -> Result<CacheStats> {
        let papers = self.clear_paper_metadata()?;
        let chats = self.clear_chat_threads()?;
        let removed = CacheStats::new(papers, chats);

        tracing::info!(
            papers = removed.papers,
            chats = removed.chats,
            total = removed.total,
            "Cache cleared"
        );
        Ok(removed)
    }

    /// Remove stale metadata and orphaned message logs; returns what was removed
    pub fn clear_old(&self, max_age: Duration) -> Result<CacheStats> {
        let papers = self.metadata.clear_old(max_age)?;
        let chats = self.sweep_orphaned_logs()?;
        Ok(CacheStats::new(papers, chats))
    }

    /// Remove message logs whose thread is no longer in its directory
    ///
    /// Resources whose directory is absent, malformed or unreadable are
    /// skipped, and the main thread's log is always kept: the next load
    /// recreates that thread and shows its log again.
    pub fn sweep_orphaned_logs(&self) -> Result<usize> {
        // None marks a resource to leave alone
        let mut known: HashMap<String, Option<Vec<String>>> = HashMap::new();
        let mut removed = 0;

        for key in self.store.keys()? {
            let KeyKind::Conversation { resource, thread_id } = KeyKind::classify(&key) else {
                continue;
            };
            if thread_id == DEFAULT_THREAD_ID {
                continue;
            }

            let ids = known
                .entry(resource.resource_id().to_string())
                .or_insert_with(|| match ThreadDirectory::peek(&self.store, resource.resource_id()) {
                    Ok(threads) => threads.map(|threads| threads.into_iter().map(|t| t.id).collect()),
                    Err(e) => {
                        tracing::warn!(%resource, error = %e, "Skipping unreadable thread directory");
                        None
                    }
                });

            let orphaned = ids.as_ref().is_some_and(|ids| !ids.contains(&thread_id));
            if orphaned {
                self.store.remove(&key)?;
                removed += 1;
                tracing::debug!(%resource, thread_id, "Removed orphaned message log");
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Swept orphaned message logs");
        }
        Ok(removed)
    }
}
