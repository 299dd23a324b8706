//! Paper metadata cache
//!
//! One JSON record per paper under `paper-metadata-{resource}`, keyed by the
//! document URL the paper was opened with.

use chrono::{Duration, Utc};
use paperchat_common::keyspace::{is_metadata_key, ResourceKey};
use paperchat_common::Result;
use paperchat_storage::SharedStore;

use crate::domain::entities::{PaperMetadata, PaperRef};
use crate::fetcher::MetadataFetcher;

#[derive(Clone)]
pub struct MetadataCache {
    store: SharedStore,
}

impl MetadataCache {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn read(&self, key: &str) -> Option<PaperMetadata> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read paper metadata");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(key, error = %e, "Corrupt paper metadata, ignoring");
                None
            }
        }
    }

    fn metadata_keys(&self) -> Result<Vec<String>> {
        let keys = self.store.keys()?;
        Ok(keys.into_iter().filter(|k| is_metadata_key(k)).collect())
    }

    pub fn store(&self, metadata: &PaperMetadata) -> Result<()> {
        let key = ResourceKey::derive(&metadata.url)?.metadata_key();
        let value = serde_json::to_string(metadata)?;
        self.store.set(&key, &value)?;

        tracing::debug!(url = %metadata.url, key, "Stored paper metadata");
        Ok(())
    }

    /// Cached metadata regardless of age
    pub fn get(&self, url: &str) -> Option<PaperMetadata> {
        let key = ResourceKey::derive(url).ok()?.metadata_key();
        self.read(&key)
    }

    pub fn has_valid_cache(&self, url: &str, max_age: Duration) -> bool {
        self.get(url)
            .is_some_and(|metadata| metadata.is_fresh(max_age, Utc::now()))
    }

    /// Fresh entries, most recently fetched first
    pub fn all_recent(&self, max_age: Duration) -> Result<Vec<PaperMetadata>> {
        let now = Utc::now();
        let mut papers: Vec<PaperMetadata> = self
            .metadata_keys()?
            .iter()
            .filter_map(|key| self.read(key))
            .filter(|metadata| metadata.is_fresh(max_age, now))
            .collect();

        papers.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        Ok(papers)
    }

    /// Remove stale and unreadable entries; returns how many were removed
    pub fn clear_old(&self, max_age: Duration) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;

        for key in self.metadata_keys()? {
            let stale = self
                .store
                .get(&key)?
                .and_then(|raw| serde_json::from_str::<PaperMetadata>(&raw).ok())
                .map_or(true, |metadata| !metadata.is_fresh(max_age, now));

            if stale {
                self.store.remove(&key)?;
                removed += 1;
            }
        }

        tracing::info!(removed, max_age_hours = max_age.num_hours(), "Cleared old paper metadata");
        Ok(removed)
    }

    /// Remove every metadata entry; returns how many were removed
    pub fn clear_all(&self) -> Result<usize> {
        let keys = self.metadata_keys()?;
        for key in &keys {
            self.store.remove(key)?;
        }

        tracing::info!(removed = keys.len(), "Cleared paper metadata");
        Ok(keys.len())
    }

    /// Cached metadata if fresh, otherwise fetched (arXiv) or basic, then cached
    ///
    /// A failed cache write is logged; the metadata is still returned.
    pub async fn get_or_fetch(
        &self,
        paper: &PaperRef,
        fetcher: &dyn MetadataFetcher,
        max_age: Duration,
    ) -> Result<PaperMetadata> {
        if let Some(cached) = self.get(&paper.url) {
            if cached.is_fresh(max_age, Utc::now()) {
                tracing::debug!(url = %paper.url, "Using cached paper metadata");
                return Ok(cached);
            }
        }

        let metadata = match &paper.arxiv_id {
            Some(id) => PaperMetadata::from_arxiv(fetcher.fetch(id).await?, paper),
            None => PaperMetadata::basic(paper),
        };

        if let Err(e) = self.store(&metadata) {
            tracing::warn!(url = %paper.url, error = %e, "Failed to cache paper metadata");
        }
        Ok(metadata)
    }
}
