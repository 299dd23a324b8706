//! Mock metadata fetcher
//!
//! Serves records registered up front and reports everything else as not
//! found. Lookups are recorded for test assertions. Thread-safe via
//! `Arc<Mutex<>>`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::entities::{ArxivId, ArxivRecord};
use crate::fetcher::{FetchError, MetadataFetcher};

/// Mock metadata fetcher for testing
#[derive(Debug, Clone, Default)]
pub struct MockMetadataFetcher {
    records: Arc<Mutex<HashMap<String, ArxivRecord>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockMetadataFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `record` for its arXiv id
    pub fn insert(&self, record: ArxivRecord) {
        self.records
            .lock()
            .expect("records lock poisoned — prior test panicked")
            .insert(record.arxiv_id.clone(), record);
    }

    /// Ids looked up so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock poisoned — prior test panicked")
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait::async_trait]
impl MetadataFetcher for MockMetadataFetcher {
    async fn fetch(&self, id: &ArxivId) -> Result<ArxivRecord, FetchError> {
        tracing::info!(arxiv_id = %id, "Mock metadata fetch");

        self.calls
            .lock()
            .map_err(|e| FetchError::Request(format!("calls lock poisoned: {e}")))?
            .push(id.to_string());

        self.records
            .lock()
            .map_err(|e| FetchError::Request(format!("records lock poisoned: {e}")))?
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(id.to_string()))
    }
}
