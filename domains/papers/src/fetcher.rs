//! Boundary to the arXiv metadata service

use thiserror::Error;

use crate::domain::entities::{ArxivId, ArxivRecord};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Invalid arXiv ID format: {0}")]
    InvalidId(String),

    #[error("arXiv paper not found: {0}")]
    NotFound(String),

    #[error("Unreadable arXiv response: {0}")]
    Format(String),

    #[error("arXiv request failed: {0}")]
    Request(String),
}

impl From<FetchError> for paperchat_common::Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidId(_) => paperchat_common::Error::Validation(err.to_string()),
            FetchError::NotFound(_) => paperchat_common::Error::NotFound(err.to_string()),
            FetchError::Format(_) => paperchat_common::Error::CorruptData(err.to_string()),
            FetchError::Request(_) => paperchat_common::Error::Unexpected(anyhow::anyhow!(err)),
        }
    }
}

/// Fetches title, authors and abstract for an arXiv paper
#[async_trait::async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, id: &ArxivId) -> Result<ArxivRecord, FetchError>;
}
