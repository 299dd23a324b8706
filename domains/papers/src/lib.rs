//! Papers domain: arXiv references, cached paper metadata
//!
//! - `PaperRef`: resolves user input to the document URL used as resource id
//! - `MetadataCache`: durable metadata cache with age-based expiry
//! - `MetadataFetcher`: boundary to the arXiv metadata service

pub mod domain;
pub mod fetcher;
pub mod mock;
pub mod repository;

pub use domain::entities::{ArxivId, ArxivRecord, PaperMetadata, PaperRef, ARXIV_ID_REGEX};
pub use fetcher::{FetchError, MetadataFetcher};
pub use mock::MockMetadataFetcher;
pub use repository::MetadataCache;
