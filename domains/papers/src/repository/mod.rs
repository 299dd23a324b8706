//! Repository implementations for Papers domain

pub mod metadata;

pub use metadata::MetadataCache;
