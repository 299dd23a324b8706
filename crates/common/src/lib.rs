//! Shared utilities, configuration, and error handling for Paperchat
//!
//! This crate provides common functionality used across the Paperchat crates:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - Storage keyspace derivation for per-paper state

pub mod config;
pub mod error;
pub mod keyspace;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use keyspace::{KeyKind, ResourceKey};
pub use state::StateError;
