//! Storage keyspace for per-paper state
//!
//! Every paper is identified by its source URL. The URL is encoded with
//! unpadded URL-safe base64, which is reversible (so distinct URLs can never
//! share a key) and only uses `[A-Za-z0-9_-]`, so the result is safe for any
//! key-value backend including one file per key:
//!
//! - `chat-threads-{enc}`: thread directory for the paper
//! - `chat-history-{enc}.thread-{thread_id}`: message log of one thread
//! - `paper-metadata-{enc}`: cached paper metadata

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::error::{Error, Result};

pub const THREADS_PREFIX: &str = "chat-threads-";
pub const HISTORY_PREFIX: &str = "chat-history-";
pub const METADATA_PREFIX: &str = "paper-metadata-";

// '.' is outside the base64url alphabet, so the first occurrence always ends
// the encoded resource.
const THREAD_SEPARATOR: &str = ".thread-";

/// Derived storage namespace for one resource identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    resource_id: String,
    encoded: String,
}

impl ResourceKey {
    /// Derive the key for a resource identifier
    pub fn derive(resource_id: &str) -> Result<Self> {
        if resource_id.trim().is_empty() {
            return Err(Error::InvalidResourceId);
        }

        Ok(Self {
            resource_id: resource_id.to_string(),
            encoded: URL_SAFE_NO_PAD.encode(resource_id.as_bytes()),
        })
    }

    /// Rebuild a key from its encoded form, as found inside a storage key
    pub fn from_encoded(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        let resource_id = String::from_utf8(bytes).ok()?;
        if resource_id.trim().is_empty() {
            return None;
        }
        Some(Self {
            resource_id,
            encoded: encoded.to_string(),
        })
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Key holding the ordered thread list
    pub fn directory_key(&self) -> String {
        format!("{}{}", THREADS_PREFIX, self.encoded)
    }

    /// Key holding one thread's message log
    pub fn conversation_key(&self, thread_id: &str) -> String {
        format!(
            "{}{}{}{}",
            HISTORY_PREFIX, self.encoded, THREAD_SEPARATOR, thread_id
        )
    }

    /// Key holding the cached paper metadata
    pub fn metadata_key(&self) -> String {
        format!("{}{}", METADATA_PREFIX, self.encoded)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource_id)
    }
}

/// Derive the thread directory key for a resource identifier
pub fn directory_key(resource_id: &str) -> Result<String> {
    Ok(ResourceKey::derive(resource_id)?.directory_key())
}

/// Derive the message log key for a thread of a resource
pub fn conversation_key(resource_id: &str, thread_id: &str) -> Result<String> {
    Ok(ResourceKey::derive(resource_id)?.conversation_key(thread_id))
}

/// What an enumerated storage key belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    Directory(ResourceKey),
    Conversation {
        resource: ResourceKey,
        thread_id: String,
    },
    Metadata(ResourceKey),
    /// Key outside the paperchat keyspace, or one whose encoding is damaged
    Other,
}

impl KeyKind {
    /// Classify a raw storage key
    pub fn classify(key: &str) -> Self {
        if let Some(encoded) = key.strip_prefix(THREADS_PREFIX) {
            return ResourceKey::from_encoded(encoded)
                .map(KeyKind::Directory)
                .unwrap_or(KeyKind::Other);
        }

        if let Some(rest) = key.strip_prefix(HISTORY_PREFIX) {
            return match rest.split_once(THREAD_SEPARATOR) {
                Some((encoded, thread_id)) => match ResourceKey::from_encoded(encoded) {
                    Some(resource) => KeyKind::Conversation {
                        resource,
                        thread_id: thread_id.to_string(),
                    },
                    None => KeyKind::Other,
                },
                None => KeyKind::Other,
            };
        }

        if let Some(encoded) = key.strip_prefix(METADATA_PREFIX) {
            return ResourceKey::from_encoded(encoded)
                .map(KeyKind::Metadata)
                .unwrap_or(KeyKind::Other);
        }

        KeyKind::Other
    }

    /// True for thread directories and message logs
    pub fn is_chat(&self) -> bool {
        matches!(self, KeyKind::Directory(_) | KeyKind::Conversation { .. })
    }
}

/// True for any key with a chat prefix, even if its encoding is damaged
pub fn is_chat_key(key: &str) -> bool {
    key.starts_with(THREADS_PREFIX) || key.starts_with(HISTORY_PREFIX)
}

/// True for any key with the metadata prefix
pub fn is_metadata_key(key: &str) -> bool {
    key.starts_with(METADATA_PREFIX)
}
