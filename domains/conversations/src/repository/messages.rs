//! Message log repository
//!
//! One JSON array per thread under `chat-history-{resource}.thread-{id}`.
//! Reads never fail: a missing, unreadable or corrupt log loads as empty.

use paperchat_common::{ResourceKey, Result};
use paperchat_storage::SharedStore;

use crate::domain::entities::ChatMessage;

#[derive(Clone)]
pub struct MessageLogStore {
    store: SharedStore,
}

impl MessageLogStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Load a thread's messages; corrupt or unreadable data loads as empty
    pub fn load(&self, resource: &ResourceKey, thread_id: &str) -> Vec<ChatMessage> {
        let key = resource.conversation_key(thread_id);

        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(%resource, thread_id, error = %e, "Failed to read message log");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(
                    %resource,
                    thread_id,
                    error = %e,
                    "Corrupt message log, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Overwrite a thread's messages
    pub fn save(
        &self,
        resource: &ResourceKey,
        thread_id: &str,
        messages: &[ChatMessage],
    ) -> Result<()> {
        let key = resource.conversation_key(thread_id);
        let value = serde_json::to_string(messages)?;
        self.store.set(&key, &value)?;

        tracing::debug!(%resource, thread_id, count = messages.len(), "Saved message log");
        Ok(())
    }

    /// Remove a thread's messages entirely
    pub fn clear(&self, resource: &ResourceKey, thread_id: &str) -> Result<()> {
        let key = resource.conversation_key(thread_id);
        self.store.remove(&key)?;

        tracing::debug!(%resource, thread_id, "Cleared message log");
        Ok(())
    }
}
