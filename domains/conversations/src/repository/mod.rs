//! Repository implementations for Conversations domain

pub mod messages;
pub mod threads;

use paperchat_storage::SharedStore;

pub use messages::MessageLogStore;
pub use threads::{DirectoryOptions, ThreadDirectory};

/// Combined repository access for the Conversations domain
#[derive(Clone)]
pub struct ConversationsRepositories {
    store: SharedStore,
    pub messages: MessageLogStore,
}

impl ConversationsRepositories {
    pub fn new(store: SharedStore) -> Self {
        Self {
            messages: MessageLogStore::new(store.clone()),
            store,
        }
    }

    /// Load the thread directory of one paper
    pub fn threads(
        &self,
        resource_id: &str,
        options: DirectoryOptions,
    ) -> paperchat_common::Result<ThreadDirectory> {
        ThreadDirectory::load(
            self.store.clone(),
            self.messages.clone(),
            resource_id,
            options,
        )
    }

    /// Get a reference to the underlying store (for cross-domain maintenance)
    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}
