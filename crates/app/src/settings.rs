//! User settings kept in the durable store

use paperchat_common::{Error, Result};
use paperchat_storage::SharedStore;

/// Storage key of the user's own gateway credential
pub const API_KEY_STORAGE_KEY: &str = "vercel-ai-gateway-key";

const MIN_API_KEY_LENGTH: usize = 10;

/// The user's AI gateway credential
///
/// When set it is sent with every chat request in place of the server's key.
#[derive(Clone)]
pub struct ApiKeySettings {
    store: SharedStore,
}

impl ApiKeySettings {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Validate and save a credential
    pub fn save(&self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(Error::Validation("API key cannot be empty".to_string()));
        }
        if api_key.chars().count() < MIN_API_KEY_LENGTH {
            return Err(Error::Validation(
                "API key appears to be too short".to_string(),
            ));
        }

        self.store.set(API_KEY_STORAGE_KEY, api_key)?;
        tracing::info!("Saved gateway API key");
        Ok(())
    }

    /// The saved credential, if any
    pub fn get(&self) -> Option<String> {
        match self.store.get(API_KEY_STORAGE_KEY) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read gateway API key");
                None
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(API_KEY_STORAGE_KEY)?;
        tracing::info!("Cleared gateway API key");
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.get().is_some()
    }
}
