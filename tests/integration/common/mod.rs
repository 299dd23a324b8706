//! Common test utilities and fixtures for integration tests
//!
//! - `TestApp`: a `Library` over a shared `MemoryStore`, with handles on the
//!   scripted chat gateway and metadata fetcher
//! - fixtures for arXiv records and stored conversations

use std::sync::Arc;

use paperchat_app::Library;
use paperchat_common::{Config, ResourceKey};
use paperchat_conversations::ChatMessage;
use paperchat_llm::{LlmConfig, MockChatService, MockScript};
use paperchat_papers::{ArxivRecord, MockMetadataFetcher};
use paperchat_storage::{KeyValueStore, MemoryStore};

pub const PAPER_URL: &str = "https://arxiv.org/pdf/2301.12345";

pub struct TestApp {
    pub memory: MemoryStore,
    pub chat: MockChatService,
    pub fetcher: MockMetadataFetcher,
    pub library: Library,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }

    /// A fresh library over an existing store, as after a restart
    pub fn with_store(memory: MemoryStore, config: Config) -> Self {
        let chat = MockChatService::new();
        let library = Library::new(
            Arc::new(memory.clone()),
            Arc::new(chat.clone()),
            LlmConfig::default(),
            config,
        );

        Self {
            memory,
            chat,
            fetcher: MockMetadataFetcher::new(),
            library,
        }
    }

    pub fn reply_with(&self, fragments: &[&str]) {
        self.chat.push_script(MockScript::reply(fragments));
    }

    /// Messages persisted for one thread of a paper
    pub fn stored_messages(&self, paper_url: &str, thread_id: &str) -> Vec<ChatMessage> {
        let key = ResourceKey::derive(paper_url)
            .unwrap()
            .conversation_key(thread_id);
        self.memory
            .get(&key)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
            .unwrap_or_default()
    }
}

pub fn arxiv_record(id: &str, title: &str) -> ArxivRecord {
    ArxivRecord {
        title: title.to_string(),
        authors: vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()],
        abstract_text: format!("Abstract of {title}."),
        arxiv_id: id.to_string(),
        url: format!("https://arxiv.org/abs/{id}"),
    }
}

/// (role, text) pairs for compact assertions
pub fn transcript(messages: &[ChatMessage]) -> Vec<(String, String)> {
    messages
        .iter()
        .map(|m| (m.role.to_string(), m.text()))
        .collect()
}
