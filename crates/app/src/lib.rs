//! Paperchat application composition root
//!
//! Wires the durable store, the chat gateway and the domain crates into a
//! `Library`: the entry point for opening papers, listing recent ones and
//! maintaining the local cache.

pub mod cache;
pub mod settings;
pub mod telemetry;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use paperchat_common::{Config, Result};
use paperchat_conversations::{ConversationSession, ConversationsRepositories, DirectoryOptions, ThreadDirectory};
use paperchat_llm::{ChatServiceFactory, ChatStreamService, LlmConfig};
use paperchat_papers::{MetadataCache, MetadataFetcher, PaperMetadata, PaperRef};
use paperchat_storage::{SharedStore, StorageConfig, StoreFactory};

pub use cache::{CacheManager, CacheStats};
pub use settings::ApiKeySettings;

/// An opened paper with its conversation
pub struct PaperSession {
    pub paper: PaperRef,
    pub conversation: ConversationSession,
}

/// Entry of the recent papers list
#[derive(Debug, Clone, PartialEq)]
pub struct RecentPaper {
    pub metadata: PaperMetadata,
    pub thread_count: usize,
    /// Latest of the metadata fetch and any thread activity
    pub last_activity: DateTime<Utc>,
}

pub struct Library {
    config: Config,
    store: SharedStore,
    chat: Arc<dyn ChatStreamService>,
    llm: LlmConfig,
    repos: ConversationsRepositories,
    metadata: MetadataCache,
}

impl Library {
    pub fn new(
        store: SharedStore,
        chat: Arc<dyn ChatStreamService>,
        llm: LlmConfig,
        config: Config,
    ) -> Self {
        Self {
            repos: ConversationsRepositories::new(store.clone()),
            metadata: MetadataCache::new(store.clone()),
            config,
            store,
            chat,
            llm,
        }
    }

    /// Build the library from environment configuration
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Config::from_env()?;
        let store = StoreFactory::create(StorageConfig::from_env()?)?;
        let llm = LlmConfig::from_env()?;
        let chat = ChatServiceFactory::create(&llm)?;

        tracing::info!(model = %llm.model, provider = %llm.provider, "Library configured");
        Ok(Self::new(store, chat, llm, config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chat_service(&self) -> &dyn ChatStreamService {
        self.chat.as_ref()
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn settings(&self) -> ApiKeySettings {
        ApiKeySettings::new(self.store.clone())
    }

    pub fn cache_manager(&self) -> CacheManager {
        CacheManager::new(self.store.clone())
    }

    /// Gateway settings for the next session; a saved user key wins
    fn session_llm_config(&self) -> LlmConfig {
        let mut llm = self.llm.clone();
        if let Some(api_key) = self.settings().get() {
            llm.api_key = Some(api_key);
        }
        llm
    }

    /// Resolve a paper reference and open its conversation
    pub fn open_paper(&self, input: &str) -> Result<PaperSession> {
        let paper = PaperRef::resolve(input)?;
        let options = DirectoryOptions {
            protect_last_thread: self.config.protect_last_thread,
        };

        let conversation =
            ConversationSession::open(&self.repos, &paper.url, self.session_llm_config(), options)?;

        tracing::info!(url = %paper.url, display = %paper.display_url, "Opened paper");
        Ok(PaperSession {
            paper,
            conversation,
        })
    }

    /// Metadata for a paper, falling back to basic metadata if the fetch fails
    ///
    /// The fallback is not cached so the next open retries the fetch.
    pub async fn load_metadata(
        &self,
        paper: &PaperRef,
        fetcher: &dyn MetadataFetcher,
    ) -> PaperMetadata {
        match self
            .metadata
            .get_or_fetch(paper, fetcher, self.config.metadata_max_age())
            .await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(url = %paper.url, error = %e, "Failed to load paper metadata");
                PaperMetadata::basic(paper)
            }
        }
    }

    /// Recently opened papers, most recent activity first
    pub fn recent_papers(&self) -> Result<Vec<RecentPaper>> {
        let mut papers: Vec<RecentPaper> = self
            .metadata
            .all_recent(self.config.metadata_max_age())?
            .into_iter()
            .map(|metadata| {
                let threads = match ThreadDirectory::peek(&self.store, &metadata.url) {
                    Ok(threads) => threads.unwrap_or_default(),
                    Err(e) => {
                        tracing::warn!(url = %metadata.url, error = %e, "Failed to read threads");
                        Vec::new()
                    }
                };

                let last_activity = threads
                    .iter()
                    .map(|t| t.last_message_at)
                    .fold(metadata.fetched_at, std::cmp::max);

                RecentPaper {
                    thread_count: threads.len(),
                    last_activity,
                    metadata,
                }
            })
            .collect();

        papers.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        papers.truncate(self.config.recent_papers_limit);
        Ok(papers)
    }
}
