//! Paperchat LLM boundary
//!
//! Contract for the hosted chat gateway that answers questions about a paper.
//! The gateway streams the assistant reply as text fragments ending in a
//! completion or failure event, and can be asked to stop cooperatively.
//! - `ChatStreamService`: the collaborator trait
//! - `ChatStream` / `StreamSender`: the two ends of one streamed reply
//! - `MockChatService`: scripted implementation for tests and development

pub mod mock;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

pub use mock::{MockChatService, MockScript};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant helping users understand academic papers. \
Write for undergraduate students and focus on applications and key results. \
Use markdown to structure answers. Format inline math as $...$ and display math as $$...$$, \
never inside square brackets.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    #[error("LLM request error: {0}")]
    Request(String),

    #[error("LLM response error: {0}")]
    Response(String),

    #[error("LLM rate limit exceeded")]
    RateLimit,
}

impl From<LlmError> for paperchat_common::Error {
    fn from(err: LlmError) -> Self {
        paperchat_common::Error::StreamTransportFailure(err.to_string())
    }
}

/// Role of a message sent to the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    User,
    Assistant,
}

/// Captured page region attached to a user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub media_type: String,
    /// `data:` URL or remote URL of the image
    pub url: String,
}

impl ImageAttachment {
    pub fn png(url: impl Into<String>) -> Self {
        Self {
            media_type: "image/png".to_string(),
            url: url.into(),
        }
    }
}

/// A message in the conversation history handed to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
}

/// The document the conversation is grounded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub url: String,
    pub media_type: String,
}

impl DocumentRef {
    pub fn pdf(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            media_type: "application/pdf".to_string(),
        }
    }
}

/// Everything the gateway needs for one turn
#[derive(Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub document: DocumentRef,
    /// Settled turns before the new message
    pub history: Vec<LlmMessage>,
    pub message: LlmMessage,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRequest")
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("document", &self.document)
            .field("history", &self.history.len())
            .field("message", &self.message)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// One event of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next text fragment of the assistant reply
    Delta(String),
    /// Reply complete
    Finished { stop_reason: String },
    /// Transport or model failure; no more events follow
    Failed(String),
}

/// Requests a stream to stop
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes a stop request
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop is requested; never resolves if the handle is gone
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a connected stop handle and signal
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Consumer end of a streamed reply
#[derive(Debug)]
pub struct ChatStream {
    events: mpsc::Receiver<StreamEvent>,
    stop: StopHandle,
}

impl ChatStream {
    /// Next event, or `None` once the producer has gone away
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Ask the producer to halt token delivery
    pub fn stop(&self) {
        self.stop.stop();
    }
}

/// Producer end of a streamed reply
#[derive(Debug, Clone)]
pub struct StreamSender {
    tx: mpsc::Sender<StreamEvent>,
    stop: StopSignal,
}

impl StreamSender {
    /// Send a fragment; false when the consumer stopped or went away
    pub async fn delta(&self, text: impl Into<String>) -> bool {
        if self.stop.is_stopped() {
            return false;
        }
        self.tx.send(StreamEvent::Delta(text.into())).await.is_ok()
    }

    pub async fn finish(&self, stop_reason: impl Into<String>) {
        let _ = self
            .tx
            .send(StreamEvent::Finished {
                stop_reason: stop_reason.into(),
            })
            .await;
    }

    pub async fn fail(&self, reason: impl Into<String>) {
        let _ = self.tx.send(StreamEvent::Failed(reason.into())).await;
    }

    /// Queue an event without waiting for buffer space
    pub fn try_send(&self, event: StreamEvent) -> Result<(), LlmError> {
        self.tx
            .try_send(event)
            .map_err(|e| LlmError::Request(format!("stream buffer: {e}")))
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }
}

/// Create a connected producer and consumer with room for `buffer` events
pub fn stream_channel(buffer: usize) -> (StreamSender, ChatStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let (stop_handle, stop_signal) = stop_channel();
    (
        StreamSender {
            tx,
            stop: stop_signal,
        },
        ChatStream {
            events: rx,
            stop: stop_handle,
        },
    )
}

/// Gateway settings handed to the collaborator with every request
#[derive(Clone, PartialEq)]
pub struct LlmConfig {
    /// Chat gateway provider (mock)
    pub provider: String,
    pub model: String,
    pub system_prompt: Option<String>,
    /// Credential for the gateway; requests fall back to the server's own key when absent
    pub api_key: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            api_key: None,
        }
    }
}

impl LlmConfig {
    /// Create LLM config from environment variables
    pub fn from_env() -> Result<Self, LlmError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let provider = std::env::var("LLM_PROVIDER").unwrap_or(defaults.provider);

        let model = std::env::var("LLM_MODEL").unwrap_or(defaults.model);
        if model.trim().is_empty() {
            return Err(LlmError::Configuration(
                "LLM_MODEL must not be empty".to_string(),
            ));
        }

        let system_prompt = std::env::var("LLM_SYSTEM_PROMPT")
            .ok()
            .or(defaults.system_prompt);

        let api_key = std::env::var("AI_GATEWAY_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            provider,
            model,
            system_prompt,
            api_key,
        })
    }
}

/// Streaming chat gateway
#[async_trait::async_trait]
pub trait ChatStreamService: Send + Sync {
    /// Start streaming the reply to `request`
    async fn open(&self, request: ChatRequest) -> Result<ChatStream, LlmError>;

    /// Model used when a request leaves it empty
    fn default_model(&self) -> &str;
}

/// Chat gateway factory
pub struct ChatServiceFactory;

impl ChatServiceFactory {
    /// Create the chat gateway named by the configuration
    pub fn create(config: &LlmConfig) -> Result<Arc<dyn ChatStreamService>, LlmError> {
        match config.provider.as_str() {
            "mock" => {
                tracing::info!("Creating mock chat service");
                Ok(Arc::new(MockChatService::new()))
            }
            provider => Err(LlmError::Configuration(format!(
                "Unknown LLM provider: {}. Supported providers: mock",
                provider
            ))),
        }
    }
}
