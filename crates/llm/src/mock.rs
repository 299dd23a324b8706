//! Mock chat gateway
//!
//! Plays back queued scripts, one per opened stream. With no script queued it
//! echoes the user message word by word. Requests are recorded for test
//! assertions. Thread-safe via `Arc<Mutex<>>`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::{
    stream_channel, ChatRequest, ChatStream, ChatStreamService, LlmError, StopSignal,
    StreamEvent, StreamSender,
};

/// What the next opened stream does
#[derive(Debug, Clone)]
pub enum MockScript {
    /// Deliver these events, then close
    Events(Vec<StreamEvent>),
    /// Deliver these events, then stay open until stopped
    Hold(Vec<StreamEvent>),
    /// Fail to open the stream at all
    Reject(LlmError),
}

impl MockScript {
    /// Fragments followed by a normal completion
    pub fn reply(fragments: &[&str]) -> Self {
        let mut events: Vec<StreamEvent> = fragments
            .iter()
            .map(|f| StreamEvent::Delta(f.to_string()))
            .collect();
        events.push(StreamEvent::Finished {
            stop_reason: "end_turn".to_string(),
        });
        Self::Events(events)
    }

    /// Fragments followed by a transport failure
    pub fn fail_after(fragments: &[&str], reason: &str) -> Self {
        let mut events: Vec<StreamEvent> = fragments
            .iter()
            .map(|f| StreamEvent::Delta(f.to_string()))
            .collect();
        events.push(StreamEvent::Failed(reason.to_string()));
        Self::Events(events)
    }
}

/// Mock chat gateway for testing
#[derive(Debug, Clone, Default)]
pub struct MockChatService {
    scripts: Arc<Mutex<VecDeque<MockScript>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    signals: Arc<Mutex<Vec<StopSignal>>>,
    // Keeps held streams open
    held: Arc<Mutex<Vec<StreamSender>>>,
}

impl MockChatService {
    /// Create a new mock chat service
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the behaviour of the next opened stream
    pub fn push_script(&self, script: MockScript) {
        self.scripts
            .lock()
            .expect("scripts lock poisoned — prior test panicked")
            .push_back(script);
    }

    /// Return all recorded requests.
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .expect("requests lock poisoned — prior test panicked")
            .clone()
    }

    /// True if any opened stream was asked to stop
    pub fn stop_requested(&self) -> bool {
        self.signals
            .lock()
            .expect("signals lock poisoned — prior test panicked")
            .iter()
            .any(StopSignal::is_stopped)
    }

    fn echo(request: &ChatRequest) -> Vec<StreamEvent> {
        let reply = format!("Mock response to: {}", request.message.content);
        let mut events: Vec<StreamEvent> = reply
            .split_inclusive(' ')
            .map(|w| StreamEvent::Delta(w.to_string()))
            .collect();
        events.push(StreamEvent::Finished {
            stop_reason: "end_turn".to_string(),
        });
        events
    }
}

#[async_trait::async_trait]
impl ChatStreamService for MockChatService {
    async fn open(&self, request: ChatRequest) -> Result<ChatStream, LlmError> {
        tracing::info!(
            model = %request.model,
            history = request.history.len(),
            "Mock chat service opening stream"
        );

        self.requests
            .lock()
            .map_err(|e| LlmError::Request(format!("requests lock poisoned: {e}")))?
            .push(request.clone());

        let script = self
            .scripts
            .lock()
            .map_err(|e| LlmError::Request(format!("scripts lock poisoned: {e}")))?
            .pop_front();

        let (events, hold) = match script {
            Some(MockScript::Reject(err)) => return Err(err),
            Some(MockScript::Events(events)) => (events, false),
            Some(MockScript::Hold(events)) => (events, true),
            None => (Self::echo(&request), false),
        };

        let (sender, stream) = stream_channel(events.len() + 1);
        for event in events {
            sender.try_send(event)?;
        }

        self.signals
            .lock()
            .map_err(|e| LlmError::Request(format!("signals lock poisoned: {e}")))?
            .push(sender.stop_signal());

        if hold {
            self.held
                .lock()
                .map_err(|e| LlmError::Request(format!("held lock poisoned: {e}")))?
                .push(sender);
        }

        Ok(stream)
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}
