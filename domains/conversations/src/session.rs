//! Conversation session controller
//!
//! Drives one paper's active thread through the turn lifecycle and decides
//! when the message log is written. The controller is the only writer:
//! nothing is persisted while a turn is in flight, and directory changes are
//! refused until the turn has ended.

use chrono::Utc;
use paperchat_common::{Error, ResourceKey, Result};
use paperchat_llm::{
    ChatRequest, ChatStreamService, DocumentRef, ImageAttachment, LlmConfig, StopSignal,
    StreamEvent,
};

use crate::domain::entities::{ChatMessage, MessageRole, Thread};
use crate::domain::state::{SessionEvent, SessionState, SessionStateMachine};
use crate::repository::{ConversationsRepositories, DirectoryOptions, MessageLogStore, ThreadDirectory};

/// How a driven turn ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Settled,
    Cancelled,
}

/// A user turn that failed and can be sent again
#[derive(Debug, Clone)]
struct FailedTurn {
    text: String,
    images: Vec<ImageAttachment>,
}

enum NextStep {
    Event(Option<StreamEvent>),
    Stopped,
}

pub struct ConversationSession {
    directory: ThreadDirectory,
    logs: MessageLogStore,
    llm: LlmConfig,
    document: DocumentRef,
    state: SessionState,
    messages: Vec<ChatMessage>,
    /// Messages as they were before the in-flight turn
    settled: Vec<ChatMessage>,
    failed_turn: Option<FailedTurn>,
    last_error: Option<String>,
}

impl ConversationSession {
    /// Open a paper's conversation on its first thread
    pub fn open(
        repos: &ConversationsRepositories,
        resource_id: &str,
        llm: LlmConfig,
        options: DirectoryOptions,
    ) -> Result<Self> {
        let directory = repos.threads(resource_id, options)?;
        let document = DocumentRef::pdf(directory.resource().resource_id());

        let mut session = Self {
            directory,
            logs: repos.messages.clone(),
            llm,
            document,
            state: SessionState::Idle,
            messages: Vec::new(),
            settled: Vec::new(),
            failed_turn: None,
            last_error: None,
        };
        session.reload_messages();

        tracing::debug!(
            resource = %session.resource(),
            threads = session.directory.len(),
            messages = session.messages.len(),
            "Opened conversation session"
        );
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Messages of the active thread, including any partial reply
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn resource(&self) -> &ResourceKey {
        self.directory.resource()
    }

    pub fn threads(&self) -> &[Thread] {
        self.directory.threads()
    }

    pub fn active_thread(&self) -> Option<&Thread> {
        self.directory.active_thread()
    }

    pub fn active_thread_id(&self) -> Option<&str> {
        self.directory.active_id()
    }

    /// Reason the last turn failed, until the next submit
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True when `retry` has a failed turn to resend
    pub fn can_retry(&self) -> bool {
        self.failed_turn.is_some() && !self.state.is_in_flight()
    }

    fn active_id(&self) -> Result<String> {
        self.directory
            .active_id()
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound("No active thread".to_string()))
    }

    fn apply(&mut self, event: SessionEvent) -> Result<()> {
        let next = SessionStateMachine::transition(self.state, event)?;
        tracing::trace!(from = %self.state, to = %next, %event, "Session transition");
        self.state = next;
        Ok(())
    }

    fn ensure_not_in_flight(&self) -> Result<()> {
        if self.state.is_in_flight() {
            return Err(Error::ThreadSwitchDuringStream);
        }
        Ok(())
    }

    fn reload_messages(&mut self) {
        self.messages = match self.directory.active_id() {
            Some(id) => self.logs.load(self.directory.resource(), id),
            None => Vec::new(),
        };
        self.settled.clear();
        self.failed_turn = None;
        self.last_error = None;
    }

    fn save_messages(&self) -> Result<()> {
        debug_assert!(self.state.allows_persistence());
        let thread_id = self.active_id()?;
        self.logs
            .save(self.directory.resource(), &thread_id, &self.messages)
    }

    // ------------------------------------------------------------------------
    // Turn lifecycle
    // ------------------------------------------------------------------------

    /// Start a turn; returns the request to hand to the chat gateway
    ///
    /// An unacknowledged outcome of the previous turn is acknowledged first.
    pub fn submit(&mut self, text: String, images: Vec<ImageAttachment>) -> Result<ChatRequest> {
        if self.state.is_terminal() {
            self.apply(SessionEvent::Acknowledge)?;
        }

        let message = ChatMessage::new_user(text, images)?;
        self.apply(SessionEvent::Submit)?;

        let history = self.messages.iter().map(ChatMessage::to_llm).collect();
        let outgoing = message.to_llm();

        self.settled = self.messages.clone();
        self.messages.push(message);
        self.failed_turn = None;
        self.last_error = None;

        tracing::debug!(
            resource = %self.resource(),
            thread_id = self.directory.active_id(),
            "Submitted user message"
        );

        Ok(ChatRequest {
            model: self.llm.model.clone(),
            system_prompt: self.llm.system_prompt.clone(),
            document: self.document.clone(),
            history,
            message: outgoing,
            api_key: self.llm.api_key.clone(),
        })
    }

    /// Append a streamed fragment to the assistant reply
    pub fn on_fragment(&mut self, fragment: &str) -> Result<()> {
        self.apply(SessionEvent::Token)?;

        let reply_started = self.messages.len() > self.settled.len() + 1;
        match self.messages.last_mut() {
            Some(last) if reply_started && last.role == MessageRole::Assistant => {
                last.push_text(fragment);
            }
            _ => {
                let mut reply = ChatMessage::new_assistant();
                reply.push_text(fragment);
                self.messages.push(reply);
            }
        }
        Ok(())
    }

    /// Settle the turn: persist the full sequence and touch the thread
    pub fn on_complete(&mut self) -> Result<()> {
        self.apply(SessionEvent::Complete)?;
        self.settled.clear();
        self.record_turn()
    }

    /// Fail the turn: restore and persist the sequence from before it
    ///
    /// The failed user message is kept aside for `retry`. The returned error
    /// only reports a persistence problem; the stream failure itself is
    /// available from `last_error`.
    pub fn on_error(&mut self, reason: &str) -> Result<()> {
        self.apply(SessionEvent::Fail)?;

        let settled = std::mem::take(&mut self.settled);
        self.failed_turn = self.messages.get(settled.len()).map(|m| FailedTurn {
            text: m.text(),
            images: m.images(),
        });
        self.messages = settled;
        self.last_error = Some(reason.to_string());

        tracing::warn!(
            resource = %self.resource(),
            thread_id = self.directory.active_id(),
            reason,
            "Chat turn failed"
        );
        self.save_messages()
    }

    /// Cancel the turn, keeping any partial reply
    pub fn stop(&mut self) -> Result<()> {
        self.apply(SessionEvent::Stop)?;
        self.settled.clear();

        tracing::info!(
            resource = %self.resource(),
            thread_id = self.directory.active_id(),
            messages = self.messages.len(),
            "Chat turn cancelled"
        );
        self.record_turn()
    }

    /// Return to Idle after a settled, failed or cancelled turn
    pub fn acknowledge(&mut self) -> Result<()> {
        self.apply(SessionEvent::Acknowledge)
    }

    /// Resend the user message of the last failed turn
    pub fn retry(&mut self) -> Result<ChatRequest> {
        let turn = match (&self.failed_turn, self.state) {
            (Some(turn), state) if !state.is_in_flight() => turn.clone(),
            _ => {
                return Err(Error::Validation(
                    "There is no failed message to retry".to_string(),
                ))
            }
        };
        self.submit(turn.text, turn.images)
    }

    /// Persist the messages and record activity on the thread
    ///
    /// The thread is only touched once its log is stored. The in-memory
    /// sequence is kept even if either write fails.
    fn record_turn(&mut self) -> Result<()> {
        self.save_messages()?;
        let thread_id = self.active_id()?;
        self.directory.touch(&thread_id, Utc::now())
    }

    // ------------------------------------------------------------------------
    // Async driver
    // ------------------------------------------------------------------------

    /// Send a message and drive the reply stream to its end
    ///
    /// `stop` cancels the turn cooperatively; the partial reply is kept.
    pub async fn send_message(
        &mut self,
        service: &dyn ChatStreamService,
        text: String,
        images: Vec<ImageAttachment>,
        stop: Option<StopSignal>,
    ) -> Result<TurnOutcome> {
        let request = self.submit(text, images)?;
        self.drive(service, request, stop).await
    }

    /// Resend the last failed message and drive the reply stream
    pub async fn retry_message(
        &mut self,
        service: &dyn ChatStreamService,
        stop: Option<StopSignal>,
    ) -> Result<TurnOutcome> {
        let request = self.retry()?;
        self.drive(service, request, stop).await
    }

    async fn drive(
        &mut self,
        service: &dyn ChatStreamService,
        mut request: ChatRequest,
        mut stop: Option<StopSignal>,
    ) -> Result<TurnOutcome> {
        if request.model.is_empty() {
            request.model = service.default_model().to_string();
        }

        let mut stream = match service.open(request).await {
            Ok(stream) => stream,
            Err(e) => return self.abort_turn(e.to_string()),
        };

        loop {
            let next = match stop.as_mut() {
                Some(signal) => tokio::select! {
                    biased;
                    _ = signal.stopped() => NextStep::Stopped,
                    event = stream.next() => NextStep::Event(event),
                },
                None => NextStep::Event(stream.next().await),
            };

            match next {
                NextStep::Stopped => {
                    stream.stop();
                    self.stop()?;
                    return Ok(TurnOutcome::Cancelled);
                }
                NextStep::Event(Some(StreamEvent::Delta(fragment))) => {
                    self.on_fragment(&fragment)?;
                }
                NextStep::Event(Some(StreamEvent::Finished { stop_reason })) => {
                    tracing::debug!(%stop_reason, "Chat stream finished");
                    self.on_complete()?;
                    return Ok(TurnOutcome::Settled);
                }
                NextStep::Event(Some(StreamEvent::Failed(reason))) => {
                    return self.abort_turn(reason);
                }
                NextStep::Event(None) => {
                    return self.abort_turn("Stream closed before completion".to_string());
                }
            }
        }
    }

    fn abort_turn(&mut self, reason: String) -> Result<TurnOutcome> {
        if let Err(e) = self.on_error(&reason) {
            tracing::warn!(
                resource = %self.resource(),
                error = %e,
                "Failed to persist conversation after stream failure"
            );
        }
        Err(Error::StreamTransportFailure(reason))
    }

    // ------------------------------------------------------------------------
    // Thread management
    // ------------------------------------------------------------------------

    /// Make another thread active and load its messages
    pub fn switch_thread(&mut self, thread_id: &str) -> Result<()> {
        self.ensure_not_in_flight()?;
        self.directory.switch_active(thread_id)?;
        self.state = SessionState::Idle;
        self.reload_messages();
        Ok(())
    }

    /// Create a thread and make it active
    pub fn create_thread(&mut self, title: Option<&str>) -> Result<Thread> {
        self.ensure_not_in_flight()?;
        let thread = self.directory.create(title)?;
        self.state = SessionState::Idle;
        self.reload_messages();
        Ok(thread)
    }

    /// Delete a thread and its messages
    pub fn delete_thread(&mut self, thread_id: &str) -> Result<()> {
        self.ensure_not_in_flight()?;
        let was_active = self.directory.active_id() == Some(thread_id);
        self.directory.delete(thread_id)?;
        if was_active {
            self.state = SessionState::Idle;
            self.reload_messages();
        }
        Ok(())
    }

    pub fn rename_thread(&mut self, thread_id: &str, title: &str) -> Result<()> {
        self.ensure_not_in_flight()?;
        self.directory.rename(thread_id, title)
    }

    /// Remove every message of the active thread
    pub fn clear_messages(&mut self) -> Result<()> {
        self.ensure_not_in_flight()?;
        let thread_id = self.active_id()?;
        self.messages.clear();
        self.failed_turn = None;
        self.last_error = None;
        self.logs.clear(self.directory.resource(), &thread_id)
    }
}
