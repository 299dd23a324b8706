//! State machine for a chat session's turn lifecycle
//!
//! Session states: Idle → Sending → Streaming → Settled | Errored | Cancelled,
//! with every outcome acknowledged back to Idle.
//!
//! Durable writes are only allowed outside Sending and Streaming.

pub use paperchat_common::StateError;
use serde::{Deserialize, Serialize};

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Sending,
    Streaming,
    Settled,
    Errored,
    Cancelled,
}

impl SessionState {
    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [SessionState] {
        match self {
            Self::Idle => &[Self::Sending],
            Self::Sending => &[Self::Streaming, Self::Settled, Self::Errored, Self::Cancelled],
            Self::Streaming => &[Self::Streaming, Self::Settled, Self::Errored, Self::Cancelled],
            Self::Settled | Self::Errored | Self::Cancelled => &[Self::Idle],
        }
    }

    /// A turn has ended and waits to be acknowledged
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Errored | Self::Cancelled)
    }

    /// A turn is in flight; thread changes and durable writes must wait
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }

    #[mutants::skip] // Negation of is_in_flight(), covered by its tests
    pub fn allows_persistence(&self) -> bool {
        !self.is_in_flight()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Sending => write!(f, "sending"),
            Self::Streaming => write!(f, "streaming"),
            Self::Settled => write!(f, "settled"),
            Self::Errored => write!(f, "errored"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Events that drive session state transitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// User submitted a message
    Submit,
    /// A response fragment arrived
    Token,
    /// The gateway signalled completion
    Complete,
    /// The gateway or transport failed
    Fail,
    /// User asked to stop the response
    Stop,
    /// The caller has seen the outcome of the turn
    Acknowledge,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submit => write!(f, "submit"),
            Self::Token => write!(f, "token"),
            Self::Complete => write!(f, "complete"),
            Self::Fail => write!(f, "fail"),
            Self::Stop => write!(f, "stop"),
            Self::Acknowledge => write!(f, "acknowledge"),
        }
    }
}

/// Session state machine
pub struct SessionStateMachine;

impl SessionStateMachine {
    /// Attempt a state transition
    pub fn transition(
        current: SessionState,
        event: SessionEvent,
    ) -> Result<SessionState, StateError> {
        use SessionEvent as E;
        use SessionState as S;

        let next = match (current, event) {
            (S::Idle, E::Submit) => S::Sending,
            (S::Sending | S::Streaming, E::Token) => S::Streaming,
            (S::Sending | S::Streaming, E::Complete) => S::Settled,
            (S::Sending | S::Streaming, E::Fail) => S::Errored,
            (S::Sending | S::Streaming, E::Stop) => S::Cancelled,
            (S::Settled | S::Errored | S::Cancelled, E::Acknowledge) => S::Idle,
            (state, _) if state.is_terminal() => {
                return Err(StateError::TerminalState(state.to_string()));
            }
            _ => return Err(StateError::invalid(current, event)),
        };

        Ok(next)
    }
}
