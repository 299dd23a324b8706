//! State machine error types
//!
//! Used by the chat session state machine and anything else that validates
//! transitions between named states.

use std::fmt::Display;

use thiserror::Error;

/// Errors that can occur during state transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Invalid transition: cannot leave {from} via {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Guard condition failed: {0}")]
    GuardFailed(String),

    #[error("Terminal state: {0} must be acknowledged before anything else happens")]
    TerminalState(String),
}

impl StateError {
    /// Build an `InvalidTransition` from any displayable state and event
    pub fn invalid(from: impl Display, event: impl Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            event: event.to_string(),
        }
    }
}
