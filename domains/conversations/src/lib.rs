//! Conversations domain: paper chat threads, message logs, session controller

pub mod domain;
pub mod repository;
pub mod session;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{
    ChatMessage, MessagePart, MessageRole, Thread, DEFAULT_THREAD_ID, DEFAULT_THREAD_TITLE,
};
pub use domain::state::{SessionEvent, SessionState, SessionStateMachine, StateError};

// Re-export repository types
pub use repository::{ConversationsRepositories, DirectoryOptions, MessageLogStore, ThreadDirectory};

pub use session::{ConversationSession, TurnOutcome};
