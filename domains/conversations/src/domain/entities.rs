//! Domain entities for the Conversations domain
//!
//! Threads are the named conversations attached to one paper; messages are
//! the ordered turns inside a thread. Both are stored as camelCase JSON so
//! values written by earlier schema versions keep loading: unknown fields are
//! ignored, and records missing required fields fail to parse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use paperchat_common::{Error, Result};
use paperchat_llm::{ImageAttachment, LlmMessage, LlmRole};

/// Id of the thread every paper starts with
pub const DEFAULT_THREAD_ID: &str = "default";

/// Title of the thread every paper starts with
pub const DEFAULT_THREAD_TITLE: &str = "Main Thread";

/// Maximum thread title length
const MAX_TITLE_LENGTH: usize = 200;

/// Conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl Thread {
    /// Create a thread with a fresh id
    pub fn new(title: String) -> Result<Self> {
        Self::with_id(Uuid::new_v4().simple().to_string(), title)
    }

    /// Create a thread with a caller-chosen id
    pub fn with_id(id: String, title: String) -> Result<Self> {
        let title = Self::validate_title(&title)?;
        let now = Utc::now();
        Ok(Thread {
            id,
            title,
            created_at: now,
            last_message_at: now,
        })
    }

    /// The thread every paper starts with
    pub fn main() -> Self {
        let now = Utc::now();
        Thread {
            id: DEFAULT_THREAD_ID.to_string(),
            title: DEFAULT_THREAD_TITLE.to_string(),
            created_at: now,
            last_message_at: now,
        }
    }

    /// Trim a title and check its length
    pub fn validate_title(title: &str) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation(
                "Thread title cannot be empty or whitespace-only".to_string(),
            ));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(Error::Validation(format!(
                "Thread title must be at most {} characters",
                MAX_TITLE_LENGTH
            )));
        }
        Ok(title.to_string())
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl From<MessageRole> for LlmRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => LlmRole::User,
            MessageRole::Assistant => LlmRole::Assistant,
        }
    }
}

/// One content part of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        media_type: String,
        url: String,
    },
}

impl From<ImageAttachment> for MessagePart {
    fn from(image: ImageAttachment) -> Self {
        MessagePart::Image {
            media_type: image.media_type,
            url: image.url,
        }
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub parts: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Create a user message with optional captured images
    pub fn new_user(text: String, images: Vec<ImageAttachment>) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::Validation(
                "Message content cannot be empty or whitespace-only".to_string(),
            ));
        }

        let mut parts = vec![MessagePart::Text { text }];
        parts.extend(images.into_iter().map(MessagePart::from));

        Ok(ChatMessage {
            id: Uuid::new_v4().simple().to_string(),
            role: MessageRole::User,
            parts,
            created_at: Some(Utc::now()),
        })
    }

    /// Create an empty assistant message that fragments are appended to
    pub fn new_assistant() -> Self {
        ChatMessage {
            id: Uuid::new_v4().simple().to_string(),
            role: MessageRole::Assistant,
            parts: Vec::new(),
            created_at: Some(Utc::now()),
        }
    }

    /// Append streamed text, extending the trailing text part
    pub fn push_text(&mut self, fragment: &str) {
        match self.parts.last_mut() {
            Some(MessagePart::Text { text }) => text.push_str(fragment),
            _ => self.parts.push(MessagePart::Text {
                text: fragment.to_string(),
            }),
        }
    }

    /// All text parts joined
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::Image { .. } => None,
            })
            .collect()
    }

    /// Character count of the text, used for display sizing
    pub fn text_len(&self) -> usize {
        self.parts
            .iter()
            .map(|part| match part {
                MessagePart::Text { text } => text.chars().count(),
                MessagePart::Image { .. } => 0,
            })
            .sum()
    }

    /// Image parts as gateway attachments
    pub fn images(&self) -> Vec<ImageAttachment> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Image { media_type, url } => Some(ImageAttachment {
                    media_type: media_type.clone(),
                    url: url.clone(),
                }),
                MessagePart::Text { .. } => None,
            })
            .collect()
    }

    /// Convert to the gateway's message shape
    pub fn to_llm(&self) -> LlmMessage {
        LlmMessage {
            role: self.role.into(),
            content: self.text(),
            images: self.images(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
