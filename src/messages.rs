//! Chat prompt types
//!
//! Providers receive prompts as opaque strings. A prompt is either plain
//! text or a JSON-encoded array of `{role, content}` messages; this module
//! tells the two apart and validates the message form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PyChatError, Result};

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::str::FromStr for Role {
    type Err = PyChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(PyChatError::InvalidMessages(
                "Message role must be 'system', 'user', or 'assistant'".to_string(),
            )),
        }
    }
}

/// A single chat message
///
/// `content` is usually text but may be any JSON the backend accepts
/// (content-part arrays, for instance), so it is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Value,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Value::String(content.into()),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Value::String(content.into()),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Value::String(content.into()),
        }
    }
}

/// A prompt as the chat script will interpret it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPrompt {
    /// Plain text, sent as a single user message
    Text(String),
    /// An explicit conversation
    Messages(Vec<ChatMessage>),
}

impl ChatPrompt {
    /// Classify a raw prompt string
    ///
    /// Strings that parse as a JSON array are treated as message lists and
    /// validated; everything else is plain text.
    ///
    /// # Errors
    ///
    /// Returns [`PyChatError::InvalidMessages`] if the prompt is a JSON array
    /// whose elements are not valid messages
    pub fn parse(prompt: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(prompt) {
            Ok(Value::Array(items)) => validate_messages(&items).map(Self::Messages),
            _ => Ok(Self::Text(prompt.to_string())),
        }
    }

    /// The messages this prompt expands to
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        match self {
            Self::Text(text) => vec![ChatMessage::user(text.clone())],
            Self::Messages(messages) => messages.clone(),
        }
    }

    /// Render back to the opaque prompt string providers take
    ///
    /// # Errors
    ///
    /// Returns an error if the messages cannot be serialized
    pub fn to_prompt_string(&self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::Messages(messages) => Ok(serde_json::to_string(messages)?),
        }
    }
}

/// Validate a decoded JSON message list
///
/// # Errors
///
/// Returns [`PyChatError::InvalidMessages`] on the first malformed element
pub fn validate_messages(items: &[Value]) -> Result<Vec<ChatMessage>> {
    items
        .iter()
        .map(|item| {
            let object = item.as_object().ok_or_else(|| {
                PyChatError::InvalidMessages("Each message must be an object".to_string())
            })?;

            let (Some(role), Some(content)) = (object.get("role"), object.get("content")) else {
                return Err(PyChatError::InvalidMessages(
                    "Each message must have 'role' and 'content' fields".to_string(),
                ));
            };

            let role = role.as_str().unwrap_or_default().parse::<Role>()?;

            Ok(ChatMessage {
                role,
                content: content.clone(),
            })
        })
        .collect()
}
