use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// Result of one finished generation: the conversation including the new
/// message, and that message's text projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub messages: Vec<ChatMessage>,
    pub response: String,
}

impl ChatResponse {
    pub fn new(messages: Vec<ChatMessage>, response: impl Into<String>) -> Self {
        Self {
            messages,
            response: response.into(),
        }
    }

    /// The message this response was produced for.
    pub fn message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}
