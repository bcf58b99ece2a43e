//! Ordered, append-only list of finished messages.
//!
//! The conversation is where tool-call referential integrity is enforced: a
//! ToolCallResult may only reference a ToolCall that precedes it in the same
//! conversation. References to calls from other conversations are rejected.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::message::ChatMessage;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    id: String,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    /// Rebuild a conversation from stored messages, re-checking every invariant.
    pub fn from_messages(id: impl Into<String>, messages: Vec<ChatMessage>) -> Result<Self> {
        let mut conversation = Self::new(id);
        for message in messages {
            conversation.append(message)?;
        }
        Ok(conversation)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    /// Call ids of every ToolCall in the conversation so far.
    pub fn known_call_ids(&self) -> HashSet<&str> {
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls())
            .map(|c| c.call_id.as_str())
            .collect()
    }

    pub fn has_call_id(&self, call_id: &str) -> bool {
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls())
            .any(|c| c.call_id == call_id)
    }

    /// Checks that every result in `message` references a call seen before it.
    pub fn check_references(&self, message: &ChatMessage) -> Result<()> {
        let mut known: HashSet<&str> = self.known_call_ids();
        for item in message.content() {
            if let Some(call) = item.as_tool_call() {
                known.insert(call.call_id.as_str());
            } else if let Some(result) = item.as_tool_call_result() {
                if !known.contains(result.call_id.as_str()) {
                    return Err(CoreError::Integrity {
                        result_id: result.result_id.clone(),
                        call_id: result.call_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Append a finished message. The conversation takes ownership of it.
    pub fn append(&mut self, message: ChatMessage) -> Result<()> {
        if !message.is_finished() {
            return Err(CoreError::InvalidState(format!(
                "message {} must be finished before it joins conversation {}",
                message.id(),
                self.id
            )));
        }
        if self.messages.iter().any(|m| m.id() == message.id()) {
            return Err(CoreError::InvalidState(format!(
                "conversation {} already contains message {}",
                self.id,
                message.id()
            )));
        }
        message.validate()?;
        self.check_references(&message)?;
        self.messages.push(message);
        Ok(())
    }

    /// Bump `updatedAt` on a message this conversation owns.
    pub fn touch(&mut self, message_id: &str) -> Result<()> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id() == message_id)
            .ok_or_else(|| {
                CoreError::InvalidState(format!(
                    "conversation {} has no message {}",
                    self.id, message_id
                ))
            })?;
        message.touch();
        Ok(())
    }

    pub fn as_text(&self) -> String {
        self.messages
            .iter()
            .map(ChatMessage::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
