//! Persistence seam for finished messages

use std::collections::HashMap;

use async_trait::async_trait;
use parley_core::{ChatMessage, Conversation};
use tokio::sync::Mutex;

use crate::error::{Result, RuntimeError};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persist one finished message at the end of `conversation_id`.
    async fn append(&self, conversation_id: &str, message: ChatMessage) -> Result<()>;

    /// Every stored message of `conversation_id`, oldest first.
    async fn load(&self, conversation_id: &str) -> Result<Vec<ChatMessage>>;

    /// Rebuild the conversation, re-checking referential integrity.
    async fn conversation(&self, conversation_id: &str) -> Result<Conversation> {
        let messages = self.load(conversation_id).await?;
        Conversation::from_messages(conversation_id, messages)
            .map_err(|e| RuntimeError::Store(e.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, conversation_id: &str, message: ChatMessage) -> Result<()> {
        if !message.is_finished() {
            return Err(RuntimeError::Store(format!(
                "refusing to store unfinished message {}",
                message.id()
            )));
        }
        let mut conversations = self.conversations.lock().await;
        let messages = conversations.entry(conversation_id.to_string()).or_default();
        if messages.iter().any(|m| m.id() == message.id()) {
            return Err(RuntimeError::Store(format!(
                "conversation {} already stores message {}",
                conversation_id,
                message.id()
            )));
        }
        messages.push(message);
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let conversations = self.conversations.lock().await;
        Ok(conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}
