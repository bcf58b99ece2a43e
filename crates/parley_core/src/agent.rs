use serde::{Deserialize, Serialize};

use crate::conversation::Conversation;
use crate::error::Result;
use crate::message::ChatMessage;
use crate::tool::AgentTool;

/// A configured agent: instructions plus the tools it may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub system_message: ChatMessage,
    #[serde(default)]
    pub tools: Vec<AgentTool>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        system_message: ChatMessage,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            system_message,
            tools: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: AgentTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Start a conversation whose first message is this agent's system message.
    pub fn conversation(&self, conversation_id: impl Into<String>) -> Result<Conversation> {
        let mut system = self.system_message.clone();
        if !system.is_finished() {
            system.finish()?;
        }
        let mut conversation = Conversation::new(conversation_id);
        conversation.append(system)?;
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIdGenerator;
    use crate::message::Role;

    #[test]
    fn test_agent_conversation_starts_with_system_message() {
        let ids = SequentialIdGenerator::new("m");
        let agent = Agent::new("a1", "helper", "general help", ChatMessage::system(&ids, "You help."));
        let conversation = agent.conversation("conv-1").unwrap();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].role(), Role::System);
        assert!(conversation.messages()[0].is_finished());
        assert!(!agent.system_message.is_finished());
    }
}
