use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::content::{
    BinaryStorage, ContentItem, Extra, ToolCallContent, ToolCallResultContent,
};
use crate::error::{CoreError, Result};
use crate::id::IdGenerator;

/// Metadata key under which a custom role's name is stored.
pub const CUSTOM_ROLE_NAME_KEY: &str = "custom_role_name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Custom,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One conversational turn: an ordered list of content items plus metadata.
///
/// Content order is conversational order. Once [`ChatMessage::finish`] has
/// been called every mutating operation fails with `InvalidState` and leaves
/// the message untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    id: String,
    role: Role,
    content: Vec<ContentItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    meta: Map<String, JsonValue>,
    #[serde(default)]
    finished: bool,
    #[serde(flatten)]
    extra: Extra,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            role,
            content: Vec::new(),
            created_at: now,
            updated_at: now,
            meta: Map::new(),
            finished: false,
            extra: Extra::new(),
        }
    }

    fn with_single_text(ids: &dyn IdGenerator, role: Role, text: impl Into<String>) -> Self {
        let mut message = Self::new(ids.next_id(), role);
        message.content.push(ContentItem::text(text));
        message
    }

    pub fn system(ids: &dyn IdGenerator, text: impl Into<String>) -> Self {
        Self::with_single_text(ids, Role::System, text)
    }

    pub fn user(ids: &dyn IdGenerator, text: impl Into<String>) -> Self {
        Self::with_single_text(ids, Role::User, text)
    }

    pub fn assistant(ids: &dyn IdGenerator, text: impl Into<String>) -> Self {
        Self::with_single_text(ids, Role::Assistant, text)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &[ContentItem] {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn meta(&self) -> &Map<String, JsonValue> {
        &self.meta
    }

    pub fn extra(&self) -> &Extra {
        &self.extra
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.finished {
            return Err(CoreError::InvalidState(format!(
                "cannot {} on finished message {}",
                operation, self.id
            )));
        }
        Ok(())
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at);
    }

    /// Append an already-built item.
    pub fn append(&mut self, item: ContentItem) -> Result<()> {
        self.ensure_open("append content")?;
        item.validate()?;
        self.content.push(item);
        self.touch();
        Ok(())
    }

    pub fn append_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.append(ContentItem::text(text))
    }

    pub fn append_binary(
        &mut self,
        storage: BinaryStorage,
        mime_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<()> {
        self.ensure_open("append content")?;
        self.append(ContentItem::binary(storage, mime_type, payload)?)
    }

    /// Image referenced by URL; `image_format` becomes `image/<format>`.
    pub fn append_image_url(&mut self, url: impl Into<String>, image_format: &str) -> Result<()> {
        self.append_binary(BinaryStorage::Url, format!("image/{}", image_format), url)
    }

    pub fn append_base64(&mut self, data: impl Into<String>, mime_type: impl Into<String>) -> Result<()> {
        self.append_binary(BinaryStorage::Base64, mime_type, data)
    }

    pub fn append_tool_call(
        &mut self,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Option<Map<String, JsonValue>>,
    ) -> Result<()> {
        self.ensure_open("append content")?;
        self.append(ContentItem::tool_call(call_id, tool_name, arguments)?)
    }

    pub fn append_tool_call_result(
        &mut self,
        result_id: impl Into<String>,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: impl Into<String>,
    ) -> Result<()> {
        self.append(ContentItem::tool_call_result(result_id, call_id, tool_name, result))
    }

    /// Newline-joined text projection of every item, in content order.
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn contains_tool_call(&self) -> bool {
        self.content.iter().any(|c| c.as_tool_call().is_some())
    }

    pub fn tool_calls(&self) -> Vec<&ToolCallContent> {
        self.content.iter().filter_map(ContentItem::as_tool_call).collect()
    }

    pub fn tool_call_results(&self) -> Vec<&ToolCallResultContent> {
        self.content
            .iter()
            .filter_map(ContentItem::as_tool_call_result)
            .collect()
    }

    /// Only assistant and custom messages may take a custom role.
    pub fn set_custom_role(&mut self, name: impl Into<String>) -> Result<()> {
        self.ensure_open("set custom role")?;
        if !matches!(self.role, Role::Assistant | Role::Custom) {
            return Err(CoreError::InvalidState(format!(
                "cannot assign a custom role to a {} message",
                self.role
            )));
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::InvalidContent(
                "custom role name must not be empty".to_string(),
            ));
        }
        self.role = Role::Custom;
        self.meta
            .insert(CUSTOM_ROLE_NAME_KEY.to_string(), JsonValue::String(name));
        self.touch();
        Ok(())
    }

    pub fn custom_role_name(&self) -> Option<&str> {
        self.meta.get(CUSTOM_ROLE_NAME_KEY).and_then(|v| v.as_str())
    }

    pub fn insert_meta(&mut self, key: impl Into<String>, value: JsonValue) -> Result<()> {
        self.ensure_open("update metadata")?;
        self.meta.insert(key.into(), value);
        self.touch();
        Ok(())
    }

    pub fn insert_extra(&mut self, key: impl Into<String>, value: JsonValue) -> Result<()> {
        self.ensure_open("update extension fields")?;
        self.extra.insert(key.into(), value);
        self.touch();
        Ok(())
    }

    /// Mark the message finished. Finishing twice is an `InvalidState`.
    pub fn finish(&mut self) -> Result<()> {
        self.ensure_open("finish")?;
        self.finished = true;
        self.touch();
        Ok(())
    }

    /// Structural checks for messages that arrived through serde.
    pub fn validate(&self) -> Result<()> {
        if self.role == Role::Custom
            && self.custom_role_name().map_or(true, |n| n.trim().is_empty())
        {
            return Err(CoreError::InvalidContent(format!(
                "custom message {} has no {}",
                self.id, CUSTOM_ROLE_NAME_KEY
            )));
        }
        for item in &self.content {
            item.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIdGenerator;
    use serde_json::json;

    fn assistant() -> ChatMessage {
        ChatMessage::new("m1", Role::Assistant)
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Custom).unwrap();
        assert_eq!(json, "\"custom\"");
        let decoded: Role = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(decoded, Role::Tool);
    }

    #[test]
    fn test_factory_methods_use_injected_ids() {
        let ids = SequentialIdGenerator::new("m");
        let system = ChatMessage::system(&ids, "be brief");
        let user = ChatMessage::user(&ids, "hi");
        assert_eq!(system.id(), "m-1");
        assert_eq!(system.role(), Role::System);
        assert_eq!(user.id(), "m-2");
        assert_eq!(user.as_text(), "hi");
    }

    #[test]
    fn test_as_text_joins_in_order() {
        let mut message = assistant();
        message.append_text("Looking it up.").unwrap();
        message
            .append_tool_call("c1", "search", json!({"q": "rust"}).as_object().cloned())
            .unwrap();
        message
            .append_tool_call_result("r1", "c1", "search", "2 results")
            .unwrap();
        message.append_image_url("https://img/1.png", "png").unwrap();

        let expected = [
            "Looking it up.",
            "Tool Use: search\nTool Arguments: {\"q\":\"rust\"}",
            "Tool Use: search\nTool Result: 2 results",
            "Binary Content\nMime type: image/png",
        ]
        .join("\n");
        assert_eq!(message.as_text(), expected);
        assert_eq!(message.as_text(), message.as_text());
    }

    #[test]
    fn test_append_after_finish_fails_without_mutation() {
        let mut message = assistant();
        message.append_text("done").unwrap();
        message.finish().unwrap();
        let before = message.clone();

        assert!(matches!(message.append_text("more"), Err(CoreError::InvalidState(_))));
        assert!(matches!(
            message.append_base64("AAAA", "image/png"),
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(
            message.append_tool_call("c1", "x", None),
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(
            message.append_tool_call_result("r", "c", "x", "y"),
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(message.finish(), Err(CoreError::InvalidState(_))));
        assert_eq!(message, before);
    }

    #[test]
    fn test_tool_call_accessors() {
        let mut message = assistant();
        assert!(!message.contains_tool_call());
        message.append_text("x").unwrap();
        message.append_tool_call("c1", "a", None).unwrap();
        message.append_tool_call("c2", "b", None).unwrap();
        assert!(message.contains_tool_call());
        let names: Vec<_> = message.tool_calls().iter().map(|c| c.tool_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_set_custom_role() {
        let mut message = assistant();
        message.set_custom_role("critic").unwrap();
        assert_eq!(message.role(), Role::Custom);
        assert_eq!(message.custom_role_name(), Some("critic"));
        message.set_custom_role("reviewer").unwrap();
        assert_eq!(message.custom_role_name(), Some("reviewer"));
        assert!(message.validate().is_ok());
    }

    #[test]
    fn test_set_custom_role_rejected_for_user_and_system() {
        let ids = SequentialIdGenerator::new("m");
        for mut message in [ChatMessage::user(&ids, "u"), ChatMessage::system(&ids, "s")] {
            let role = message.role();
            assert!(matches!(
                message.set_custom_role("x"),
                Err(CoreError::InvalidState(_))
            ));
            assert_eq!(message.role(), role);
            assert!(message.custom_role_name().is_none());
        }
    }

    #[test]
    fn test_validate_requires_custom_role_name() {
        let message = ChatMessage::new("m1", Role::Custom);
        assert!(matches!(message.validate(), Err(CoreError::InvalidContent(_))));
    }

    #[test]
    fn test_updated_at_moves_forward() {
        let mut message = assistant();
        let created = message.created_at();
        message.append_text("a").unwrap();
        assert!(message.updated_at() >= created);
    }

    #[test]
    fn test_serialization_preserves_extension_fields() {
        let raw = json!({
            "id": "m7",
            "role": "assistant",
            "content": [{"kind": "text", "text": "hi", "tokens": 1}],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:01Z",
            "meta": {"model": "m"},
            "finished": true,
            "chatId": "chat-3"
        });
        let message: ChatMessage = serde_json::from_value(raw.clone()).unwrap();
        assert!(message.is_finished());
        assert_eq!(message.extra().get("chatId"), Some(&json!("chat-3")));
        assert_eq!(message.content()[0].extra().get("tokens"), Some(&json!(1)));
        assert_eq!(serde_json::to_value(&message).unwrap(), raw);
    }
}
