use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{CoreError, Result};

/// Forward-compatible fields carried beside the typed ones. Keys this crate
/// does not know about are kept verbatim across a serde round trip.
pub type Extra = Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Binary,
    ToolCall,
    ToolCallResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryStorage {
    Url,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryContent {
    pub storage: BinaryStorage,
    pub mime_type: String,
    pub payload: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallContent {
    pub call_id: String,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, JsonValue>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResultContent {
    pub result_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub result: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// One typed unit of message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentItem {
    Text(TextContent),
    Binary(BinaryContent),
    ToolCall(ToolCallContent),
    ToolCallResult(ToolCallResultContent),
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text(TextContent {
            text: text.into(),
            extra: Extra::new(),
        })
    }

    /// Fails with `InvalidContent` unless `mime_type` is a `type/subtype` token.
    pub fn binary(
        storage: BinaryStorage,
        mime_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<Self> {
        let mime_type = mime_type.into();
        validate_mime_type(&mime_type)?;
        Ok(ContentItem::Binary(BinaryContent {
            storage,
            mime_type,
            payload: payload.into(),
            extra: Extra::new(),
        }))
    }

    /// Fails with `InvalidContent` when `tool_name` is empty.
    pub fn tool_call(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Option<Map<String, JsonValue>>,
    ) -> Result<Self> {
        let tool_name = tool_name.into();
        if tool_name.trim().is_empty() {
            return Err(CoreError::InvalidContent(
                "tool call requires a tool name".to_string(),
            ));
        }
        Ok(ContentItem::ToolCall(ToolCallContent {
            call_id: call_id.into(),
            tool_name,
            arguments,
            extra: Extra::new(),
        }))
    }

    pub fn tool_call_result(
        result_id: impl Into<String>,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        ContentItem::ToolCallResult(ToolCallResultContent {
            result_id: result_id.into(),
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            result: result.into(),
            extra: Extra::new(),
        })
    }

    /// Attach one extension field.
    pub fn with_extra(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.extra_mut().insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentItem::Text(_) => ContentKind::Text,
            ContentItem::Binary(_) => ContentKind::Binary,
            ContentItem::ToolCall(_) => ContentKind::ToolCall,
            ContentItem::ToolCallResult(_) => ContentKind::ToolCallResult,
        }
    }

    pub fn extra(&self) -> &Extra {
        match self {
            ContentItem::Text(c) => &c.extra,
            ContentItem::Binary(c) => &c.extra,
            ContentItem::ToolCall(c) => &c.extra,
            ContentItem::ToolCallResult(c) => &c.extra,
        }
    }

    fn extra_mut(&mut self) -> &mut Extra {
        match self {
            ContentItem::Text(c) => &mut c.extra,
            ContentItem::Binary(c) => &mut c.extra,
            ContentItem::ToolCall(c) => &mut c.extra,
            ContentItem::ToolCallResult(c) => &mut c.extra,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallContent> {
        match self {
            ContentItem::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_call_result(&self) -> Option<&ToolCallResultContent> {
        match self {
            ContentItem::ToolCallResult(result) => Some(result),
            _ => None,
        }
    }

    /// Re-checks the construction rules; used for items that arrived through serde.
    pub fn validate(&self) -> Result<()> {
        match self {
            ContentItem::Binary(binary) => validate_mime_type(&binary.mime_type),
            ContentItem::ToolCall(call) if call.tool_name.trim().is_empty() => Err(
                CoreError::InvalidContent("tool call requires a tool name".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Text projection of this item. Never fails.
    pub fn as_text(&self) -> String {
        match self {
            ContentItem::Text(text) => text.text.clone(),
            ContentItem::Binary(binary) => {
                format!("Binary Content\nMime type: {}", binary.mime_type)
            }
            ContentItem::ToolCall(call) => {
                let arguments = match &call.arguments {
                    Some(map) => JsonValue::Object(map.clone()).to_string(),
                    None => JsonValue::Null.to_string(),
                };
                format!("Tool Use: {}\nTool Arguments: {}", call.tool_name, arguments)
            }
            ContentItem::ToolCallResult(result) => {
                format!(
                    "Tool Use: {}\nTool Result: {}",
                    result.tool_name, result.result
                )
            }
        }
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c)
}

/// Accepts `type/subtype`, optionally followed by `;` parameters.
fn validate_mime_type(mime_type: &str) -> Result<()> {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    let valid = match essence.split_once('/') {
        Some((kind, subtype)) => {
            !kind.is_empty()
                && !subtype.is_empty()
                && kind.chars().all(is_token_char)
                && subtype.chars().all(is_token_char)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidContent(format!(
            "invalid mime type: {:?}",
            mime_type
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_projection() {
        assert_eq!(ContentItem::text("hello").as_text(), "hello");
    }

    #[test]
    fn test_binary_projection() {
        let item = ContentItem::binary(BinaryStorage::Url, "image/png", "https://x/y.png").unwrap();
        assert_eq!(item.as_text(), "Binary Content\nMime type: image/png");
    }

    #[test]
    fn test_tool_call_projection() {
        let args = json!({"city": "Oslo"}).as_object().cloned();
        let item = ContentItem::tool_call("c1", "weather", args).unwrap();
        assert_eq!(
            item.as_text(),
            "Tool Use: weather\nTool Arguments: {\"city\":\"Oslo\"}"
        );
    }

    #[test]
    fn test_tool_call_projection_without_arguments() {
        let item = ContentItem::tool_call("c1", "clock", None).unwrap();
        assert_eq!(item.as_text(), "Tool Use: clock\nTool Arguments: null");
    }

    #[test]
    fn test_tool_call_result_projection() {
        let item = ContentItem::tool_call_result("r1", "c1", "weather", "sunny");
        assert_eq!(item.as_text(), "Tool Use: weather\nTool Result: sunny");
    }

    #[test]
    fn test_binary_rejects_bad_mime() {
        for bad in ["", "image", "/png", "image/", "im age/png"] {
            let err = ContentItem::binary(BinaryStorage::Base64, bad, "AAAA").unwrap_err();
            assert!(matches!(err, CoreError::InvalidContent(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_binary_accepts_mime_parameters() {
        assert!(ContentItem::binary(BinaryStorage::Base64, "text/plain; charset=utf-8", "aGk=").is_ok());
        assert!(ContentItem::binary(BinaryStorage::Url, "application/vnd.api+json", "u").is_ok());
    }

    #[test]
    fn test_tool_call_requires_name() {
        let err = ContentItem::tool_call("c1", "  ", None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidContent(_)));
    }

    #[test]
    fn test_kind_tag_serialization() {
        let json = serde_json::to_value(ContentItem::text("hi")).unwrap();
        assert_eq!(json, json!({"kind": "text", "text": "hi"}));

        let call = ContentItem::tool_call("c1", "search", None).unwrap();
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json, json!({"kind": "tool_call", "callId": "c1", "toolName": "search"}));
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "kind": "tool_call_result",
            "resultId": "r1",
            "callId": "c1",
            "toolName": "search",
            "result": "3 hits",
            "latencyMs": 42,
            "annotations": {"pinned": true}
        });
        let item: ContentItem = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(item.kind(), ContentKind::ToolCallResult);
        assert_eq!(item.extra().get("latencyMs"), Some(&json!(42)));
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_with_extra() {
        let item = ContentItem::text("hi").with_extra("lang", json!("en"));
        assert_eq!(item.extra().get("lang"), Some(&json!("en")));
    }

    #[test]
    fn test_validate_deserialized_binary() {
        let raw = json!({"kind": "binary", "storage": "url", "mimeType": "nonsense", "payload": "u"});
        let item: ContentItem = serde_json::from_value(raw).unwrap();
        assert!(item.validate().is_err());
    }
}
