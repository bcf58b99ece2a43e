use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::content::Extra;
use crate::error::{CoreError, Result};
use crate::message::ChatMessage;

/// A piece of a tool call as streamed by the model-serving source.
///
/// The first fragment for a call normally names the tool; later ones append
/// to the argument payload. `closed` marks the last fragment of the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallFragment {
    #[serde(alias = "tool_call_id")]
    pub call_id: String,
    #[serde(default, alias = "tool_call_name", skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arguments_delta: String,
    #[serde(default, alias = "tool_call_arguments", skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, JsonValue>>,
    #[serde(default)]
    pub closed: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ToolCallFragment {
    pub fn start(call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: Some(tool_name.into()),
            arguments_delta: String::new(),
            arguments: None,
            closed: false,
            extra: Extra::new(),
        }
    }

    pub fn delta(call_id: impl Into<String>, arguments_delta: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: None,
            arguments_delta: arguments_delta.into(),
            arguments: None,
            closed: false,
            extra: Extra::new(),
        }
    }

    pub fn close(call_id: impl Into<String>) -> Self {
        Self::delta(call_id, "").closed()
    }

    pub fn with_arguments_delta(mut self, delta: impl Into<String>) -> Self {
        self.arguments_delta = delta.into();
        self
    }

    /// Arguments delivered already parsed; completes the call.
    pub fn with_arguments(mut self, arguments: Map<String, JsonValue>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }
}

/// Outcome of a tool execution reported through the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResultEvent {
    #[serde(alias = "tool_call_id")]
    pub call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(default, alias = "tool_call_name", skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(alias = "tool_call_result")]
    pub result: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ToolCallResultEvent {
    pub fn new(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            result_id: None,
            tool_name: None,
            result: result.into(),
            extra: Extra::new(),
        }
    }

    pub fn with_result_id(mut self, result_id: impl Into<String>) -> Self {
        self.result_id = Some(result_id.into());
        self
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }
}

/// One event of a generation, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    TextDelta { chunk: String },

    ToolCallDelta { fragment: ToolCallFragment },

    ToolCallResult { result: ToolCallResultEvent },

    Finished {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<Box<ChatMessage>>,
    },
}

impl StreamEvent {
    pub fn text_delta(chunk: impl Into<String>) -> Self {
        StreamEvent::TextDelta {
            chunk: chunk.into(),
        }
    }

    pub fn tool_call_delta(fragment: ToolCallFragment) -> Self {
        StreamEvent::ToolCallDelta { fragment }
    }

    pub fn tool_call_result(result: ToolCallResultEvent) -> Self {
        StreamEvent::ToolCallResult { result }
    }

    pub fn finished() -> Self {
        StreamEvent::Finished { message: None }
    }

    pub fn finished_with(message: ChatMessage) -> Self {
        StreamEvent::Finished {
            message: Some(Box::new(message)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Finished { .. })
    }

    pub fn tool_name(&self) -> Option<&str> {
        match self {
            StreamEvent::ToolCallDelta { fragment } => fragment.tool_name.as_deref(),
            StreamEvent::ToolCallResult { result } => result.tool_name.as_deref(),
            _ => None,
        }
    }

    pub fn tool_arguments(&self) -> Option<&Map<String, JsonValue>> {
        match self {
            StreamEvent::ToolCallDelta { fragment } => fragment.arguments.as_ref(),
            _ => None,
        }
    }

    pub fn tool_result(&self) -> Option<&str> {
        match self {
            StreamEvent::ToolCallResult { result } => Some(&result.result),
            _ => None,
        }
    }
}

/// Flag-based record shape used on the wire between collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStreamEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    #[serde(default, alias = "hasToolCall")]
    pub is_tool_call: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallFragment>,
    #[serde(default)]
    pub has_tool_call_result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_result: Option<ToolCallResultEvent>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_message: Option<ChatMessage>,
}

fn malformed(reason: &str) -> CoreError {
    CoreError::MalformedEvent(reason.to_string())
}

impl TryFrom<WireStreamEvent> for StreamEvent {
    type Error = CoreError;

    fn try_from(wire: WireStreamEvent) -> Result<Self> {
        let flags = [wire.is_tool_call, wire.has_tool_call_result, wire.finished]
            .iter()
            .filter(|set| **set)
            .count();
        if flags > 1 {
            return Err(malformed(
                "record sets more than one of isToolCall, hasToolCallResult, finished",
            ));
        }
        let has_text = wire.chunk.as_deref().is_some_and(|c| !c.is_empty());
        if flags == 1 && has_text {
            return Err(malformed("text chunk on a non-text record"));
        }

        if wire.is_tool_call {
            let fragment = wire
                .tool_call
                .ok_or_else(|| malformed("isToolCall without toolCall"))?;
            Ok(StreamEvent::ToolCallDelta { fragment })
        } else if wire.has_tool_call_result {
            let result = wire
                .tool_call_result
                .ok_or_else(|| malformed("hasToolCallResult without toolCallResult"))?;
            Ok(StreamEvent::ToolCallResult { result })
        } else if wire.finished {
            Ok(StreamEvent::Finished {
                message: wire.finished_message.map(Box::new),
            })
        } else {
            let chunk = wire.chunk.ok_or_else(|| malformed("record carries no payload"))?;
            Ok(StreamEvent::TextDelta { chunk })
        }
    }
}

impl From<StreamEvent> for WireStreamEvent {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::TextDelta { chunk } => WireStreamEvent {
                chunk: Some(chunk),
                ..Default::default()
            },
            StreamEvent::ToolCallDelta { fragment } => WireStreamEvent {
                is_tool_call: true,
                tool_call: Some(fragment),
                ..Default::default()
            },
            StreamEvent::ToolCallResult { result } => WireStreamEvent {
                has_tool_call_result: true,
                tool_call_result: Some(result),
                ..Default::default()
            },
            StreamEvent::Finished { message } => WireStreamEvent {
                finished: true,
                finished_message: message.map(|m| *m),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_delta_serialization() {
        let event = StreamEvent::text_delta("hello");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"text_delta","chunk":"hello"}"#);
    }

    #[test]
    fn test_finished_serialization() {
        let json = serde_json::to_string(&StreamEvent::finished()).unwrap();
        assert_eq!(json, r#"{"type":"finished"}"#);
    }

    #[test]
    fn test_wire_text_record() {
        let wire: WireStreamEvent = serde_json::from_value(json!({"chunk": "Hi"})).unwrap();
        let event = StreamEvent::try_from(wire).unwrap();
        assert_eq!(event, StreamEvent::text_delta("Hi"));
    }

    #[test]
    fn test_wire_tool_call_record() {
        let wire: WireStreamEvent = serde_json::from_value(json!({
            "chunk": "",
            "isToolCall": true,
            "toolCall": {"callId": "c1", "toolName": "search", "argumentsDelta": "{\"q\""},
            "finished": false
        }))
        .unwrap();
        let event = StreamEvent::try_from(wire).unwrap();
        assert_eq!(event.tool_name(), Some("search"));
        match event {
            StreamEvent::ToolCallDelta { fragment } => {
                assert_eq!(fragment.call_id, "c1");
                assert_eq!(fragment.arguments_delta, "{\"q\"");
                assert!(!fragment.closed);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_wire_result_record() {
        let wire: WireStreamEvent = serde_json::from_value(json!({
            "hasToolCallResult": true,
            "toolCallResult": {"callId": "c1", "result": "ok"}
        }))
        .unwrap();
        let event = StreamEvent::try_from(wire).unwrap();
        assert_eq!(event.tool_result(), Some("ok"));
    }

    #[test]
    fn test_wire_records_with_snake_case_tool_keys() {
        let wire: WireStreamEvent = serde_json::from_value(json!({
            "isToolCall": true,
            "toolCall": {
                "tool_call_id": "c1",
                "tool_call_name": "weather",
                "tool_call_arguments": {"city": "Oslo"}
            }
        }))
        .unwrap();
        let event = StreamEvent::try_from(wire).unwrap();
        assert_eq!(event.tool_name(), Some("weather"));
        assert_eq!(
            event.tool_arguments().and_then(|a| a.get("city")),
            Some(&json!("Oslo"))
        );
        match &event {
            StreamEvent::ToolCallDelta { fragment } => {
                assert_eq!(fragment.call_id, "c1");
                assert!(fragment.extra.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }

        let wire: WireStreamEvent = serde_json::from_value(json!({
            "hasToolCallResult": true,
            "toolCallResult": {
                "tool_call_id": "c1",
                "tool_call_name": "weather",
                "tool_call_result": "4C, light rain"
            }
        }))
        .unwrap();
        let event = StreamEvent::try_from(wire).unwrap();
        assert_eq!(event.tool_result(), Some("4C, light rain"));
        assert_eq!(event.tool_name(), Some("weather"));
    }

    #[test]
    fn test_wire_has_tool_call_flag() {
        let wire: WireStreamEvent = serde_json::from_value(json!({
            "hasToolCall": true,
            "toolCall": {"tool_call_id": "c2", "tool_call_name": "search"}
        }))
        .unwrap();
        assert!(wire.is_tool_call);
        let event = StreamEvent::try_from(wire).unwrap();
        assert_eq!(event.tool_name(), Some("search"));
    }

    #[test]
    fn test_wire_rejects_conflicting_flags() {
        let wire = WireStreamEvent {
            is_tool_call: true,
            tool_call: Some(ToolCallFragment::start("c1", "x")),
            finished: true,
            ..Default::default()
        };
        assert!(matches!(StreamEvent::try_from(wire), Err(CoreError::MalformedEvent(_))));
    }

    #[test]
    fn test_wire_rejects_missing_payload() {
        let wire = WireStreamEvent {
            is_tool_call: true,
            ..Default::default()
        };
        assert!(StreamEvent::try_from(wire).is_err());
        assert!(StreamEvent::try_from(WireStreamEvent::default()).is_err());
    }

    #[test]
    fn test_wire_round_trip_through_typed_event() {
        let event = StreamEvent::tool_call_delta(ToolCallFragment::delta("c1", "}").closed());
        let wire = WireStreamEvent::from(event.clone());
        assert!(wire.is_tool_call);
        assert_eq!(StreamEvent::try_from(wire).unwrap(), event);
    }

    #[test]
    fn test_fragment_with_arguments_accessor() {
        let args = json!({"n": 3}).as_object().cloned().unwrap();
        let event = StreamEvent::tool_call_delta(ToolCallFragment::start("c1", "count").with_arguments(args));
        assert_eq!(event.tool_arguments().and_then(|a| a.get("n")), Some(&json!(3)));
    }
}
