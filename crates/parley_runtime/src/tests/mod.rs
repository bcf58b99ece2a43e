mod store;

use std::sync::Arc;

use parley_core::{
    AgentTool, ChatMessage, Conversation, RuntimeConfiguration, SequentialIdGenerator,
    ToolDependency, ToolType,
};
use parley_toolbus::ToolRegistry;
use serde_json::{Map, Value as JsonValue};

use crate::{RuntimeConfig, StreamingAssembler};

pub(crate) fn python_tool(name: &str) -> AgentTool {
    let runtime = RuntimeConfiguration::new("python:3.13-slim", format!("python {name}.py"))
        .with_dependency(ToolDependency::python("httpx"));
    AgentTool::new(format!("id-{name}"), name, ToolType::Python313, format!("{name}.py"), runtime, None)
        .unwrap()
}

pub(crate) fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(python_tool("fetch")).unwrap();
    Arc::new(registry)
}

/// "conv-1" holding one finished user message "u-1".
pub(crate) fn conversation() -> Conversation {
    let mut message = ChatMessage::user(&SequentialIdGenerator::new("u"), "What is the weather?");
    message.finish().unwrap();
    let mut conversation = Conversation::new("conv-1");
    conversation.append(message).unwrap();
    conversation
}

/// The assembled message gets id "a-1"; generated result ids continue "a-2", ...
pub(crate) fn assembler_with(config: RuntimeConfig) -> StreamingAssembler {
    StreamingAssembler::new(
        conversation(),
        registry(),
        Arc::new(SequentialIdGenerator::new("a")),
        config,
    )
}

pub(crate) fn assembler() -> StreamingAssembler {
    assembler_with(RuntimeConfig::new())
}

pub(crate) fn object(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}
