pub mod agent;
pub mod content;
pub mod conversation;
pub mod error;
pub mod event;
pub mod id;
pub mod message;
pub mod response;
pub mod tool;

pub use agent::Agent;
pub use content::{
    BinaryContent, BinaryStorage, ContentItem, ContentKind, Extra, TextContent, ToolCallContent,
    ToolCallResultContent,
};
pub use conversation::Conversation;
pub use error::{CoreError, Result};
pub use event::{StreamEvent, ToolCallFragment, ToolCallResultEvent, WireStreamEvent};
pub use id::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use message::{ChatMessage, Role, CUSTOM_ROLE_NAME_KEY};
pub use response::ChatResponse;
pub use tool::{
    AgentTool, BuildConfiguration, DependencyKind, RuntimeConfiguration, ToolDependency, ToolType,
};
