pub mod assembler;
pub mod config;
pub mod driver;
pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use assembler::{AssemblerState, Step, StreamingAssembler, SYNTHETIC_RESULT_KEY};
pub use config::{RuntimeConfig, ToolCallCompletion};
pub use driver::{EventStream, GenerationDriver, ModelSource, ReplaySource};
pub use error::{AssemblerError, Result, RuntimeError};
pub use store::{ConversationStore, InMemoryConversationStore};
