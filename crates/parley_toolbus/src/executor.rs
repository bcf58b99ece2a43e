//! Interface to the sandboxed process supervisor that actually runs tools.

use async_trait::async_trait;
use parley_core::AgentTool;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Failures reported by an executor. These never escape the assembler; they
/// are rendered into a ToolCallResult so the transcript stays complete.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("Execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Execution failed with exit code {exit_code}: {stderr}")]
    Failed { exit_code: i32, stderr: String },

    #[error("Build failed: {message}")]
    BuildFailed { message: String },
}

impl ExecutionError {
    pub fn timeout(timeout: std::time::Duration) -> Self {
        ExecutionError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        ExecutionError::Failed {
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn build_failed(message: impl Into<String>) -> Self {
        ExecutionError::BuildFailed {
            message: message.into(),
        }
    }
}

pub type ExecutionResult = std::result::Result<String, ExecutionError>;

/// A resolved tool call, ready to hand to an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub tool: AgentTool,
    pub arguments: Map<String, JsonValue>,
}

impl ToolInvocation {
    pub fn new(call_id: impl Into<String>, tool: AgentTool, arguments: Map<String, JsonValue>) -> Self {
        Self {
            call_id: call_id.into(),
            tool,
            arguments,
        }
    }

    pub fn needs_build(&self) -> bool {
        self.tool.needs_build()
    }
}

/// Runs a resolved tool in isolation.
///
/// Implementations that build tools must build at most once per
/// [`crate::BuildKey`] and reuse the artifact; [`crate::BuildCache`] does the
/// bookkeeping.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, invocation: &ToolInvocation) -> ExecutionResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_execution_error_messages() {
        assert_eq!(
            ExecutionError::timeout(Duration::from_secs(2)).to_string(),
            "Execution timed out after 2000ms"
        );
        assert_eq!(
            ExecutionError::failed(3, "segfault").to_string(),
            "Execution failed with exit code 3: segfault"
        );
        assert_eq!(
            ExecutionError::build_failed("missing header").to_string(),
            "Build failed: missing header"
        );
    }

    #[test]
    fn test_execution_error_serialization() {
        let json = serde_json::to_string(&ExecutionError::failed(1, "boom")).unwrap();
        assert_eq!(json, r#"{"type":"failed","exit_code":1,"stderr":"boom"}"#);
    }
}
