pub mod build_cache;
pub mod error;
pub mod executor;
pub mod manifest;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use parley_core::{Agent, AgentTool};
use tracing::debug;

pub use build_cache::{BuildCache, BuildKey};
pub use error::{ManifestError, RegistryError, RegistryResult};
pub use executor::{ExecutionError, ExecutionResult, ToolExecutor, ToolInvocation};
pub use manifest::{ToolEntry, ToolManifest};

/// Lookup table from tool name to its runtime/build descriptor.
///
/// Registration happens while the registry is still exclusively owned;
/// afterwards it is shared read-only (usually behind an `Arc`).
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, AgentTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every tool of `agent`.
    pub fn from_agent(agent: &Agent) -> RegistryResult<Self> {
        let mut registry = Self::new();
        for tool in &agent.tools {
            registry.register(tool.clone())?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: AgentTool) -> RegistryResult<()> {
        tool.validate()?;
        if self.tools.contains_key(&tool.name) {
            return Err(RegistryError::DuplicateTool(tool.name));
        }
        debug!(tool.name = %tool.name, tool.id = %tool.id, tool.kind = %tool.tool_type, "Registered tool");
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Exact-name lookup.
    pub fn resolve(&self, name: &str) -> RegistryResult<&AgentTool> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// True iff running `tool` needs a build step first.
    pub fn needs_build(tool: &AgentTool) -> bool {
        tool.needs_build()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tools ordered by name.
    pub fn list(&self) -> Vec<&AgentTool> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }
}
