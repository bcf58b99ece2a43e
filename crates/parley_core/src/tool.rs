use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    Python310,
    Python313,
    Javascript,
    C,
    Cpp,
    Executable,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::Python310 => "python310",
            ToolType::Python313 => "python313",
            ToolType::Javascript => "javascript",
            ToolType::C => "c",
            ToolType::Cpp => "cpp",
            ToolType::Executable => "executable",
        }
    }

    /// Compiled languages whose source must be built before it can run.
    pub fn is_compiled(&self) -> bool {
        matches!(self, ToolType::C | ToolType::Cpp)
    }

    fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            ToolType::C => &["c", "h"],
            ToolType::Cpp => &["cpp", "cc", "cxx", "c++", "hpp", "hh", "hxx"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for ToolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    PythonPackage,
    NodejsPackage,
    SharedLibrary,
    StaticLibrary,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolDependency {
    pub kind: DependencyKind,
    pub value: String,
}

impl ToolDependency {
    pub fn new(kind: DependencyKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn python(value: impl Into<String>) -> Self {
        Self::new(DependencyKind::PythonPackage, value)
    }

    pub fn nodejs(value: impl Into<String>) -> Self {
        Self::new(DependencyKind::NodejsPackage, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfiguration {
    pub base_image: String,
    #[serde(default)]
    pub dependencies: Vec<ToolDependency>,
    pub run_command: String,
}

impl RuntimeConfiguration {
    pub fn new(base_image: impl Into<String>, run_command: impl Into<String>) -> Self {
        Self {
            base_image: base_image.into(),
            dependencies: Vec::new(),
            run_command: run_command.into(),
        }
    }

    pub fn with_dependency(mut self, dependency: ToolDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfiguration {
    pub base_image: String,
    #[serde(default)]
    pub dependencies: Vec<ToolDependency>,
    pub build_command: String,
}

impl BuildConfiguration {
    pub fn new(base_image: impl Into<String>, build_command: impl Into<String>) -> Self {
        Self {
            base_image: base_image.into(),
            dependencies: Vec::new(),
            build_command: build_command.into(),
        }
    }

    pub fn with_dependency(mut self, dependency: ToolDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Descriptor of a sandboxed tool: what runtime it needs and how to build/run it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTool {
    pub id: String,
    pub name: String,
    pub tool_type: ToolType,
    pub tool_path: String,
    pub runtime_configuration: RuntimeConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_configuration: Option<BuildConfiguration>,
}

impl AgentTool {
    /// Build a validated descriptor.
    ///
    /// A C/C++ tool whose path names source code must come with a build
    /// configuration; anything else is rejected here with `CoreError::Config`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        tool_type: ToolType,
        tool_path: impl Into<String>,
        runtime_configuration: RuntimeConfiguration,
        build_configuration: Option<BuildConfiguration>,
    ) -> Result<Self> {
        let tool = Self {
            id: id.into(),
            name: name.into(),
            tool_type,
            tool_path: tool_path.into(),
            runtime_configuration,
            build_configuration,
        };
        tool.validate()?;
        Ok(tool)
    }

    pub fn needs_build(&self) -> bool {
        self.build_configuration.is_some()
    }

    /// True when `tool_path` looks like source for a compiled tool type.
    pub fn is_source_path(&self) -> bool {
        let extension = Path::new(&self.tool_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension {
            Some(ext) => self
                .tool_type
                .source_extensions()
                .contains(&ext.as_str()),
            None => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Config(format!("tool {} has an empty name", self.id)));
        }
        if self.tool_path.trim().is_empty() {
            return Err(CoreError::Config(format!("tool {} has an empty tool path", self.name)));
        }
        if self.runtime_configuration.run_command.trim().is_empty() {
            return Err(CoreError::Config(format!("tool {} has no run command", self.name)));
        }
        if self.tool_type.is_compiled() && self.is_source_path() && self.build_configuration.is_none() {
            return Err(CoreError::Config(format!(
                "{} tool {} points at source {} but has no build configuration",
                self.tool_type, self.name, self.tool_path
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runtime() -> RuntimeConfiguration {
        RuntimeConfiguration::new("debian:bookworm-slim", "./tool")
    }

    #[test]
    fn test_tool_type_serialization() {
        assert_eq!(serde_json::to_string(&ToolType::Python310).unwrap(), "\"python310\"");
        assert_eq!(serde_json::to_string(&ToolType::Cpp).unwrap(), "\"cpp\"");
        let decoded: ToolType = serde_json::from_str("\"javascript\"").unwrap();
        assert_eq!(decoded, ToolType::Javascript);
    }

    #[test]
    fn test_dependency_serialization() {
        let dep = ToolDependency::nodejs("lodash@4");
        let json = serde_json::to_value(&dep).unwrap();
        assert_eq!(json, json!({"kind": "nodejs_package", "value": "lodash@4"}));
    }

    #[test]
    fn test_c_source_without_build_is_config_error() {
        let err = AgentTool::new("t1", "fft", ToolType::C, "src/fft.c", runtime(), None).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));

        let err = AgentTool::new("t2", "fft", ToolType::Cpp, "fft.CPP", runtime(), None).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_c_source_with_build_is_valid() {
        let build = BuildConfiguration::new("gcc:13", "gcc -O2 -o tool src/fft.c");
        let tool = AgentTool::new("t1", "fft", ToolType::C, "src/fft.c", runtime(), Some(build)).unwrap();
        assert!(tool.needs_build());
    }

    #[test]
    fn test_prebuilt_binary_needs_no_build() {
        let tool = AgentTool::new("t1", "fft", ToolType::Cpp, "bin/fft", runtime(), None).unwrap();
        assert!(!tool.needs_build());
        assert!(!tool.is_source_path());
    }

    #[test]
    fn test_python_tool() {
        let runtime = RuntimeConfiguration::new("python:3.13-slim", "python main.py")
            .with_dependency(ToolDependency::python("requests"));
        let tool = AgentTool::new("t9", "fetch", ToolType::Python313, "main.py", runtime, None).unwrap();
        assert_eq!(tool.runtime_configuration.dependencies.len(), 1);
        assert!(!tool.needs_build());
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = AgentTool::new("t1", "", ToolType::Executable, "bin/x", runtime(), None).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_agent_tool_wire_shape() {
        let tool = AgentTool::new("t1", "fft", ToolType::Executable, "bin/fft", runtime(), None).unwrap();
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["toolType"], "executable");
        assert_eq!(json["runtimeConfiguration"]["runCommand"], "./tool");
        assert!(json.get("buildConfiguration").is_none());

        let decoded: AgentTool = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, tool);
    }
}
