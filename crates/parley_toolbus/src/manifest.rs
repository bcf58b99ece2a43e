//! Tool manifest loading.
//!
//! Tools are declared in a TOML file and registered at startup.
//!
//! ```toml
//! [[tools]]
//! id = "fft-1"
//! name = "fft"
//! tool_type = "c"
//! tool_path = "tools/fft.c"
//!
//! [tools.runtime]
//! base_image = "debian:bookworm-slim"
//! run_command = "./fft"
//! dependencies = [{ kind = "shared_library", value = "libm.so.6" }]
//!
//! [tools.build]
//! base_image = "gcc:13"
//! build_command = "gcc -O2 -o fft tools/fft.c -lm"
//! ```

use std::fs;
use std::path::Path;

use parley_core::{AgentTool, BuildConfiguration, RuntimeConfiguration, ToolDependency, ToolType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ManifestError;
use crate::ToolRegistry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    #[serde(default)]
    pub tools: Vec<ToolEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    pub id: String,
    pub name: String,
    pub tool_type: ToolType,
    pub tool_path: String,
    pub runtime: RuntimeSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSection {
    pub base_image: String,
    pub run_command: String,
    #[serde(default)]
    pub dependencies: Vec<ToolDependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSection {
    pub base_image: String,
    pub build_command: String,
    #[serde(default)]
    pub dependencies: Vec<ToolDependency>,
}

impl ToolEntry {
    pub fn into_tool(self) -> Result<AgentTool, ManifestError> {
        let runtime = RuntimeConfiguration {
            base_image: self.runtime.base_image,
            dependencies: self.runtime.dependencies,
            run_command: self.runtime.run_command,
        };
        let build = self.build.map(|b| BuildConfiguration {
            base_image: b.base_image,
            dependencies: b.dependencies,
            build_command: b.build_command,
        });
        let tool = AgentTool::new(self.id, self.name, self.tool_type, self.tool_path, runtime, build)
            .map_err(crate::RegistryError::from)?;
        Ok(tool)
    }
}

impl ToolManifest {
    pub fn from_toml_str(content: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn into_registry(self) -> Result<ToolRegistry, ManifestError> {
        let mut registry = ToolRegistry::new();
        for entry in self.tools {
            registry.register(entry.into_tool()?)?;
        }
        Ok(registry)
    }
}

impl ToolRegistry {
    pub fn from_manifest_str(content: &str) -> Result<Self, ManifestError> {
        ToolManifest::from_toml_str(content)?.into_registry()
    }

    pub fn load_manifest(path: &Path) -> Result<Self, ManifestError> {
        let registry = ToolManifest::load(path)?.into_registry()?;
        info!(path = %path.display(), tools = registry.len(), "Loaded tool manifest");
        Ok(registry)
    }
}
