//! `parley tools` subcommands.

use std::path::Path;

use anyhow::Result;
use parley_core::AgentTool;
use parley_toolbus::{BuildKey, ToolRegistry};

use crate::cli::ToolsAction;
use crate::commands::load_registry;
use crate::output;

pub fn handle(action: ToolsAction) -> Result<()> {
    match action {
        ToolsAction::List { manifest } => list(&load_registry(&manifest)?),
        ToolsAction::Show { manifest, tool } => show(&load_registry(&manifest)?, &tool),
        ToolsAction::Check { manifest } => check(&manifest),
    }
}

fn list(registry: &ToolRegistry) -> Result<()> {
    if registry.is_empty() {
        output::dim("No tools in manifest");
        return Ok(());
    }

    output::header("Tools");
    let mut table = output::table(&["Tool", "Type", "Path", "Build"]);
    let items = registry
        .list()
        .into_iter()
        .map(|tool| {
            output::table_row(
                &mut table,
                &[
                    tool.name.clone(),
                    tool.tool_type.as_str().to_string(),
                    tool.tool_path.clone(),
                    build_label(tool),
                ],
            );
            serde_json::json!({
                "name": tool.name,
                "type": tool.tool_type.as_str(),
                "path": tool.tool_path,
                "needsBuild": ToolRegistry::needs_build(tool),
            })
        })
        .collect();
    output::table_print(&table, items);

    Ok(())
}

fn build_label(tool: &AgentTool) -> String {
    if ToolRegistry::needs_build(tool) {
        "required".to_string()
    } else {
        "-".to_string()
    }
}

fn show(registry: &ToolRegistry, name: &str) -> Result<()> {
    let tool = registry.resolve(name)?;

    output::header(&format!("Tool: {}", tool.name));
    output::kv("id", &tool.id);
    output::kv("type", tool.tool_type.as_str());
    output::kv("path", &tool.tool_path);
    output::kv("image", &tool.runtime_configuration.base_image);
    output::kv("run", &tool.runtime_configuration.run_command);
    if let Some(key) = BuildKey::for_tool(tool) {
        output::kv("build key", key.as_str());
    }
    output::data("tool", tool);

    Ok(())
}

fn check(manifest: &Path) -> Result<()> {
    let registry = load_registry(manifest)?;
    for tool in registry.list() {
        if let Some(key) = BuildKey::for_tool(tool) {
            output::kv(&tool.name, key.as_str());
        }
    }
    output::success(&format!(
        "{} valid ({} tools)",
        manifest.display(),
        registry.len()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_registry() -> ToolRegistry {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/tools.toml");
        load_registry(&manifest).unwrap()
    }

    #[test]
    fn test_build_label_follows_needs_build() {
        let registry = demo_registry();
        assert_eq!(build_label(registry.resolve("fft").unwrap()), "required");
        assert_eq!(build_label(registry.resolve("weather").unwrap()), "-");
    }
}
