//! Command dispatch.

pub mod replay;
pub mod tools;

use anyhow::{Context, Result};
use parley_toolbus::ToolRegistry;
use std::path::Path;

use crate::cli::{Cli, Command};

pub async fn handle(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Replay {
            events,
            tools,
            conversation,
            completion,
        } => replay::handle(&events, tools.as_deref(), conversation, completion).await,
        Command::Tools { action } => tools::handle(action),
    }
}

pub(crate) fn load_registry(manifest: &Path) -> Result<ToolRegistry> {
    ToolRegistry::load_manifest(manifest)
        .with_context(|| format!("Failed to load tool manifest {}", manifest.display()))
}
