//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Assemble streamed model output into structured chat messages
#[derive(Parser)]
#[command(name = "parley", about, version, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format: text (human-readable) or json (machine-readable)
    #[arg(short, long, global = true, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Colored terminal output for humans
    #[default]
    Text,
    /// Structured JSON for machine consumption
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CompletionArg {
    /// Wait for a closing fragment
    ExplicitClose,
    /// Also complete once the arguments parse as a JSON object
    ParseAttempt,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fold a recorded event stream (JSON lines) into one message
    Replay {
        /// File with one stream event per line
        #[arg(long)]
        events: PathBuf,
        /// Tool manifest (TOML)
        #[arg(long, env = "PARLEY_TOOLS")]
        tools: Option<PathBuf>,
        /// Conversation id for the assembled message
        #[arg(long, default_value = "replay")]
        conversation: String,
        /// Tool-call completion policy (default: PARLEY_TOOL_CALL_COMPLETION or explicit-close)
        #[arg(long)]
        completion: Option<CompletionArg>,
    },
    /// Inspect a tool manifest
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },
}

#[derive(Subcommand)]
pub enum ToolsAction {
    /// List the tools in a manifest
    List {
        #[arg(long, env = "PARLEY_TOOLS")]
        manifest: PathBuf,
    },
    /// Show one tool's configuration
    Show {
        #[arg(long, env = "PARLEY_TOOLS")]
        manifest: PathBuf,
        /// Tool name
        tool: String,
    },
    /// Validate a manifest and print build keys of compiled tools
    Check {
        #[arg(long, env = "PARLEY_TOOLS")]
        manifest: PathBuf,
    },
}
