//! CLI entry point for parley.

mod cli;
mod commands;
mod output;

use clap::Parser;
use parley_observability::ObservabilityConfig;

use crate::cli::Cli;

/// Load `.env` from the current directory or the nearest parent that has one.
fn load_env() {
    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors() {
            let env_file = dir.join(".env");
            if env_file.exists() {
                let _ = dotenvy::from_path(&env_file);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    load_env();
    let cli = Cli::parse();
    output::init(cli.output);

    let mut config = ObservabilityConfig::from_env().with_version(env!("CARGO_PKG_VERSION"));
    if config.log_level.is_none() {
        config = config.with_log_level(if cli.verbose { "debug" } else { "warn" });
    }
    let telemetry = match parley_observability::init(config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            output::warning(&format!("Logging disabled: {e}"));
            None
        }
    };

    let result = commands::handle(cli).await;
    drop(telemetry);

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
