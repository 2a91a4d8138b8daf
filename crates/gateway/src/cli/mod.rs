pub mod config;

use clap::{Parser, Subcommand};

/// mcpgate: session-aware MCP streamable-HTTP gateway.
#[derive(Debug, Parser)]
#[command(name = "mcpgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `MG_CONFIG` (or `config.toml`).
/// A missing file yields the defaults.  Returns the config and the path
/// that was used.
pub fn load_config() -> anyhow::Result<(mg_domain::config::Config, String)> {
    let config_path = std::env::var("MG_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = mg_domain::config::Config::load(std::path::Path::new(&config_path))
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    Ok((config, config_path))
}
