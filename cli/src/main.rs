//! `confine-server`: an MCP file server over stdio.
//!
//! Exposes `list_files`, `read_file`, `write_file`, `delete_file`, and `run_command`,
//! all confined to one base directory.
//!
//! # Usage
//!
//! ```bash
//! # Serve /data (the default)
//! confine-server
//!
//! # Serve another directory with a custom output limit
//! RUN_COMMAND_MAX_LINES=200 confine-server --base-dir ./workspace
//!
//! # Debug logging (stderr)
//! RUST_LOG=debug confine-server --config ./config.json
//! ```
//!
//! Stdout is reserved for the protocol; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use confine_command::{OutputLimitConfig, OutputLimiter, config};
use confine_core::{BaseDirectory, PathConfiner, Tools};
use confine_mcp::McpServer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Name the server reports to clients.
const SERVER_NAME: &str = "file-server";

#[derive(Parser, Debug)]
#[command(name = "confine-server", version, about)]
struct Args {
    /// Directory all file operations and commands are confined to.
    #[arg(long, env = "FILE_SERVER_BASE_DIR", default_value = "/data")]
    base_dir: PathBuf,

    /// JSON config file with `max_lines` or `run_command.max_lines`.
    /// Defaults to `config.json` next to the executable.
    #[arg(long, env = "FILE_SERVER_CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let base = BaseDirectory::new(&args.base_dir)
        .with_context(|| format!("invalid base directory {}", args.base_dir.display()))?;
    if !base.as_path().is_dir() {
        warn!(base = %base, "base directory does not exist");
    }

    let config_file = args.config.or_else(config::default_config_path);
    let limits = OutputLimitConfig::resolve(|name| std::env::var(name).ok(), config_file.as_deref());
    info!(
        base = %base,
        max_lines = %limits.max_lines,
        source = %limits.source,
        "starting {SERVER_NAME}"
    );

    let tools = build_tools(base, limits.limiter());
    let mut server = McpServer::stdio(tools, SERVER_NAME, env!("CARGO_PKG_VERSION"))
        .context("failed to attach to stdio")?;
    server.run().await.context("MCP server failed")?;

    Ok(())
}

/// Registers every tool against one confiner.
fn build_tools(base: BaseDirectory, limiter: OutputLimiter) -> Tools {
    let confiner = PathConfiner::new(base);
    let mut tools = Tools::new();
    confine_fs::register(&mut tools, confiner.clone());
    confine_command::register(&mut tools, confiner, limiter);
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["confine-server"]).unwrap();
        if std::env::var_os("FILE_SERVER_BASE_DIR").is_none() {
            assert_eq!(args.base_dir, PathBuf::from("/data"));
        }
    }

    #[test]
    fn flags() {
        let args = Args::try_parse_from([
            "confine-server",
            "--base-dir",
            "/srv/files",
            "--config",
            "/etc/confine.json",
        ])
        .unwrap();
        assert_eq!(args.base_dir, PathBuf::from("/srv/files"));
        assert_eq!(args.config, Some(PathBuf::from("/etc/confine.json")));
    }

    #[test]
    fn registers_all_tools() {
        let dir = tempfile::tempdir().unwrap();
        let tools = build_tools(
            BaseDirectory::new(dir.path()).unwrap(),
            OutputLimiter::default(),
        );
        let names: Vec<_> = tools
            .definitions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(
            names,
            ["delete_file", "list_files", "read_file", "run_command", "write_file"]
        );
    }

    #[tokio::test]
    async fn tools_share_the_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tools = build_tools(
            BaseDirectory::new(dir.path()).unwrap(),
            OutputLimiter::default(),
        );
        tools
            .call(
                "run_command",
                r#"{"command": "mkdir out && echo made > out/file.txt"}"#.to_string(),
            )
            .await
            .unwrap();
        let content = tools
            .call("read_file", r#"{"file_path": "out/file.txt"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(content, "made\n");
    }
}
