//! # confine
//!
//! Facade crate that re-exports [`confine_core`] plus the tool crates behind features.
//! Everything confine exposes is confined to one base directory: file access goes through
//! a [`PathConfiner`], and shell commands run with their working directory under it.
//!
//! ## What's inside?
//!
//! - [`PathConfiner`] + [`BaseDirectory`] for lexical path confinement.
//! - [`Tool`] and the [`Tools`] registry for exposing operations by name.
//! - `fs` feature: [`fs`], the `list_files`, `read_file`, `write_file`, and `delete_file` tools.
//! - `command` feature: [`command`], the `run_command` tool with deadlines and output limits.
//! - `mcp` feature: [`mcp`], an MCP stdio server for a [`Tools`] registry.
//!
//! ## Example
//!
//! ```rust,no_run
//! use confine::{BaseDirectory, PathConfiner, Tools};
//! use confine::command::OutputLimitConfig;
//!
//! # async fn demo() -> confine::Result<()> {
//! let confiner = PathConfiner::new(BaseDirectory::new("/data")?);
//! let mut tools = Tools::new();
//! confine::fs::register(&mut tools, confiner.clone());
//! confine::command::register(&mut tools, confiner, OutputLimitConfig::from_env().limiter());
//!
//! let listing = tools.call("list_files", r#"{"path": ""}"#.to_string()).await?;
//! println!("{listing}");
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use confine_core::*;

#[cfg(feature = "fs")]
#[cfg_attr(docsrs, doc(cfg(feature = "fs")))]
pub use confine_fs as fs;

#[cfg(feature = "command")]
#[cfg_attr(docsrs, doc(cfg(feature = "command")))]
pub use confine_command as command;

#[cfg(feature = "mcp")]
#[cfg_attr(docsrs, doc(cfg(feature = "mcp")))]
pub use confine_mcp as mcp;
