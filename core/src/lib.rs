//! # confine-core
//!
//! Shared building blocks for the confine workspace:
//!
//! - [`tool`]: the [`Tool`] trait and the [`Tools`] registry through which a remote
//!   caller discovers and invokes operations.
//! - [`path`]: [`PathConfiner`], the lexical containment check that keeps every file
//!   operation and command working directory inside one [`BaseDirectory`].
//!
//! ```rust
//! use confine_core::{BaseDirectory, PathConfiner};
//!
//! let confiner = PathConfiner::new(BaseDirectory::new("/data")?);
//! assert!(confiner.confine("notes/today.md").is_ok());
//! assert!(confiner.confine("../etc/passwd").is_err());
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod path;
pub mod tool;

#[doc(inline)]
pub use path::{BaseDirectory, ConfinedPath, ConfinementError, PathConfiner};
#[doc(inline)]
pub use tool::{Tool, ToolDefinition, Tools, json};

/// Result type used throughout the crate.
///
/// Type alias for [`anyhow::Result<T>`](anyhow::Result) with [`String`] as default success type.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;
