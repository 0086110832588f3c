//! Shell command execution confined to the base directory.
//!
//! The `run_command` tool runs a command through `/bin/sh` with an optional working
//! directory under the base, optional stdin, and a deadline. On timeout the command's
//! whole process group is killed. Captured output is cut to a configurable number of
//! lines per stream.
//!
//! The pieces are usable on their own:
//!
//! - [`ProcessRunner`] spawns one process and enforces its deadline.
//! - [`OutputLimiter`] cuts text to a line budget.
//! - [`CommandService`] combines both with path confinement.
//! - [`OutputLimitConfig`] resolves the line budget at startup.

use std::borrow::Cow;

use confine_core::{PathConfiner, Tool, Tools, json};
use schemars::JsonSchema;
use serde::Deserialize;

pub mod config;
mod limit;
mod runner;
mod service;

pub use config::{LimitSource, OutputLimitConfig};
pub use limit::{DEFAULT_MAX_LINES, OutputLimiter, limit_lines};
pub use runner::{DEFAULT_SHELL, ProcessRunner, RunOutcome, Termination};
pub use service::{
    CommandError, CommandResult, CommandService, CommandSpec, DEFAULT_DEADLINE, resolve_deadline,
};

/// Registers `run_command`.
pub fn register(tools: &mut Tools, confiner: PathConfiner, limiter: OutputLimiter) {
    tools.register(RunCommand::new(CommandService::new(confiner, limiter)));
}

/// Run a shell command and return stdout and stderr as text.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunCommandArgs {
    /// The shell command to execute (e.g., 'hostname', 'ls -al', 'echo "hello"').
    /// Pipes and redirection are supported.
    pub command: String,
    /// Optional text to pass to the command via STDIN (e.g., for 'cat >> file.txt').
    #[serde(default)]
    pub stdin: Option<String>,
    /// Optional subdirectory (relative to base) to run the command in.
    #[serde(default)]
    pub cwd: String,
    /// Optional timeout in seconds. Defaults to 60 seconds.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Optional timeout in milliseconds, used when `timeout` is not given.
    #[serde(default)]
    pub timeout_ms: Option<f64>,
}

impl RunCommandArgs {
    /// Builds the invocation these arguments describe.
    #[must_use]
    pub fn into_spec(self) -> CommandSpec {
        let spec = CommandSpec::new(self.command)
            .cwd(self.cwd)
            .timeouts(self.timeout, self.timeout_ms);
        match self.stdin {
            Some(stdin) => spec.stdin(stdin),
            None => spec,
        }
    }
}

/// `run_command` tool.
///
/// Always succeeds at the tool level: rejected or failed commands are reported as a JSON
/// object with an `error` field, like any other result.
#[derive(Debug, Clone)]
pub struct RunCommand {
    service: CommandService,
}

impl RunCommand {
    /// Wraps a command service.
    #[must_use]
    pub const fn new(service: CommandService) -> Self {
        Self { service }
    }
}

impl Tool for RunCommand {
    fn name(&self) -> Cow<'static, str> {
        "run_command".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Run a shell command inside the base directory and return stdout and stderr as text. \
         Commands run through a POSIX shell, so pipes and redirection work."
            .into()
    }

    type Arguments = RunCommandArgs;

    async fn call(&self, arguments: Self::Arguments) -> confine_core::Result {
        let spec = arguments.into_spec();
        Ok(match self.service.execute(&spec).await {
            Ok(result) => json(&result),
            Err(err) => json(&err.to_json()),
        })
    }
}
