//! Runs a confined shell command and assembles its result.

use std::time::Duration;

use confine_core::{ConfinementError, PathConfiner};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::limit::OutputLimiter;
use crate::runner::{ProcessRunner, RunOutcome};

/// Deadline applied when neither `timeout` nor `timeout_ms` is usable.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Picks the effective deadline for a command.
///
/// `timeout` (seconds) wins over `timeout_ms` (milliseconds), which wins over
/// [`DEFAULT_DEADLINE`]. A value that is not finite, not positive, or too large for a
/// [`Duration`] counts as not supplied.
#[must_use]
pub fn resolve_deadline(timeout: Option<f64>, timeout_ms: Option<f64>) -> Duration {
    let positive = |secs: f64| {
        (secs > 0.0)
            .then(|| Duration::try_from_secs_f64(secs).ok())
            .flatten()
    };
    timeout
        .and_then(positive)
        .or_else(|| timeout_ms.and_then(|ms| positive(ms / 1000.0)))
        .unwrap_or(DEFAULT_DEADLINE)
}

/// One command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    command: String,
    stdin: Option<String>,
    cwd: String,
    deadline: Duration,
}

impl CommandSpec {
    /// A command run in the base directory with no input and the default deadline.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdin: None,
            cwd: String::new(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Text written to the command's standard input.
    #[must_use]
    pub fn stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Working directory relative to the base directory. Empty means the base itself.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Sets the deadline directly.
    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the deadline from optional caller-supplied timeouts, see [`resolve_deadline`].
    #[must_use]
    pub fn timeouts(self, timeout: Option<f64>, timeout_ms: Option<f64>) -> Self {
        self.deadline(resolve_deadline(timeout, timeout_ms))
    }

    /// The shell command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The effective deadline.
    #[must_use]
    pub const fn effective_deadline(&self) -> Duration {
        self.deadline
    }
}

/// Outcome of a command that was started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Standard output, decoded lossily and cut to the line limit.
    pub stdout: String,
    /// Standard error, decoded lossily and cut to the line limit.
    pub stderr: String,
    /// `None` on timeout or when the process died from a signal.
    pub exit_code: Option<i32>,
    /// Absolute working directory the command ran in.
    pub cwd: String,
    /// The command as supplied.
    pub command: String,
    /// Deadline that was applied, in seconds.
    pub deadline_seconds: f64,
    /// Whether the deadline elapsed and the process was killed.
    pub timed_out: bool,
    /// `stdout_truncated || stderr_truncated`.
    pub truncated: bool,
    /// Whether stdout was cut.
    pub stdout_truncated: bool,
    /// Whether stderr was cut.
    pub stderr_truncated: bool,
    /// Line limit in effect.
    pub max_lines: usize,
}

/// A command that could not be run.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The requested working directory escapes the base directory. Nothing was spawned.
    #[error("Cannot use cwd outside of the base directory")]
    CwdOutsideBase {
        /// The working directory as supplied.
        cwd: String,
        /// Details of the rejection.
        #[source]
        source: ConfinementError,
    },
    /// The shell could not be started.
    #[error("Error running command: {source}")]
    SpawnFailed {
        /// Resolved working directory.
        cwd: String,
        /// The command as supplied.
        command: String,
        /// Line limit in effect.
        max_lines: usize,
        /// Why spawning failed.
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// Renders the error in the same JSON shape callers receive for results.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::CwdOutsideBase { cwd, .. } => serde_json::json!({
                "error": self.to_string(),
                "cwd": cwd,
            }),
            Self::SpawnFailed {
                cwd,
                command,
                max_lines,
                ..
            } => serde_json::json!({
                "error": self.to_string(),
                "cwd": cwd,
                "command": command,
                "truncated": false,
                "stdout_truncated": false,
                "stderr_truncated": false,
                "max_lines": max_lines,
            }),
        }
    }
}

/// Runs shell commands inside the base directory.
#[derive(Debug, Clone)]
pub struct CommandService {
    confiner: PathConfiner,
    runner: ProcessRunner,
    limiter: OutputLimiter,
}

impl CommandService {
    /// Creates a service with the default [`ProcessRunner`].
    #[must_use]
    pub fn new(confiner: PathConfiner, limiter: OutputLimiter) -> Self {
        Self::with_runner(confiner, ProcessRunner::new(), limiter)
    }

    /// Creates a service with a custom runner.
    ///
    /// The runner is set to capture no more lines than `limiter` keeps.
    #[must_use]
    pub fn with_runner(
        confiner: PathConfiner,
        runner: ProcessRunner,
        limiter: OutputLimiter,
    ) -> Self {
        Self {
            confiner,
            runner: runner.capture_lines(limiter.max_lines()),
            limiter,
        }
    }

    /// The output limiter in use.
    #[must_use]
    pub const fn limiter(&self) -> &OutputLimiter {
        &self.limiter
    }

    /// Runs `spec` to completion or until its deadline.
    ///
    /// A timed-out command reports empty output and is never marked as truncated.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::CwdOutsideBase`] if the working directory escapes the base,
    /// and [`CommandError::SpawnFailed`] if the shell cannot be started (for example
    /// because the working directory does not exist).
    pub async fn execute(&self, spec: &CommandSpec) -> Result<CommandResult, CommandError> {
        let working_dir = if spec.cwd.is_empty() {
            self.confiner.base().as_path().to_path_buf()
        } else {
            self.confiner
                .confine(&spec.cwd)
                .map_err(|source| CommandError::CwdOutsideBase {
                    cwd: spec.cwd.clone(),
                    source,
                })?
                .into_path_buf()
        };
        let cwd = working_dir.display().to_string();
        let max_lines = self.limiter.max_lines().get();

        let outcome = self
            .runner
            .run(
                &spec.command,
                spec.stdin.as_deref(),
                &working_dir,
                spec.deadline,
            )
            .await;

        let mut result = CommandResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            cwd,
            command: spec.command.clone(),
            deadline_seconds: spec.deadline.as_secs_f64(),
            timed_out: false,
            truncated: false,
            stdout_truncated: false,
            stderr_truncated: false,
            max_lines,
        };

        match outcome {
            RunOutcome::Completed {
                exit_code,
                stdout,
                stderr,
            } => {
                let stdout = String::from_utf8_lossy(&stdout);
                let stderr = String::from_utf8_lossy(&stderr);
                let (stdout, stdout_truncated) = self.limiter.limit(&stdout);
                let (stderr, stderr_truncated) = self.limiter.limit(&stderr);

                result.stdout = stdout.to_owned();
                result.stderr = stderr.to_owned();
                result.exit_code = exit_code;
                result.stdout_truncated = stdout_truncated;
                result.stderr_truncated = stderr_truncated;
                result.truncated = stdout_truncated || stderr_truncated;
            }
            RunOutcome::TimedOut { stdout, stderr } => {
                debug!(
                    command = %spec.command,
                    discarded_bytes = stdout.len() + stderr.len(),
                    "command timed out"
                );
                result.timed_out = true;
            }
            RunOutcome::SpawnFailed { cause } => {
                warn!(command = %spec.command, cwd = %result.cwd, error = %cause, "failed to start command");
                return Err(CommandError::SpawnFailed {
                    cwd: result.cwd,
                    command: result.command,
                    max_lines,
                    source: cause,
                });
            }
        }

        Ok(result)
    }
}
