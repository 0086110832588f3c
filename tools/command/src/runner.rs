//! Shell process execution with a wall-clock deadline.
//!
//! [`ProcessRunner::run`] spawns `/bin/sh -c <command>` in its own process group, feeds
//! optional stdin, captures stdout and stderr, and races the process against a timer.
//! When the timer wins, the whole group is killed so that background jobs and pipeline
//! members started by the shell die with it.
//!
//! Pipes are always drained to the end, but a runner configured with
//! [`ProcessRunner::capture_lines`] stops storing a stream once it holds that many lines.

use std::future::Future;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use async_io::Timer;
use async_process::{Child, Command, Stdio};
use futures_lite::future;
use futures_lite::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Shell used to interpret command strings.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Upper bound on post-kill pipe draining and on reaping.
const CLEANUP_GRACE: Duration = Duration::from_secs(2);

/// Read size for draining a pipe.
const CHUNK_SIZE: usize = 64 * 1024;

/// How a process that overran its deadline is terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Start the child in a new process group and `SIGKILL` the group.
    ///
    /// Falls back to [`Termination::SingleProcess`] if the group cannot be signalled.
    ProcessGroup,
    /// Kill only the direct child. Always available.
    SingleProcess,
}

impl Default for Termination {
    fn default() -> Self {
        if cfg!(unix) {
            Self::ProcessGroup
        } else {
            Self::SingleProcess
        }
    }
}

/// How a [`ProcessRunner::run`] call ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The process exited on its own before the deadline.
    Completed {
        /// Exit code, or `None` if the process was killed by a signal.
        exit_code: Option<i32>,
        /// Everything written to stdout.
        stdout: Vec<u8>,
        /// Everything written to stderr.
        stderr: Vec<u8>,
    },
    /// The deadline elapsed and the process was killed.
    TimedOut {
        /// Output captured before the kill, possibly empty.
        stdout: Vec<u8>,
        /// Error output captured before the kill, possibly empty.
        stderr: Vec<u8>,
    },
    /// The process could not be started.
    SpawnFailed {
        /// Why spawning failed.
        cause: io::Error,
    },
}

/// Spawns shell commands and enforces deadlines on them.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: PathBuf,
    termination: Termination,
    capture_lines: Option<NonZeroUsize>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    /// Creates a runner using [`DEFAULT_SHELL`] and the platform's default [`Termination`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            termination: Termination::default(),
            capture_lines: None,
        }
    }

    /// Uses a different POSIX-compatible shell.
    #[must_use]
    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Chooses how timed-out processes are terminated.
    #[must_use]
    pub const fn termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Stores at most `lines` newline-terminated lines of each stream.
    ///
    /// Storage stops right after the `lines`-th newline, which is all
    /// [`limit_lines`](crate::limit_lines) needs to produce its result for the same limit.
    /// The rest of the stream is still read and discarded so the child never blocks on a
    /// full pipe.
    #[must_use]
    pub const fn capture_lines(mut self, lines: NonZeroUsize) -> Self {
        self.capture_lines = Some(lines);
        self
    }

    /// Runs `command` through the shell in `working_dir`.
    ///
    /// `stdin` is written in full and then closed; without it the child reads EOF
    /// immediately. The deadline counts from spawn. This never fails: spawn errors are
    /// reported as [`RunOutcome::SpawnFailed`], and errors while killing or cleaning up
    /// after a timeout are logged and swallowed.
    pub async fn run(
        &self,
        command: &str,
        stdin: Option<&str>,
        working_dir: &Path,
        deadline: Duration,
    ) -> RunOutcome {
        let mut std_cmd = std::process::Command::new(&self.shell);
        std_cmd.arg("-c").arg(command).current_dir(working_dir);

        #[cfg(unix)]
        if self.termination == Termination::ProcessGroup {
            use std::os::unix::process::CommandExt;

            // The child becomes the leader of a new group whose id is its pid.
            std_cmd.process_group(0);
        }

        // The conversion resets stdio, so pipes are configured afterwards.
        let mut cmd = Command::from(std_cmd);
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(cause) => {
                debug!(command, cwd = %working_dir.display(), error = %cause, "spawn failed");
                return RunOutcome::SpawnFailed { cause };
            }
        };

        let mut guard = ChildGuard::new(child, self.termination);
        debug!(pid = guard.pid, command, cwd = %working_dir.display(), ?deadline, "spawned command");

        let stdin_pipe = guard.child.stdin.take();
        let mut stdout_pipe = guard.child.stdout.take();
        let mut stderr_pipe = guard.child.stderr.take();
        let mut stdout = Capture::new(self.capture_lines);
        let mut stderr = Capture::new(self.capture_lines);

        let exited = {
            let feed = feed_stdin(stdin_pipe, stdin.map(str::as_bytes));
            let capture = future::zip(
                drain(stdout_pipe.as_mut(), &mut stdout),
                drain(stderr_pipe.as_mut(), &mut stderr),
            );
            let child = &mut guard.child;
            let finished = async {
                future::zip(feed, capture).await;
                child.status().await
            };

            future::or(async { Some(finished.await) }, async {
                Timer::after(deadline).await;
                None
            })
            .await
        };

        match exited {
            Some(status) => {
                guard.disarm();
                let exit_code = exit_code(status, guard.pid);
                debug!(pid = guard.pid, ?exit_code, "command exited");
                RunOutcome::Completed {
                    exit_code,
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                }
            }
            None => {
                debug!(pid = guard.pid, ?deadline, "deadline elapsed, terminating");
                guard.terminate();

                // Pick up whatever was already sitting in the pipes, without waiting
                // for a descendant that escaped the group to close them.
                within_grace(future::zip(
                    drain(stdout_pipe.as_mut(), &mut stdout),
                    drain(stderr_pipe.as_mut(), &mut stderr),
                ))
                .await;
                drop(stdout_pipe);
                drop(stderr_pipe);

                if within_grace(guard.child.status()).await.is_some() {
                    guard.disarm();
                } else {
                    warn!(pid = guard.pid, "timed-out process not reaped within grace period");
                }

                RunOutcome::TimedOut {
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                }
            }
        }
    }
}

/// Owns a spawned child until it has been reaped.
///
/// Dropping an armed guard (for example when the `run` future itself is dropped)
/// terminates the child so no process outlives its call.
struct ChildGuard {
    child: Child,
    pid: u32,
    termination: Termination,
    armed: bool,
}

impl ChildGuard {
    fn new(child: Child, termination: Termination) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            termination,
            armed: true,
        }
    }

    /// The child has been reaped; its pid may be reused and must not be signalled.
    const fn disarm(&mut self) {
        self.armed = false;
    }

    fn terminate(&mut self) {
        if self.termination == Termination::ProcessGroup {
            match kill_process_group(self.pid) {
                Ok(()) => return,
                Err(err) => {
                    debug!(pid = self.pid, error = %err, "group kill failed, killing process");
                }
            }
        }
        if let Err(err) = self.child.kill() {
            warn!(pid = self.pid, error = %err, "failed to kill process");
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.armed {
            self.terminate();
        }
    }
}

fn exit_code(status: io::Result<ExitStatus>, pid: u32) -> Option<i32> {
    match status {
        Ok(status) => status.code(),
        Err(err) => {
            warn!(pid, error = %err, "failed to read exit status");
            None
        }
    }
}

async fn feed_stdin(pipe: Option<async_process::ChildStdin>, input: Option<&[u8]>) {
    let (Some(mut pipe), Some(input)) = (pipe, input) else {
        return;
    };
    // A child that exits without reading its input closes the pipe on us.
    if let Err(err) = pipe.write_all(input).await {
        debug!(error = %err, "stdin not fully written");
    }
    if let Err(err) = pipe.close().await {
        debug!(error = %err, "closing stdin failed");
    }
}

/// Bytes kept from one output stream.
struct Capture {
    bytes: Vec<u8>,
    /// Newlines that may still be stored. `None` keeps everything.
    lines_left: Option<usize>,
}

impl Capture {
    fn new(max_lines: Option<NonZeroUsize>) -> Self {
        Self {
            bytes: Vec::new(),
            lines_left: max_lines.map(NonZeroUsize::get),
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let Some(left) = self.lines_left.as_mut() else {
            self.bytes.extend_from_slice(chunk);
            return;
        };
        if *left == 0 {
            return;
        }
        let mut end = chunk.len();
        for (i, _) in chunk.iter().enumerate().filter(|(_, byte)| **byte == b'\n') {
            *left -= 1;
            if *left == 0 {
                end = i + 1;
                break;
            }
        }
        self.bytes.extend_from_slice(&chunk[..end]);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Reads `pipe` to EOF in fixed-size chunks.
async fn drain<R: AsyncRead + Unpin>(pipe: Option<&mut R>, capture: &mut Capture) {
    let Some(pipe) = pipe else {
        return;
    };
    let mut chunk = vec![0; CHUNK_SIZE];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => return,
            Ok(n) => capture.push(&chunk[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                debug!(error = %err, "reading child output failed");
                return;
            }
        }
    }
}

async fn within_grace<T>(fut: impl Future<Output = T>) -> Option<T> {
    future::or(async { Some(fut.await) }, async {
        Timer::after(CLEANUP_GRACE).await;
        None
    })
    .await
}

/// Sends `SIGKILL` to the process group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pid).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // SAFETY: `killpg` has no memory-safety preconditions.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups are not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn runner() -> ProcessRunner {
        ProcessRunner::new()
    }

    fn cwd() -> PathBuf {
        std::env::temp_dir()
    }

    fn process_alive(pid: libc::pid_t) -> bool {
        // SAFETY: signal 0 only checks for existence.
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let outcome = runner()
            .run("echo hello; echo oops >&2; exit 3", None, &cwd(), Duration::from_secs(10))
            .await;
        let RunOutcome::Completed {
            exit_code,
            stdout,
            stderr,
        } = outcome
        else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(exit_code, Some(3));
        assert_eq!(stdout, b"hello\n");
        assert_eq!(stderr, b"oops\n");
    }

    #[tokio::test]
    async fn shell_features_work() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = runner()
            .run(
                "printf 'b\\na\\n' | sort > out.txt && cat *.txt",
                None,
                dir.path(),
                Duration::from_secs(10),
            )
            .await;
        assert!(matches!(
            outcome,
            RunOutcome::Completed { exit_code: Some(0), ref stdout, .. } if stdout == b"a\nb\n"
        ));
    }

    #[tokio::test]
    async fn stdin_is_fed_and_closed() {
        let outcome = runner()
            .run("cat; echo done", Some("piped input\n"), &cwd(), Duration::from_secs(10))
            .await;
        assert!(matches!(
            outcome,
            RunOutcome::Completed { ref stdout, .. } if stdout == b"piped input\ndone\n"
        ));

        // Without input, a reader sees EOF instead of hanging.
        let outcome = runner()
            .run("cat; echo eof", None, &cwd(), Duration::from_secs(10))
            .await;
        assert!(matches!(
            outcome,
            RunOutcome::Completed { ref stdout, .. } if stdout == b"eof\n"
        ));
    }

    #[tokio::test]
    async fn unread_stdin_does_not_fail_the_run() {
        let input = "x".repeat(1 << 20);
        let outcome = runner()
            .run("true", Some(&input), &cwd(), Duration::from_secs(10))
            .await;
        assert!(matches!(
            outcome,
            RunOutcome::Completed { exit_code: Some(0), .. }
        ));
    }

    #[tokio::test]
    async fn large_output_finishes_well_before_the_deadline() {
        let started = Instant::now();
        let outcome = runner()
            .run("yes | head -c 40000000", None, &cwd(), Duration::from_secs(5))
            .await;
        let RunOutcome::Completed { exit_code, stdout, .. } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(exit_code, Some(0));
        assert_eq!(stdout.len(), 40_000_000);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn capture_stops_storing_after_the_line_limit() {
        let outcome = runner()
            .capture_lines(NonZeroUsize::new(5).unwrap())
            .run(
                "yes | head -c 40000000; printf 'a\\nb\\n' >&2",
                None,
                &cwd(),
                Duration::from_secs(5),
            )
            .await;
        let RunOutcome::Completed { stdout, stderr, .. } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(stdout, b"y\ny\ny\ny\ny\n");
        assert_eq!(stderr, b"a\nb\n");
    }

    #[test]
    fn capture_keeps_bytes_up_to_the_last_stored_newline() {
        let mut capture = Capture::new(NonZeroUsize::new(2));
        capture.push(b"one\ntw");
        capture.push(b"o\nthree\n");
        capture.push(b"four\n");
        assert_eq!(capture.into_bytes(), b"one\ntwo\n");

        let mut capture = Capture::new(None);
        capture.push(b"a\n");
        capture.push(b"b");
        assert_eq!(capture.into_bytes(), b"a\nb");
    }

    #[tokio::test]
    async fn deadline_interrupts_the_process() {
        let started = Instant::now();
        let outcome = runner()
            .run("sleep 5", None, &cwd(), Duration::from_secs(1))
            .await;
        assert!(matches!(outcome, RunOutcome::TimedOut { .. }), "{outcome:?}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn partial_output_is_kept_on_timeout() {
        let outcome = runner()
            .run("echo early; sleep 5", None, &cwd(), Duration::from_millis(500))
            .await;
        let RunOutcome::TimedOut { stdout, .. } = outcome else {
            panic!("expected timeout, got {outcome:?}");
        };
        assert_eq!(stdout, b"early\n");
    }

    #[tokio::test]
    async fn timeout_kills_background_children() {
        let outcome = runner()
            .run("sleep 30 & echo $!; wait", None, &cwd(), Duration::from_millis(500))
            .await;
        let RunOutcome::TimedOut { stdout, .. } = outcome else {
            panic!("expected timeout, got {outcome:?}");
        };
        let pid: libc::pid_t = String::from_utf8_lossy(&stdout).trim().parse().unwrap();

        let mut alive = true;
        for _ in 0..20 {
            if !process_alive(pid) {
                alive = false;
                break;
            }
            Timer::after(Duration::from_millis(100)).await;
        }
        assert!(!alive, "background child {pid} survived the timeout");
    }

    #[tokio::test]
    async fn single_process_termination_still_times_out() {
        let started = Instant::now();
        let outcome = runner()
            .termination(Termination::SingleProcess)
            .run("exec sleep 5", None, &cwd(), Duration::from_millis(300))
            .await;
        assert!(matches!(outcome, RunOutcome::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_working_directory_is_a_spawn_failure() {
        let outcome = runner()
            .run("true", None, Path::new("/definitely/not/here"), Duration::from_secs(5))
            .await;
        assert!(matches!(outcome, RunOutcome::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn missing_shell_is_a_spawn_failure() {
        let outcome = runner()
            .shell("/no/such/shell")
            .run("true", None, &cwd(), Duration::from_secs(5))
            .await;
        let RunOutcome::SpawnFailed { cause } = outcome else {
            panic!("expected spawn failure, got {outcome:?}");
        };
        assert_eq!(cause.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn signal_death_has_no_exit_code() {
        let outcome = runner()
            .run("kill -9 $$", None, &cwd(), Duration::from_secs(5))
            .await;
        assert!(matches!(
            outcome,
            RunOutcome::Completed { exit_code: None, .. }
        ));
    }
}
