//! Tool Executor
//!
//! Runs one canonical command as a child process under a timeout, captures
//! its output and classifies what happened as an [`ExecutionOutcome`].
//!
//! Commands are launched directly (never through a shell). The child gets a
//! piped stdin that is closed right after spawn, a captured stderr, and a
//! captured or inherited stdout depending on [`ExecutorConfig`].

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use super::error::{CommandError, NO_ERROR_MESSAGE};
use super::parser::CanonicalCommand;
use super::timeout::ExecutionTimeout;
use crate::logging::{default_sink, LogSink};
use crate::workdir::WorkingDir;

/// Maximum captured output size in bytes (1MB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Exit code reported when a child's status could not be collected
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Result of running one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exited with code 0. `stdout` is empty when stdout is not captured.
    Success { stdout: String },

    /// Exited with a nonzero code (`128 + N` when killed by signal N on Unix)
    Failure { exit_code: i32, stderr: String },

    /// Still running at the deadline; the process was killed
    TimedOut { elapsed: Duration },

    /// The process could not be started
    NotLaunched { reason: String },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match self {
            Self::Success { stdout } => format!("Success ({} bytes output)", stdout.len()),
            Self::Failure { exit_code, stderr } => {
                format!("Failed (exit code: {}, {} bytes stderr)", exit_code, stderr.len())
            }
            Self::TimedOut { elapsed } => format!("Timeout after {:?}", elapsed),
            Self::NotLaunched { reason } => format!("Not launched ({})", reason),
        }
    }

    /// Convert into the captured stdout, or the classified error for `command`
    pub fn into_result(self, command: &CanonicalCommand) -> Result<String, CommandError> {
        let command = command.command_line();
        match self {
            Self::Success { stdout } => Ok(stdout),
            Self::Failure { exit_code, stderr } => Err(CommandError::Failed {
                command,
                exit_code,
                stderr: describe_stderr(&stderr),
            }),
            Self::TimedOut { elapsed } => Err(CommandError::TimedOut { command, elapsed }),
            Self::NotLaunched { reason } => Err(CommandError::NotLaunched { command, reason }),
        }
    }
}

/// Configuration for tool execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Whether to capture stdout (default: true). Inherited otherwise.
    pub capture_stdout: bool,

    /// Maximum captured size per stream in bytes (default: 1MB)
    pub max_output_size: usize,

    /// Working directory for command execution (default: current directory)
    pub working_dir: Option<WorkingDir>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            capture_stdout: true,
            max_output_size: MAX_OUTPUT_SIZE,
            working_dir: None,
        }
    }
}

impl ExecutorConfig {
    /// Set a custom output limit
    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }

    /// Run commands inside `dir`
    pub fn with_working_dir(mut self, dir: WorkingDir) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Let children write straight to this process's stdout
    pub fn without_stdout_capture(mut self) -> Self {
        self.capture_stdout = false;
        self
    }
}

/// Runs a single command and reports its outcome
///
/// The seam between the runner and the operating system; tests substitute
/// their own implementations.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn execute(
        &self,
        command: &CanonicalCommand,
        timeout: ExecutionTimeout,
    ) -> ExecutionOutcome;
}

/// Executor backed by `tokio::process`
///
/// # Example
///
/// ```no_run
/// use cmdguard::tools::{CanonicalCommand, ExecutionTimeout, ProcessExecutor, ToolExecutor};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let executor = ToolExecutor::new();
///     let command = CanonicalCommand::new(["git", "status"])?;
///
///     let outcome = executor.execute(&command, ExecutionTimeout::default()).await;
///     println!("{}", outcome.summary());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ToolExecutor {
    /// Executor configuration
    config: ExecutorConfig,

    sink: Arc<dyn LogSink>,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ToolExecutor {
    /// Create a new tool executor with default configuration
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    /// Create a new tool executor with custom configuration
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            sink: default_sink(),
        }
    }

    /// Replace the log sink
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Get a reference to the config
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Get a mutable reference to the config
    pub fn config_mut(&mut self) -> &mut ExecutorConfig {
        &mut self.config
    }

    async fn launch(&self, command: &CanonicalCommand, timeout: ExecutionTimeout) -> ExecutionOutcome {
        let mut process = TokioCommand::new(command.program());
        process
            .args(command.args())
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.config.capture_stdout {
            process.stdout(Stdio::piped());
        } else {
            process.stdout(Stdio::inherit());
        }

        if let Some(ref dir) = self.config.working_dir {
            process.current_dir(dir.path());
        }

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionOutcome::NotLaunched {
                    reason: e.to_string(),
                }
            }
        };
        debug!(pid = ?child.id(), program = command.program(), "Spawned child process");

        // Closed immediately so children that read stdin see EOF
        drop(child.stdin.take());

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let limit = self.config.max_output_size;

        let collect = async {
            tokio::join!(
                read_pipe(stdout_pipe, limit),
                read_pipe(stderr_pipe, limit),
                child.wait()
            )
        };

        let collected = timeout.run(collect).await;
        let Some((stdout, stderr, status)) = collected else {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill timed out process: {}", e);
            }
            // SIGKILL cannot be ignored, so reaping returns promptly
            if let Err(e) = child.wait().await {
                warn!("Failed to reap timed out process: {}", e);
            }
            return ExecutionOutcome::TimedOut {
                elapsed: timeout.duration(),
            };
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                return ExecutionOutcome::Failure {
                    exit_code: UNKNOWN_EXIT_CODE,
                    stderr: format!("Failed to wait for process: {}", e),
                }
            }
        };

        if status.success() {
            ExecutionOutcome::Success {
                stdout: truncate_string(stdout, limit),
            }
        } else {
            ExecutionOutcome::Failure {
                exit_code: exit_code_from_status(status),
                stderr: truncate_string(stderr, limit),
            }
        }
    }

    fn report(&self, line: &str, outcome: &ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Success { stdout } => {
                let stdout = stdout.trim();
                if !stdout.is_empty() {
                    self.sink.info(&format!("Command output:\n{}", stdout));
                }
                self.sink
                    .info(&format!("Command completed successfully: {}", line));
            }
            ExecutionOutcome::Failure { exit_code, stderr } => {
                self.sink.error(&format!(
                    "Command failed: {} (exit code {})\nError: {}",
                    line,
                    exit_code,
                    describe_stderr(stderr)
                ));
            }
            ExecutionOutcome::TimedOut { elapsed } => {
                self.sink
                    .error(&format!("Command timed out after {:?}: {}", elapsed, line));
            }
            ExecutionOutcome::NotLaunched { reason } => {
                self.sink.error(&format!(
                    "Command could not be launched: {}: {}",
                    line, reason
                ));
            }
        }
    }
}

#[async_trait]
impl ProcessExecutor for ToolExecutor {
    async fn execute(
        &self,
        command: &CanonicalCommand,
        timeout: ExecutionTimeout,
    ) -> ExecutionOutcome {
        let line = command.command_line();
        self.sink.info(&format!("Executing command: {}", line));

        let start = Instant::now();
        let outcome = self.launch(command, timeout).await;
        debug!(
            command = %line,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "{}",
            outcome.summary()
        );

        self.report(&line, &outcome);
        outcome
    }
}

/// Read a child pipe to the end, keeping at most `limit` bytes (+1 to detect overflow)
///
/// The pipe is drained past the limit so the child never blocks on a full pipe.
async fn read_pipe<R>(pipe: Option<R>, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return String::new();
    };

    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_add(1).saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                debug!("Stopped reading child output: {}", e);
                break;
            }
        }
    }

    String::from_utf8_lossy(&kept).into_owned()
}

/// Extract an exit code from a process status, mapping signals to 128+N on Unix
fn exit_code_from_status(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status
            .code()
            .unwrap_or_else(|| status.signal().map_or(1, |s| 128 + s))
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}

/// Trimmed stderr, or a placeholder when the child printed nothing
fn describe_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        NO_ERROR_MESSAGE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Truncate a string to at most `max_len` bytes, ending in an ellipsis if
/// there is room for one
fn truncate_string(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let ellipsis = if max_len >= 3 { "..." } else { "" };
        let mut cut = max_len - ellipsis.len();
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str(ellipsis);
    }
    s
}
