//! Bounded Process Runner
//!
//! Runs one [`CommandSpec`] inside the configured execution target, captures
//! its output and enforces a wall-clock timeout. Every outcome, including
//! spawn failures and timeouts, is reported as an [`ExecutionResult`]; the
//! runner never returns an error to its caller.
//!
//! On timeout (or shutdown) the process group receives SIGTERM, gets a grace
//! period to exit, and is then killed and reaped. The timeout also bounds
//! reading the output pipes, which forked children may hold open.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::builder::CommandSpec;
use super::registry::ToolKind;
use super::timeout::ExecutionTimeout;
use super::validator::CommandValidator;

/// Exit code reported when no real exit code exists (timeout, spawn failure)
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// Default grace period between SIGTERM and SIGKILL
const DEFAULT_KILL_GRACE_SECS: u64 = 5;

/// Extra time the in-container limit allows beyond the runner's own timeout
const CONTAINER_LIMIT_MARGIN: Duration = Duration::from_secs(1);

/// Result of running a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// True iff the process exited with code 0
    pub success: bool,

    /// Captured standard output
    pub output: String,

    /// Captured standard error, or the failure description
    pub error: Option<String>,

    /// Process exit code, [`SENTINEL_EXIT_CODE`] when there is none
    pub return_code: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Whether the process was stopped by the timeout
    #[serde(default)]
    pub timed_out: bool,

    #[serde(default)]
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Result of a process that ran to completion
    pub fn completed(stdout: String, stderr: String, return_code: i32, duration: Duration) -> Self {
        Self {
            success: return_code == 0,
            output: stdout,
            error: (!stderr.is_empty()).then_some(stderr),
            return_code,
            tool: None,
            target: None,
            timed_out: false,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Result of a command that could not be run at all
    pub fn failure(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            return_code: SENTINEL_EXIT_CODE,
            tool: None,
            target: None,
            timed_out: false,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Result of a process stopped by its timeout
    pub fn timeout(timeout: ExecutionTimeout, duration: Duration) -> Self {
        Self {
            timed_out: true,
            ..Self::failure(timeout.expired_message(), duration)
        }
    }

    /// Attribute the result to a tool invocation
    pub fn annotate(mut self, tool: ToolKind, target: impl Into<String>) -> Self {
        self.tool = Some(tool);
        self.target = Some(target.into());
        self
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        if self.timed_out {
            format!("Timeout after {}ms", self.duration_ms)
        } else if self.success {
            format!(
                "Success (exit code: {}, {}ms, {} bytes output)",
                self.return_code,
                self.duration_ms,
                self.output.len()
            )
        } else {
            format!(
                "Failed (exit code: {}, {}ms): {}",
                self.return_code,
                self.duration_ms,
                self.error.as_deref().unwrap_or("no error output")
            )
        }
    }
}

/// Where commands actually run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// Directly on this host
    Host,

    /// `docker compose -f <file> exec -T <service> ...`
    Compose { compose_file: PathBuf, service: String },

    /// `docker exec -i <container> ...`
    Container { name: String },
}

impl ExecutionTarget {
    /// Wrap a command into the program and arguments actually spawned
    ///
    /// Signals sent to the local `docker` client do not reach the tool inside
    /// the container, so container runs are placed under coreutils `timeout`
    /// there: the tool gets SIGTERM shortly after the runner's own timeout and
    /// SIGKILL `grace` later.
    pub fn wrap(
        &self,
        command: &CommandSpec,
        timeout: ExecutionTimeout,
        grace: Duration,
    ) -> (String, Vec<String>) {
        let mut args = match self {
            Self::Host => return (command.program.clone(), command.args.clone()),
            Self::Compose {
                compose_file,
                service,
            } => vec![
                "compose".to_string(),
                "-f".to_string(),
                compose_file.display().to_string(),
                "exec".to_string(),
                "-T".to_string(),
                service.clone(),
            ],
            Self::Container { name } => {
                vec!["exec".to_string(), "-i".to_string(), name.clone()]
            }
        };
        args.extend([
            "timeout".to_string(),
            "-k".to_string(),
            secs_arg(grace),
            secs_arg(timeout.duration() + CONTAINER_LIMIT_MARGIN),
        ]);
        args.push(command.program.clone());
        args.extend(command.args.iter().cloned());
        ("docker".to_string(), args)
    }
}

/// Duration in the `<n>s` form coreutils `timeout` accepts
fn secs_arg(duration: Duration) -> String {
    format!("{}s", duration.as_secs_f64())
}

/// Configuration for the process runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Working directory for spawned processes
    pub working_dir: Option<PathBuf>,

    /// Directory searched ahead of `PATH` for tool binaries
    pub tool_dir: Option<PathBuf>,

    /// Time allowed between SIGTERM and SIGKILL
    pub kill_grace: Duration,

    /// Whether to check programs against the whitelist (default: true)
    pub validate_commands: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            tool_dir: None,
            kill_grace: Duration::from_secs(DEFAULT_KILL_GRACE_SECS),
            validate_commands: true,
        }
    }
}

impl RunnerConfig {
    pub fn with_working_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    pub fn tool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_dir = Some(dir.into());
        self
    }

    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Disable the program whitelist
    pub fn skip_validation(mut self) -> Self {
        self.validate_commands = false;
        self
    }
}

/// How a bounded run ended
enum WaitOutcome {
    /// Exit status plus everything read from stdout and stderr
    Finished(std::io::Result<ExitStatus>, String, String),
    TimedOut,
    Cancelled,
}

/// Timeout-bounded process runner
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    target: ExecutionTarget,
    validator: CommandValidator,
    config: RunnerConfig,
    shutdown: CancellationToken,
}

impl ProcessRunner {
    pub fn new(target: ExecutionTarget, config: RunnerConfig) -> Self {
        Self {
            target,
            validator: CommandValidator::default(),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_validator(mut self, validator: CommandValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Cancel in-flight runs when `token` fires
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Run a command with a timeout
    ///
    /// Spawns exactly one process. Never fails: spawn errors, I/O errors and
    /// timeouts are all folded into the returned result.
    pub async fn run(&self, command: &CommandSpec, timeout: ExecutionTimeout) -> ExecutionResult {
        let start = Instant::now();

        if self.config.validate_commands {
            if let Err(e) = self.validator.validate_program(&command.program) {
                warn!(program = %command.program, error = %e, "Command validation failed");
                return ExecutionResult::failure(
                    format!("Command validation failed: {}", e),
                    start.elapsed(),
                );
            }
        }

        let (program, args) = self.target.wrap(command, timeout, self.config.kill_grace);
        info!(
            program = %command.program,
            args = command.args.len(),
            timeout_secs = timeout.duration().as_secs(),
            "Executing command"
        );
        debug!(command = %command.command_line(), via = %program, "Full command line");

        let mut process = Command::new(&program);
        process
            .args(&args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so termination also reaches anything the tool forks
        #[cfg(unix)]
        process.process_group(0);
        if let Some(dir) = &self.config.working_dir {
            process.current_dir(dir);
        }
        if let Some(dir) = &self.config.tool_dir {
            process.env("PATH", search_path(dir));
        }

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %program, error = %e, "Failed to spawn process");
                return ExecutionResult::failure(
                    format!("Failed to spawn process '{}': {}", program, e),
                    start.elapsed(),
                );
            }
        };

        let pid = child.id();

        let mut stdin_task = match (child.stdin.take(), command.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
                // A process that exits without reading its input is not an error
                let _ = pipe.write_all(input.as_bytes()).await;
                let _ = pipe.shutdown().await;
            })),
            _ => None,
        };
        let mut stdout_task = child.stdout.take().map(spawn_reader);
        let mut stderr_task = child.stderr.take().map(spawn_reader);

        // The timeout covers the exit and draining both pipes: a forked child
        // holding a pipe open keeps the run going
        let outcome = tokio::select! {
            finished = timeout.run(async {
                let status = child.wait().await;
                if let Some(task) = stdin_task.as_mut() {
                    let _ = task.await;
                }
                let stdout = collect(stdout_task.as_mut()).await;
                let stderr = collect(stderr_task.as_mut()).await;
                (status, stdout, stderr)
            }) => match finished {
                Ok((status, stdout, stderr)) => WaitOutcome::Finished(status, stdout, stderr),
                Err(_) => WaitOutcome::TimedOut,
            },
            _ = self.shutdown.cancelled() => WaitOutcome::Cancelled,
        };

        let (status, stdout, stderr) = match outcome {
            WaitOutcome::Finished(Ok(status), stdout, stderr) => (status, stdout, stderr),
            WaitOutcome::Finished(Err(e), _, _) => {
                terminate(&mut child, pid, self.config.kill_grace).await;
                abort_io(stdin_task, stdout_task, stderr_task);
                return ExecutionResult::failure(
                    format!("Failed to wait for process: {}", e),
                    start.elapsed(),
                );
            }
            WaitOutcome::TimedOut => {
                warn!(program = %command.program, "Command timed out after {:?}", timeout.duration());
                terminate(&mut child, pid, self.config.kill_grace).await;
                abort_io(stdin_task, stdout_task, stderr_task);
                return ExecutionResult::timeout(timeout, start.elapsed());
            }
            WaitOutcome::Cancelled => {
                warn!(program = %command.program, "Command cancelled by shutdown");
                terminate(&mut child, pid, self.config.kill_grace).await;
                abort_io(stdin_task, stdout_task, stderr_task);
                return ExecutionResult::failure("Command cancelled", start.elapsed());
            }
        };
        let duration = start.elapsed();

        let return_code = match status.code() {
            Some(code) => code,
            None => {
                warn!(program = %command.program, "Process terminated by signal");
                SENTINEL_EXIT_CODE
            }
        };

        let result = ExecutionResult::completed(stdout, stderr, return_code, duration);
        if result.success {
            info!(program = %command.program, "{}", result.summary());
        } else {
            warn!(program = %command.program, "{}", result.summary());
        }
        result
    }
}

/// `dir` followed by the inherited `PATH`
fn search_path(dir: &std::path::Path) -> std::ffi::OsString {
    let inherited = std::env::var_os("PATH").unwrap_or_default();
    let paths = std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(&inherited));
    std::env::join_paths(paths).unwrap_or(inherited)
}

/// Read a pipe to its end on a separate task
fn spawn_reader<R>(mut pipe: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf).await;
        buf
    })
}

async fn collect(task: Option<&mut JoinHandle<Vec<u8>>>) -> String {
    match task {
        Some(task) => String::from_utf8_lossy(&task.await.unwrap_or_default()).into_owned(),
        None => String::new(),
    }
}

fn abort_io(
    stdin: Option<JoinHandle<()>>,
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
) {
    if let Some(task) = stdin {
        task.abort();
    }
    for task in [stdout, stderr].into_iter().flatten() {
        task.abort();
    }
}

/// Stop a child and its process group
///
/// SIGTERM goes to the whole group, which then gets up to `grace` to exit.
/// Whatever is left is sent SIGKILL and the child is reaped.
#[cfg(unix)]
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(group) = pid.map(|pid| Pid::from_raw(pid as i32)) else {
        return kill_child(child).await;
    };

    if killpg(group, Signal::SIGTERM).is_ok() {
        let deadline = tokio::time::Instant::now() + grace;
        if tokio::time::timeout_at(deadline, child.wait()).await.is_ok() {
            debug!("Process exited after SIGTERM");
        }
        // Forked children may still be shutting down after the leader is gone
        while killpg(group, None).is_ok() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    // ESRCH here just means the group is already gone
    let _ = killpg(group, Signal::SIGKILL);
    kill_child(child).await;
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _pid: Option<u32>, _grace: Duration) {
    kill_child(child).await;
}

/// SIGKILL and reap the direct child, if it is still around
async fn kill_child(child: &mut Child) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill process");
    }
}
