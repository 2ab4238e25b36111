//! Command execution.
//!
//! [`CommandRunner`] is the seam between a job and the operating system.
//! [`ProcessRunner`] is the production implementation on top of
//! `tokio::process`; tests substitute scripted runners.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ChainrunError, Result};
use crate::jobs::CommandLine;

/// Offset added to the signal number of a child killed by a signal, as
/// shells report it. Keeps signal deaths apart from launch failures (-1).
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The command ran to completion, whatever its exit code.
    Exited {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// The command was cancelled because it exceeded its timeout.
    TimedOut { partial_output: String },
}

impl RunOutcome {
    pub fn exited(exit_code: i32) -> Self {
        Self::Exited {
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Runs one attempt of a command, bounded by an optional timeout.
///
/// Errors are reserved for commands that could not be started at all;
/// a non-zero exit code is an [`RunOutcome::Exited`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandLine, timeout: Option<Duration>) -> Result<RunOutcome>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// How long output readers may keep draining after the child is gone
    reader_grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            reader_grace: Duration::from_secs(2),
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(command: &CommandLine) -> Result<Command> {
        if command.is_empty() {
            return Err(ChainrunError::empty_command());
        }

        let mut cmd = match command {
            CommandLine::Shell(line) => shell_command(line),
            CommandLine::Args(args) => {
                let (program, rest) = args.split_first().ok_or_else(ChainrunError::empty_command)?;
                let mut cmd = Command::new(program);
                cmd.args(rest);
                cmd
            }
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so a timeout reaches grandchildren of `sh -c`.
        #[cfg(unix)]
        cmd.process_group(0);

        Ok(cmd)
    }

    async fn terminate(child: &mut Child) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                // SAFETY: plain syscall on a process group created by `build`.
                // A group that already exited only yields ESRCH.
                unsafe {
                    libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
                }
            }
        }

        if let Err(error) = child.kill().await {
            debug!(error = %error, "Child already gone");
        }
    }

    async fn settle(&self, readers: [JoinHandle<()>; 2]) {
        for reader in readers {
            let abort = reader.abort_handle();
            if tokio::time::timeout(self.reader_grace, reader).await.is_err() {
                abort.abort();
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandLine, timeout: Option<Duration>) -> Result<RunOutcome> {
        let mut cmd = Self::build(command)?;
        let mut child = cmd.spawn().map_err(|e| {
            ChainrunError::command_launch_failed(command.program(), e.to_string()).with_source(e)
        })?;

        debug!(command = %command, pid = child.id(), "Child spawned");

        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));
        let readers = [
            drain(child.stdout.take(), Arc::clone(&stdout)),
            drain(child.stderr.take(), Arc::clone(&stderr)),
        ];

        let status = match timeout {
            None => child.wait().await?,
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(command = %command, timeout_ms = limit.as_millis() as u64, "Command timed out, killing");
                    Self::terminate(&mut child).await;
                    self.settle(readers).await;

                    let mut partial_output = take_text(&stdout);
                    partial_output.push_str(&take_text(&stderr));
                    return Ok(RunOutcome::TimedOut { partial_output });
                }
            },
        };

        self.settle(readers).await;

        Ok(RunOutcome::Exited {
            exit_code: exit_code_of(status),
            stdout: take_text(&stdout),
            stderr: take_text(&stderr),
        })
    }
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| SIGNAL_EXIT_BASE + signal))
        .unwrap_or(SIGNAL_EXIT_BASE)
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNAL_EXIT_BASE)
}

#[cfg(unix)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

/// Copy a pipe into a shared buffer chunk by chunk, so whatever arrived before
/// a kill is still available.
fn drain<R>(pipe: Option<R>, buffer: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer.lock().extend_from_slice(&chunk[..n]),
            }
        }
    })
}

fn take_text(buffer: &Mutex<Vec<u8>>) -> String {
    let bytes = std::mem::take(&mut *buffer.lock());
    String::from_utf8_lossy(&bytes).into_owned()
}
