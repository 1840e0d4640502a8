//! Process runner.
//!
//! Two shapes of child process:
//! - one-shot shell commands, collected fully, bounded by a timeout
//!   (capture mode and compile steps)
//! - a standalone executable whose output is streamed as `TerminalEvent`s
//!   (launching a program when no terminal session is live)

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::shell::ShellDialect;
use crate::{SessionId, TerminalEvent};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("`{command}` timed out after {timeout_ms} ms")]
    TimedOut { command: String, timeout_ms: u64 },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        text.push_str(&self.stderr);
        text
    }
}

/// The single seam between the core and process spawning.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands through the dialect's one-shot shell (`sh -c` /
/// `powershell -Command`).
#[derive(Debug, Clone, Copy)]
pub struct ShellRunner {
    dialect: ShellDialect,
}

impl ShellRunner {
    pub fn new(dialect: ShellDialect) -> Self {
        Self { dialect }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(ShellDialect::native())
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        let (program, args) = self.dialect.one_shot(command);

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so a timeout can take down grandchildren too
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(%command, cwd = %cwd.display(), ?timeout, "spawning one-shot command");

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let work = async {
            let (out, err, status) =
                tokio::join!(read_pipe(stdout), read_pipe(stderr), child.wait());
            Ok::<_, std::io::Error>((out?, err?, status?))
        };
        let waited = tokio::time::timeout(timeout, work).await;

        match waited {
            Ok(Ok((out, err, status))) => Ok(ProcessOutput {
                exit_code: status.code(),
                stdout: String::from_utf8_lossy(&out).into_owned(),
                stderr: String::from_utf8_lossy(&err).into_owned(),
            }),
            Ok(Err(e)) => Err(ProcessError::Io(e)),
            Err(_) => {
                tracing::warn!(%command, ?timeout, "command timed out, killing");
                kill_tree(&mut child, pid).await;
                Err(ProcessError::TimedOut {
                    command: command.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill the child's whole process group (Unix) and reap the child.
async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            tracing::debug!(pid, error = %e, "killpg failed");
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "child already gone");
    }
}

/// Launch `executable` directly and publish its output on `events`, ending
/// with an `Exited` event. Returns the id its events are tagged with.
pub fn spawn_streaming(
    executable: &Path,
    cwd: &Path,
    events: broadcast::Sender<TerminalEvent>,
) -> Result<SessionId, ProcessError> {
    let mut child = Command::new(executable)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            command: executable.display().to_string(),
            source,
        })?;

    let session = Uuid::new_v4();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    tracing::info!(%session, executable = %executable.display(), "launched standalone executable");

    tokio::spawn(async move {
        tokio::join!(
            pump(stdout, session, &events),
            pump(stderr, session, &events)
        );
        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!(%session, error = %e, "wait on launched executable failed");
                None
            }
        };
        let _ = events.send(TerminalEvent::Exited { session, code });
    });

    Ok(session)
}

async fn pump<R: AsyncRead + Unpin>(
    pipe: Option<R>,
    session: SessionId,
    events: &broadcast::Sender<TerminalEvent>,
) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut buf = [0u8; 4096];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                // No subscribers is fine; the output just isn't seen
                let _ = events.send(TerminalEvent::Output {
                    session,
                    data: buf[..n].to_vec(),
                });
            }
        }
    }
}
