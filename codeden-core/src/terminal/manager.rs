use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::pty::{PtyChild, PtyShell};
use super::transcript::{TranscriptBuffer, DEFAULT_TRANSCRIPT_CAP};
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::shell::ShellDialect;
use crate::{SessionId, TerminalEvent};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct TerminalSettings {
    pub dialect: ShellDialect,
    /// Overrides the dialect's interactive shell.
    pub program: Option<String>,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
    pub transcript_cap: usize,
}

impl TerminalSettings {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            dialect: ShellDialect::native(),
            program: None,
            args: Vec::new(),
            cwd: cwd.into(),
            cols: 80,
            rows: 24,
            transcript_cap: DEFAULT_TRANSCRIPT_CAP,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            dialect: config.dialect,
            program: config.shell.clone(),
            args: config.shell_args.clone(),
            cwd: config.scratch_dir.clone(),
            cols: config.terminal_cols,
            rows: config.terminal_rows,
            transcript_cap: config.transcript_cap_bytes,
        }
    }

    fn shell_command(&self) -> (String, Vec<String>) {
        match &self.program {
            Some(program) => (program.clone(), self.args.clone()),
            None => self.dialect.interactive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub shell: String,
    pub cwd: PathBuf,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
struct LiveSession {
    info: SessionInfo,
    shell: PtyShell,
    alive: Arc<AtomicBool>,
}

/// Transcript plus the session allowed to append to it. A torn-down
/// session's reader may still deliver a last chunk; it must not land here.
#[derive(Debug)]
struct SharedTranscript {
    owner: Option<SessionId>,
    buffer: TranscriptBuffer,
}

fn lock(transcript: &Mutex<SharedTranscript>) -> MutexGuard<'_, SharedTranscript> {
    transcript.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the one interactive terminal session.
///
/// Output from the shell goes to every subscriber in arrival order and into
/// the bounded transcript. Writes with no live session are dropped.
#[derive(Debug)]
pub struct TerminalSessionManager {
    settings: TerminalSettings,
    session: tokio::sync::Mutex<Option<LiveSession>>,
    transcript: Arc<Mutex<SharedTranscript>>,
    events: broadcast::Sender<TerminalEvent>,
}

impl TerminalSessionManager {
    pub fn new(settings: TerminalSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let transcript = SharedTranscript {
            owner: None,
            buffer: TranscriptBuffer::new(settings.transcript_cap),
        };
        Self {
            settings,
            session: tokio::sync::Mutex::new(None),
            transcript: Arc::new(Mutex::new(transcript)),
            events,
        }
    }

    pub fn settings(&self) -> &TerminalSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TerminalEvent> {
        self.events.subscribe()
    }

    /// Sender side of the event channel, for other producers (standalone
    /// launches) that should look the same to subscribers.
    pub fn events(&self) -> broadcast::Sender<TerminalEvent> {
        self.events.clone()
    }

    /// Start a fresh shell, replacing any live one.
    pub async fn start(&self) -> Result<SessionInfo, CoreError> {
        let mut slot = self.session.lock().await;
        if let Some(old) = slot.take() {
            tracing::info!(session = %old.info.id, "replacing live terminal session");
            teardown(old);
        }

        let cwd = self.settings.cwd.clone();
        tokio::fs::create_dir_all(&cwd).await?;

        let (program, args) = self.settings.shell_command();
        let (shell, child) = PtyShell::spawn(
            &program,
            &args,
            &cwd,
            self.settings.cols,
            self.settings.rows,
        )
        .map_err(|e| CoreError::Pty(format!("{:#}", e)))?;
        let reader = shell
            .reader()
            .map_err(|e| CoreError::Pty(format!("{:#}", e)))?;

        let id = Uuid::new_v4();
        {
            let mut transcript = lock(&self.transcript);
            transcript.owner = Some(id);
            transcript.buffer.clear();
        }

        let alive = Arc::new(AtomicBool::new(true));
        let mut live = LiveSession {
            info: SessionInfo {
                id,
                shell: program,
                cwd,
                started_at: Utc::now(),
            },
            shell,
            alive: alive.clone(),
        };

        if let Err(e) = spawn_pump(
            id,
            reader,
            child,
            self.transcript.clone(),
            self.events.clone(),
            alive,
        ) {
            let _ = live.shell.kill();
            return Err(CoreError::Pty(format!("Failed to start PTY reader: {}", e)));
        }

        tracing::info!(
            session = %id,
            shell = %live.info.shell,
            pid = ?live.shell.pid(),
            "terminal session started"
        );
        let info = live.info.clone();
        *slot = Some(live);
        Ok(info)
    }

    /// Kill the live session, if any. Returns whether one was live.
    pub async fn stop(&self) -> bool {
        let Some(live) = self.session.lock().await.take() else {
            return false;
        };
        tracing::info!(session = %live.info.id, "terminal session stopped");
        teardown(live)
    }

    pub async fn is_live(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|live| live.alive.load(Ordering::SeqCst))
    }

    pub async fn current(&self) -> Option<SessionInfo> {
        self.session
            .lock()
            .await
            .as_ref()
            .filter(|live| live.alive.load(Ordering::SeqCst))
            .map(|live| live.info.clone())
    }

    /// Forward raw input. Returns whether it reached a live shell.
    pub async fn write(&self, data: &[u8]) -> bool {
        let mut slot = self.session.lock().await;
        let Some(live) = slot.as_mut().filter(|l| l.alive.load(Ordering::SeqCst)) else {
            tracing::debug!(bytes = data.len(), "terminal write ignored: no live session");
            return false;
        };
        match live.shell.write_raw(data) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(session = %live.info.id, error = %e, "terminal write failed");
                false
            }
        }
    }

    /// Type `command` and press Enter.
    pub async fn inject_command(&self, command: &str) -> bool {
        let mut slot = self.session.lock().await;
        let Some(live) = slot.as_mut().filter(|l| l.alive.load(Ordering::SeqCst)) else {
            tracing::debug!(%command, "inject ignored: no live session");
            return false;
        };
        let terminator = self.settings.dialect.line_terminator();
        match live.shell.write_line(command, terminator) {
            Ok(()) => {
                tracing::debug!(session = %live.info.id, %command, "injected command");
                true
            }
            Err(e) => {
                tracing::debug!(session = %live.info.id, error = %e, "inject failed");
                false
            }
        }
    }

    pub async fn resize(&self, cols: u16, rows: u16) -> Result<(), CoreError> {
        match self.session.lock().await.as_ref() {
            Some(live) => live
                .shell
                .resize(cols, rows)
                .map_err(|e| CoreError::Pty(format!("{:#}", e))),
            None => Ok(()),
        }
    }

    /// Current transcript contents. Does not clear.
    pub fn export_transcript(&self) -> String {
        lock(&self.transcript).buffer.export()
    }
}

impl Drop for TerminalSessionManager {
    fn drop(&mut self) {
        if let Some(live) = self.session.get_mut().take() {
            teardown(live);
        }
    }
}

/// Best effort; a misbehaving old shell never blocks anything. Returns
/// whether a kill was sent.
///
/// A shell the pump has already reaped is left alone: its pid may belong to
/// some other process by now.
fn teardown(mut live: LiveSession) -> bool {
    if !live.alive.swap(false, Ordering::SeqCst) {
        tracing::debug!(session = %live.info.id, "shell already exited; nothing to kill");
        return false;
    }
    if let Err(e) = live.shell.kill() {
        tracing::warn!(session = %live.info.id, error = %e, "ignoring failure to kill shell");
    }
    true
}

/// Blocking PTY reads live on their own thread; they feed the transcript
/// and the event channel, then report the exit.
fn spawn_pump(
    id: SessionId,
    mut reader: Box<dyn Read + Send>,
    mut child: PtyChild,
    transcript: Arc<Mutex<SharedTranscript>>,
    events: broadcast::Sender<TerminalEvent>,
    alive: Arc<AtomicBool>,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name(format!("codeden-pty-{}", id.simple()))
        .spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = &buf[..n];
                        {
                            let mut t = lock(&transcript);
                            if t.owner == Some(id) {
                                t.buffer.append(chunk);
                            }
                        }
                        let _ = events.send(TerminalEvent::Output {
                            session: id,
                            data: chunk.to_vec(),
                        });
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }

            let code = match child.wait() {
                Ok(status) => i32::try_from(status.exit_code()).ok(),
                Err(e) => {
                    tracing::debug!(session = %id, error = %e, "wait on shell failed");
                    None
                }
            };
            alive.store(false, Ordering::SeqCst);
            tracing::info!(session = %id, ?code, "terminal process exited");
            let _ = events.send(TerminalEvent::Exited { session: id, code });
        })
        .map(|_| ())
}
