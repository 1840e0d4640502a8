//! The orchestration layer a host talks to.
//!
//! Owns the dispatcher, the terminal session manager and the file store,
//! and decides when a built command goes into the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::command::Action;
use crate::config::CoreConfig;
use crate::dispatcher::{ExecutionDispatcher, Timeouts};
use crate::error::CoreError;
use crate::files::{sanitize_basename, FileStore, OpenedFile};
use crate::languages::LanguageRegistry;
use crate::process::{spawn_streaming, CommandRunner, ShellRunner};
use crate::terminal::{SessionInfo, TerminalSessionManager, TerminalSettings};
use crate::{RunRequest, RunResult, SessionId, TerminalEvent};

/// How `launch_executable` got the program running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Launched {
    /// Typed into the live terminal session.
    Injected,
    /// Spawned on its own; its output arrives tagged with `session`.
    Spawned { session: SessionId },
}

#[derive(Debug)]
pub struct Workbench {
    config: CoreConfig,
    dispatcher: ExecutionDispatcher,
    terminal: Arc<TerminalSessionManager>,
    files: FileStore,
}

impl Workbench {
    pub fn new(config: CoreConfig) -> Result<Self, CoreError> {
        let runner = Arc::new(ShellRunner::new(config.dialect));
        Self::with_runner(config, runner)
    }

    pub fn with_runner(
        config: CoreConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, CoreError> {
        let files = FileStore::from_config(&config);
        files.ensure_scratch_dir()?;

        let registry = Arc::new(LanguageRegistry::with_overrides(
            config.dialect,
            &config.languages,
        ));
        let dispatcher = ExecutionDispatcher::new(registry, files.clone(), runner)
            .with_timeouts(Timeouts::from_config(&config));
        let terminal = Arc::new(TerminalSessionManager::new(TerminalSettings::from_config(
            &config,
        )));

        tracing::info!(
            scratch_dir = %files.scratch_dir().display(),
            languages = dispatcher.registry().len(),
            "workbench ready"
        );

        Ok(Self {
            config,
            dispatcher,
            terminal,
            files,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &ExecutionDispatcher {
        &self.dispatcher
    }

    pub fn terminal(&self) -> &Arc<TerminalSessionManager> {
        &self.terminal
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn languages(&self) -> Vec<String> {
        self.dispatcher.registry().ids().map(str::to_string).collect()
    }

    // ────────────────────────────────────────────────────────────────
    // Execution
    // ────────────────────────────────────────────────────────────────

    pub async fn run(&self, request: &RunRequest) -> RunResult {
        self.dispatcher.run(request).await
    }

    /// `run`, then type the resulting command into the live terminal.
    /// A compile-only request is never forwarded.
    pub async fn run_and_forward(&self, request: &RunRequest) -> RunResult {
        let result = self.run(request).await;
        if !request.options.run_in_terminal {
            return result;
        }

        let compile_only = request
            .options
            .action
            .as_deref()
            .and_then(|a| a.parse::<Action>().ok())
            == Some(Action::Compile);
        let forward = match &result {
            RunResult::TerminalCommand { command } => Some(command),
            RunResult::CompiledHandoff { run_command, .. } if !compile_only => Some(run_command),
            _ => None,
        };

        if let Some(command) = forward {
            if !self.terminal.inject_command(command).await {
                tracing::info!(%command, "no live terminal; command left to the caller");
            }
        }
        result
    }

    /// Run a built executable: through the terminal when one is live, else
    /// spawned directly with output on the same event channel.
    pub async fn launch_executable(&self, path: &Path) -> Result<Launched, CoreError> {
        if path.as_os_str().is_empty() {
            return Err(CoreError::InvalidPath("no executable given".to_string()));
        }
        let exe = self.files.within_scratch(path)?;

        let command = self.config.dialect.invoke::<&str>(&exe, &[]);
        if self.terminal.inject_command(&command).await {
            return Ok(Launched::Injected);
        }

        let session = spawn_streaming(&exe, self.files.scratch_dir(), self.terminal.events())?;
        Ok(Launched::Spawned { session })
    }

    // ────────────────────────────────────────────────────────────────
    // Terminal
    // ────────────────────────────────────────────────────────────────

    pub async fn terminal_start(&self) -> Result<SessionInfo, CoreError> {
        self.terminal.start().await
    }

    pub async fn terminal_write(&self, data: &str) {
        self.terminal.write(data.as_bytes()).await;
    }

    pub async fn terminal_stop(&self) -> bool {
        self.terminal.stop().await
    }

    pub async fn terminal_resize(&self, cols: u16, rows: u16) -> Result<(), CoreError> {
        self.terminal.resize(cols, rows).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TerminalEvent> {
        self.terminal.subscribe()
    }

    pub fn terminal_export_transcript(&self) -> String {
        self.terminal.export_transcript()
    }

    pub async fn terminal_save(&self, name: &str) -> Result<PathBuf, CoreError> {
        let transcript = self.terminal.export_transcript();
        self.files
            .save_file_or(name, "terminal.txt", transcript.as_bytes())
            .await
    }

    pub async fn terminal_save_silent(&self, name: &str) -> Result<PathBuf, CoreError> {
        let name = sanitize_basename(name, "terminal.txt");
        let transcript = self.terminal.export_transcript();
        self.files
            .save_file_silent(&name, transcript.as_bytes())
            .await
    }

    // ────────────────────────────────────────────────────────────────
    // Files
    // ────────────────────────────────────────────────────────────────

    pub async fn save_file(&self, name: &str, content: &str) -> Result<PathBuf, CoreError> {
        self.files.save_file(name, content.as_bytes()).await
    }

    pub async fn save_file_silent(&self, name: &str, content: &str) -> Result<PathBuf, CoreError> {
        self.files.save_file_silent(name, content.as_bytes()).await
    }

    pub async fn open_file(&self, path: &Path) -> Result<OpenedFile, CoreError> {
        self.files.open_file(path).await
    }

    /// Tear down the terminal before the host exits.
    pub async fn shutdown(&self) {
        self.terminal.stop().await;
    }
}
