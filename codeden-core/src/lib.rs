pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod files;
pub mod languages;
pub mod process;
pub mod shell;
pub mod terminal;
pub mod workbench;

// Re-export the facade so hosts can just use `codeden_core::Workbench`
pub use workbench::{Launched, Workbench};

pub use config::CoreConfig;
pub use error::CoreError;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the session (or standalone launch) that produced an event.
pub type SessionId = Uuid;

/// The event stream out of the core. Hosts subscribe to this to render
/// terminal output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    Output { session: SessionId, data: Vec<u8> }, // Raw bytes, arrival order
    Exited { session: SessionId, code: Option<i32> },
}

impl TerminalEvent {
    pub fn session(&self) -> SessionId {
        match self {
            TerminalEvent::Output { session, .. } | TerminalEvent::Exited { session, .. } => {
                *session
            }
        }
    }
}

/// A single user invocation of "run".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(alias = "lang")]
    pub language: String,
    #[serde(alias = "code", alias = "sourceText")]
    pub source_text: String,
    #[serde(default)]
    pub options: RunOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default, alias = "runInTerminal")]
    pub run_in_terminal: bool,
    /// Only meaningful in terminal mode for compiled languages.
    #[serde(default)]
    pub action: Option<String>,
}

impl RunRequest {
    pub fn new(language: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source_text: source_text.into(),
            options: RunOptions::default(),
        }
    }

    pub fn in_terminal(mut self, action: Option<&str>) -> Self {
        self.options.run_in_terminal = true;
        self.options.action = action.map(str::to_string);
        self
    }
}

/// The one answer a `RunRequest` gets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunResult {
    /// Combined output of a capture-mode run.
    PlainOutput { text: String },
    /// A compile step succeeded; `run_command` starts the produced program.
    CompiledHandoff {
        executable_path: String,
        run_command: String,
        transcript: String,
    },
    /// Ready-to-inject command for the terminal session.
    TerminalCommand { command: String },
    Failure { message: String },
}

impl RunResult {
    pub fn failure(message: impl Into<String>) -> Self {
        RunResult::Failure {
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunResult::Failure { .. })
    }

    /// The command a host should forward to the terminal, if any.
    pub fn terminal_command(&self) -> Option<&str> {
        match self {
            RunResult::TerminalCommand { command } => Some(command),
            RunResult::CompiledHandoff { run_command, .. } => Some(run_command),
            _ => None,
        }
    }
}
