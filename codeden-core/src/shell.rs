//! Shell conventions for the two shells we drive.
//!
//! Every command string the core builds goes through one of these dialects:
//! POSIX `sh` on Unix, PowerShell on Windows.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellDialect {
    Posix,
    #[serde(alias = "pwsh")]
    PowerShell,
}

impl Default for ShellDialect {
    fn default() -> Self {
        Self::native()
    }
}

impl ShellDialect {
    pub fn native() -> Self {
        if cfg!(windows) {
            ShellDialect::PowerShell
        } else {
            ShellDialect::Posix
        }
    }

    /// Quote one word so the shell passes it through verbatim.
    pub fn quote(&self, word: &str) -> String {
        match self {
            // POSIX shells: close, escaped quote, reopen
            ShellDialect::Posix => format!("'{}'", word.replace('\'', r#"'\''"#)),
            // PowerShell: single quotes escape by doubling
            ShellDialect::PowerShell => format!("'{}'", word.replace('\'', "''")),
        }
    }

    pub fn quote_path(&self, path: &Path) -> String {
        self.quote(&path.to_string_lossy())
    }

    /// A command line that runs `program` (already a path) with `args`.
    /// Each arg is quoted.
    pub fn invoke<S: AsRef<str>>(&self, program: &Path, args: &[S]) -> String {
        let mut line = match self {
            ShellDialect::Posix => self.quote_path(program),
            // PowerShell needs the call operator in front of a quoted path
            ShellDialect::PowerShell => format!("& {}", self.quote_path(program)),
        };
        for arg in args {
            line.push(' ');
            line.push_str(&self.quote(arg.as_ref()));
        }
        line
    }

    /// What "pressing Enter" looks like on this shell's PTY.
    /// ConPTY / PowerShell wants CRLF or you get typed-but-not-executed.
    pub fn line_terminator(&self) -> &'static str {
        match self {
            ShellDialect::Posix => "\n",
            ShellDialect::PowerShell => "\r\n",
        }
    }

    /// Program and arguments that run `command` once, non-interactively.
    pub fn one_shot(&self, command: &str) -> (String, Vec<String>) {
        match self {
            ShellDialect::Posix => ("sh".to_string(), vec!["-c".to_string(), command.to_string()]),
            ShellDialect::PowerShell => (
                "powershell.exe".to_string(),
                vec![
                    "-NoLogo".to_string(),
                    "-NoProfile".to_string(),
                    "-NonInteractive".to_string(),
                    "-Command".to_string(),
                    command.to_string(),
                ],
            ),
        }
    }

    /// Program and arguments for the interactive terminal shell.
    pub fn interactive(&self) -> (String, Vec<String>) {
        match self {
            ShellDialect::Posix => {
                let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
                (shell, Vec::new())
            }
            ShellDialect::PowerShell => (
                "powershell.exe".to_string(),
                vec!["-NoLogo".to_string(), "-NoExit".to_string()],
            ),
        }
    }
}
