//! Command builder: descriptor + source path + action → shell command(s).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::languages::LanguageDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Run,
    Compile,
    CompileRun,
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "run" => Ok(Action::Run),
            "compile" => Ok(Action::Compile),
            "compile-run" | "compile_run" | "compilerun" => Ok(Action::CompileRun),
            _ => Err(CoreError::InvalidAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Run => "run",
            Action::Compile => "compile",
            Action::CompileRun => "compile-run",
        };
        f.write_str(name)
    }
}

/// What to execute, in order. Compile and run are never glued into one
/// shell line so a compiler failure can't be mistaken for a runtime one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPlan {
    Run {
        command: String,
    },
    Compile {
        compile: String,
        executable: PathBuf,
        /// Starts the executable; handed back, never executed here.
        run: String,
    },
    CompileThenRun {
        compile: String,
        executable: PathBuf,
        run: String,
    },
    /// Run an executable a previous compile produced.
    RunExisting {
        executable: PathBuf,
        run: String,
    },
}

impl CommandPlan {
    pub fn compile_step(&self) -> Option<&str> {
        match self {
            CommandPlan::Compile { compile, .. } | CommandPlan::CompileThenRun { compile, .. } => {
                Some(compile)
            }
            _ => None,
        }
    }

    /// The command that runs the program, whether or not the caller is
    /// expected to execute it.
    pub fn run_step(&self) -> &str {
        match self {
            CommandPlan::Run { command } => command,
            CommandPlan::Compile { run, .. }
            | CommandPlan::CompileThenRun { run, .. }
            | CommandPlan::RunExisting { run, .. } => run,
        }
    }

    pub fn executable(&self) -> Option<&Path> {
        match self {
            CommandPlan::Run { .. } => None,
            CommandPlan::Compile { executable, .. }
            | CommandPlan::CompileThenRun { executable, .. }
            | CommandPlan::RunExisting { executable, .. } => Some(executable),
        }
    }
}

pub fn build_plan(descriptor: &LanguageDescriptor, source: &Path, action: Action) -> CommandPlan {
    let (Some(compile), Some(executable), Some(run)) = (
        descriptor.build_compile_command(source),
        descriptor.executable_path(source),
        descriptor.build_post_compile_run_command(source),
    ) else {
        // Interpreted: every action degrades to a plain run
        return CommandPlan::Run {
            command: descriptor.build_run_command(source),
        };
    };

    let plan = match action {
        Action::Compile => CommandPlan::Compile {
            compile,
            executable,
            run,
        },
        Action::CompileRun => CommandPlan::CompileThenRun {
            compile,
            executable,
            run,
        },
        Action::Run => CommandPlan::RunExisting { executable, run },
    };
    tracing::debug!(language = %descriptor.id, %action, ?plan, "built command plan");
    plan
}
