//! Execution dispatcher.
//!
//! One request walks `Received → SourcePersisted → {capture | terminal
//! handoff} → Completed`. Every failure along the way comes back as a
//! `RunResult::Failure`; the dispatcher keeps nothing between requests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{build_plan, Action, CommandPlan};
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::files::FileStore;
use crate::languages::{LanguageDescriptor, LanguageRegistry};
use crate::process::{CommandRunner, ProcessOutput};
use crate::{RunRequest, RunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub interpreted: Duration,
    pub compile: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            interpreted: Duration::from_secs(10),
            compile: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            interpreted: config.interpreted_timeout(),
            compile: config.compile_timeout(),
        }
    }
}

pub struct ExecutionDispatcher {
    registry: Arc<LanguageRegistry>,
    files: FileStore,
    runner: Arc<dyn CommandRunner>,
    timeouts: Timeouts,
}

impl std::fmt::Debug for ExecutionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionDispatcher")
            .field("languages", &self.registry.len())
            .field("scratch_dir", &self.files.scratch_dir())
            .field("runner", &"Arc<dyn CommandRunner>")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl ExecutionDispatcher {
    pub fn new(
        registry: Arc<LanguageRegistry>,
        files: FileStore,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            registry,
            files,
            runner,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub async fn run(&self, request: &RunRequest) -> RunResult {
        match self.dispatch(request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::info!(language = %request.language, error = %e, "run request failed");
                RunResult::failure(e.to_string())
            }
        }
    }

    async fn dispatch(&self, request: &RunRequest) -> Result<RunResult, CoreError> {
        // Received: nothing is written or spawned for a bad request
        let descriptor = self
            .registry
            .lookup(&request.language)
            .ok_or_else(|| CoreError::UnknownLanguage(request.language.clone()))?;
        let action = if request.options.run_in_terminal {
            request
                .options
                .action
                .as_deref()
                .map(str::parse::<Action>)
                .transpose()?
        } else {
            None
        };

        // SourcePersisted
        let source = self
            .files
            .persist_source(descriptor, &request.source_text)
            .await?;

        if request.options.run_in_terminal {
            self.terminal_handoff(descriptor, &source, action).await
        } else {
            self.capture(descriptor, &source).await
        }
    }

    async fn capture(
        &self,
        descriptor: &LanguageDescriptor,
        source: &Path,
    ) -> Result<RunResult, CoreError> {
        match build_plan(descriptor, source, Action::Compile) {
            CommandPlan::Run { command } => {
                let output = self
                    .runner
                    .run(&command, self.files.scratch_dir(), self.timeouts.interpreted)
                    .await?;
                // A non-zero exit reads the same as success here
                Ok(RunResult::PlainOutput {
                    text: capture_text(&output),
                })
            }
            plan => self.compile(&plan).await,
        }
    }

    async fn terminal_handoff(
        &self,
        descriptor: &LanguageDescriptor,
        source: &Path,
        action: Option<Action>,
    ) -> Result<RunResult, CoreError> {
        let action = action.unwrap_or(Action::CompileRun);
        match build_plan(descriptor, source, action) {
            CommandPlan::Run { command } => Ok(RunResult::TerminalCommand { command }),
            CommandPlan::RunExisting { executable, run } => Ok(RunResult::CompiledHandoff {
                executable_path: executable.to_string_lossy().into_owned(),
                run_command: run,
                transcript: String::new(),
            }),
            plan => self.compile(&plan).await,
        }
    }

    /// Run the plan's compile step. Only a clean exit yields a handoff.
    async fn compile(&self, plan: &CommandPlan) -> Result<RunResult, CoreError> {
        let (Some(compile), Some(executable)) = (plan.compile_step(), plan.executable()) else {
            return Err(CoreError::Build("No compile command available".to_string()));
        };

        let output = self
            .runner
            .run(compile, self.files.scratch_dir(), self.timeouts.compile)
            .await?;
        if !output.success() {
            return Err(CoreError::Build(build_diagnostic(&output)));
        }

        let transcript = output.combined();
        Ok(RunResult::CompiledHandoff {
            executable_path: executable.to_string_lossy().into_owned(),
            run_command: plan.run_step().to_string(),
            transcript: if transcript.trim().is_empty() {
                "✓ Compiled".to_string()
            } else {
                transcript
            },
        })
    }
}

fn capture_text(output: &ProcessOutput) -> String {
    let text = output.combined();
    if !text.trim().is_empty() {
        return text;
    }
    match output.exit_code {
        Some(0) => "✓ Done".to_string(),
        Some(code) => format!("Process exited with code {}", code),
        None => "Process terminated by signal".to_string(),
    }
}

fn build_diagnostic(output: &ProcessOutput) -> String {
    let text = output.combined();
    if !text.trim().is_empty() {
        return text;
    }
    match output.exit_code {
        Some(code) => format!("Compilation failed (exit code {})", code),
        None => "Compilation failed (terminated by signal)".to_string(),
    }
}
