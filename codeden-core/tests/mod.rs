use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codeden_core::command::{build_plan, Action, CommandPlan};
use codeden_core::dispatcher::ExecutionDispatcher;
use codeden_core::files::{sanitize_basename, FileStore};
use codeden_core::languages::{LanguageDescriptor, LanguageEntry, LanguageRegistry, Toolchain};
use codeden_core::process::{CommandRunner, ProcessError, ProcessOutput};
use codeden_core::shell::ShellDialect;
use codeden_core::terminal::TranscriptBuffer;
use codeden_core::{CoreConfig, CoreError, RunRequest, RunResult};

// ============================================================================
// Helpers
// ============================================================================

/// Hands back canned replies in order and records every command it was given.
#[derive(Default)]
struct ScriptedRunner {
    replies: Mutex<VecDeque<Result<ProcessOutput, ProcessError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn replying(replies: Vec<Result<ProcessOutput, ProcessError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &str,
        _cwd: &Path,
        _timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(command.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(exited(0, "", "")))
    }
}

fn exited(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

fn registry() -> Arc<LanguageRegistry> {
    Arc::new(LanguageRegistry::with_defaults(ShellDialect::Posix))
}

fn dispatcher(dir: &Path, runner: Arc<ScriptedRunner>) -> ExecutionDispatcher {
    ExecutionDispatcher::new(registry(), FileStore::new(dir, dir), runner)
}

fn python(interpreter: &str) -> LanguageDescriptor {
    LanguageDescriptor::new(
        "python",
        "main.py",
        Toolchain::Interpreted {
            interpreter: interpreter.into(),
            args: Vec::new(),
        },
    )
    .with_dialect(ShellDialect::Posix)
}

fn c_language() -> LanguageDescriptor {
    LanguageDescriptor::new(
        "c",
        "main.c",
        Toolchain::Compiled {
            compiler: "gcc".into(),
            flags: vec!["-std=c11".to_string()],
            executable: "main".to_string(),
        },
    )
    .with_dialect(ShellDialect::Posix)
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

// ============================================================================
// Registry Tests
// ============================================================================

#[test]
fn test_registry_has_default_languages() {
    let registry = registry();
    let ids: Vec<&str> = registry.ids().collect();
    assert_eq!(ids, vec!["python", "javascript", "c", "cpp"]);
}

#[test]
fn test_every_run_command_references_scratch_file() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();
    for id in registry.ids() {
        let descriptor = registry.lookup(id).unwrap();
        let source = dir.path().join(&descriptor.source_filename);
        let run = descriptor.build_run_command(&source);
        assert!(!run.is_empty(), "{} has an empty run command", id);

        if descriptor.is_compiled() {
            let compile = descriptor.build_compile_command(&source).unwrap();
            assert!(compile.contains(&descriptor.source_filename));
            let exe = descriptor.executable_path(&source).unwrap();
            assert!(run.contains(&*exe.to_string_lossy()));
        } else {
            assert!(run.contains(&descriptor.source_filename));
        }
    }
}

#[test]
fn test_lookup_is_case_insensitive_with_aliases() {
    let registry = registry();
    assert_eq!(registry.lookup("PYTHON").unwrap().id, "python");
    assert_eq!(registry.lookup("py").unwrap().id, "python");
    assert_eq!(registry.lookup("js").unwrap().id, "javascript");
    assert_eq!(registry.lookup("c++").unwrap().id, "cpp");
}

#[test]
fn test_lookup_unknown_is_none() {
    assert!(registry().lookup("cobol").is_none());
    assert!(registry().lookup("").is_none());
}

#[test]
fn test_configured_entry_replaces_default() {
    let entry = LanguageEntry {
        id: "python".to_string(),
        source_filename: "script.py".to_string(),
        aliases: vec![],
        toolchain: Toolchain::Interpreted {
            interpreter: "/opt/py/bin/python".into(),
            args: vec!["-u".to_string()],
        },
    };
    let registry = LanguageRegistry::with_overrides(ShellDialect::Posix, &[entry]);
    assert_eq!(registry.len(), 4);

    let descriptor = registry.lookup("python").unwrap();
    let run = descriptor.build_run_command(Path::new("/s/script.py"));
    assert_eq!(run, "'/opt/py/bin/python' '-u' '/s/script.py'");
}

#[test]
fn test_configured_entry_adds_language() {
    let entry = LanguageEntry {
        id: "ruby".to_string(),
        source_filename: "main.rb".to_string(),
        aliases: vec!["rb".to_string()],
        toolchain: Toolchain::Interpreted {
            interpreter: "ruby".into(),
            args: vec![],
        },
    };
    let registry = LanguageRegistry::with_overrides(ShellDialect::Posix, &[entry]);
    assert_eq!(registry.len(), 5);
    assert_eq!(registry.lookup("rb").unwrap().source_filename, "main.rb");
}

#[test]
fn test_executable_never_leaves_source_dir() {
    let descriptor = LanguageDescriptor::new(
        "c",
        "main.c",
        Toolchain::Compiled {
            compiler: "gcc".into(),
            flags: vec![],
            executable: "../../escape".to_string(),
        },
    );
    let source = Path::new("/scratch/main.c");
    let exe = descriptor.executable_path(source).unwrap();
    assert_eq!(exe.parent().unwrap(), Path::new("/scratch"));
    assert!(exe
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("escape"));
}

#[test]
fn test_interpreted_has_no_compile_step() {
    let descriptor = python("python3");
    let source = Path::new("/s/main.py");
    assert!(descriptor.build_compile_command(source).is_none());
    assert!(descriptor.build_post_compile_run_command(source).is_none());
    assert!(descriptor.executable_path(source).is_none());
}

// ============================================================================
// Command Builder Tests
// ============================================================================

#[test]
fn test_action_parse() {
    assert_eq!("run".parse::<Action>().unwrap(), Action::Run);
    assert_eq!("Compile".parse::<Action>().unwrap(), Action::Compile);
    assert_eq!("compile-run".parse::<Action>().unwrap(), Action::CompileRun);
    assert_eq!("compile_run".parse::<Action>().unwrap(), Action::CompileRun);
    assert!(matches!(
        "debug".parse::<Action>(),
        Err(CoreError::InvalidAction(_))
    ));
}

#[test]
fn test_interpreted_actions_degrade_to_run() {
    let descriptor = python("python3");
    let source = Path::new("/s/main.py");
    for action in [Action::Run, Action::Compile, Action::CompileRun] {
        let plan = build_plan(&descriptor, source, action);
        assert_eq!(
            plan,
            CommandPlan::Run {
                command: "'python3' '/s/main.py'".to_string()
            }
        );
    }
}

#[test]
fn test_compile_action_builds_compile_only() {
    let plan = build_plan(&c_language(), Path::new("/s/main.c"), Action::Compile);
    assert!(matches!(plan, CommandPlan::Compile { .. }));
    let expected_exe = format!("/s/main{}", std::env::consts::EXE_SUFFIX);
    assert_eq!(
        plan.compile_step().unwrap(),
        format!("'gcc' '-std=c11' '-o' '{}' '/s/main.c'", expected_exe)
    );
    assert_eq!(plan.executable().unwrap(), Path::new(&expected_exe));
}

#[test]
fn test_compile_run_keeps_steps_separate() {
    let plan = build_plan(&c_language(), Path::new("/s/main.c"), Action::CompileRun);
    let compile = plan.compile_step().unwrap();
    let run = plan.run_step();
    assert!(matches!(plan, CommandPlan::CompileThenRun { .. }));
    assert!(!compile.contains("&&") && !compile.contains(';'));
    assert!(!run.contains("gcc"));
    assert!(!run.contains("main.c"));
}

#[test]
fn test_run_action_on_compiled_skips_compile() {
    let plan = build_plan(&c_language(), Path::new("/s/main.c"), Action::Run);
    assert!(matches!(plan, CommandPlan::RunExisting { .. }));
    assert!(plan.compile_step().is_none());
}

#[test]
fn test_paths_with_spaces_are_quoted() {
    let plan = build_plan(&python("python3"), Path::new("/my dir/main.py"), Action::Run);
    assert_eq!(plan.run_step(), "'python3' '/my dir/main.py'");
}

#[test]
fn test_paths_with_quotes_are_escaped() {
    let run = python("python3").build_run_command(Path::new("/it's/main.py"));
    assert_eq!(run, r#"'python3' '/it'\''s/main.py'"#);
}

#[test]
fn test_powershell_commands_use_call_operator() {
    let descriptor = python("py.exe").with_dialect(ShellDialect::PowerShell);
    let run = descriptor.build_run_command(Path::new("C:\\temp\\main.py"));
    assert_eq!(run, "& 'py.exe' 'C:\\temp\\main.py'");
}

// ============================================================================
// Transcript Tests
// ============================================================================

#[test]
fn test_transcript_stays_under_cap() {
    let mut transcript = TranscriptBuffer::new(10);
    for _ in 0..50 {
        transcript.append(b"0123");
        assert!(transcript.len() <= 10);
    }
}

#[test]
fn test_transcript_keeps_most_recent_bytes() {
    let mut transcript = TranscriptBuffer::new(6);
    transcript.append(b"abcd");
    transcript.append(b"efgh");
    assert_eq!(transcript.export(), "cdefgh");
}

#[test]
fn test_transcript_oversized_chunk_keeps_tail() {
    let mut transcript = TranscriptBuffer::new(4);
    transcript.append(b"xy");
    transcript.append(b"0123456789");
    assert_eq!(transcript.export(), "6789");
}

#[test]
fn test_transcript_eviction_skips_partial_utf8() {
    let mut transcript = TranscriptBuffer::new(3);
    transcript.append("é".as_bytes());
    transcript.append(b"ab");
    assert_eq!(transcript.export(), "ab");
}

#[test]
fn test_transcript_under_cap_is_untouched() {
    let mut transcript = TranscriptBuffer::new(100);
    transcript.append(b"hello ");
    transcript.append(b"world");
    assert_eq!(transcript.export(), "hello world");
    transcript.clear();
    assert!(transcript.is_empty());
}

#[test]
fn test_transcript_zero_cap_holds_nothing() {
    let mut transcript = TranscriptBuffer::new(0);
    transcript.append(b"data");
    assert!(transcript.is_empty());
}

// ============================================================================
// Dispatcher Tests: request validation
// ============================================================================

#[tokio::test]
async fn test_unknown_language_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let result = dispatcher.run(&RunRequest::new("cobol", "DISPLAY 'HI'")).await;
    assert_eq!(
        result,
        RunResult::failure("Language not supported: cobol")
    );
    assert!(runner.calls().is_empty());
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_invalid_action_fails_before_persisting() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let request = RunRequest::new("c", "int main(){}").in_terminal(Some("debug"));
    let result = dispatcher.run(&request).await;
    assert!(result.is_failure());
    assert!(runner.calls().is_empty());
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_persistence_failure_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    let runner = ScriptedRunner::replying(vec![]);
    let dispatcher = dispatcher(&blocker, runner.clone());

    let result = dispatcher.run(&RunRequest::new("python", "print(1)")).await;
    match result {
        RunResult::Failure { message } => assert!(message.contains("Failed to write")),
        other => panic!("Expected Failure, got {:?}", other),
    }
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_scratch_file_is_overwritten_each_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![]);
    let dispatcher = dispatcher(dir.path(), runner);

    dispatcher.run(&RunRequest::new("python", "print('first')")).await;
    dispatcher.run(&RunRequest::new("python", "print('second')")).await;

    let on_disk = std::fs::read_to_string(dir.path().join("main.py")).unwrap();
    assert_eq!(on_disk, "print('second')");
    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
}

// ============================================================================
// Dispatcher Tests: capture mode
// ============================================================================

#[tokio::test]
async fn test_capture_interpreted_returns_plain_output() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Ok(exited(0, "hi\n", ""))]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let result = dispatcher.run(&RunRequest::new("python", "print('hi')")).await;
    assert_eq!(
        result,
        RunResult::PlainOutput {
            text: "hi\n".to_string()
        }
    );
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("main.py"));
}

#[tokio::test]
async fn test_capture_combines_stdout_and_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Ok(exited(0, "out\n", "warn\n"))]);
    let dispatcher = dispatcher(dir.path(), runner);

    let result = dispatcher.run(&RunRequest::new("python", "...")).await;
    assert_eq!(
        result,
        RunResult::PlainOutput {
            text: "out\nwarn\n".to_string()
        }
    );
}

#[tokio::test]
async fn test_capture_runtime_error_reads_like_output() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Ok(exited(
        1,
        "",
        "Traceback (most recent call last):\nNameError: x\n",
    ))]);
    let dispatcher = dispatcher(dir.path(), runner);

    let result = dispatcher.run(&RunRequest::new("python", "x")).await;
    match result {
        RunResult::PlainOutput { text } => assert!(text.contains("NameError")),
        other => panic!("Expected PlainOutput, got {:?}", other),
    }
}

#[tokio::test]
async fn test_capture_silent_success_is_done() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Ok(exited(0, "", ""))]);
    let dispatcher = dispatcher(dir.path(), runner);

    let result = dispatcher.run(&RunRequest::new("python", "pass")).await;
    assert_eq!(
        result,
        RunResult::PlainOutput {
            text: "✓ Done".to_string()
        }
    );
}

#[tokio::test]
async fn test_capture_timeout_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Err(ProcessError::TimedOut {
        command: "python main.py".to_string(),
        timeout_ms: 10_000,
    })]);
    let dispatcher = dispatcher(dir.path(), runner);

    let result = dispatcher.run(&RunRequest::new("python", "while True: pass")).await;
    assert_eq!(result, RunResult::failure("Timed out after 10000 ms"));
}

#[tokio::test]
async fn test_capture_compiled_returns_handoff() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Ok(exited(0, "", ""))]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let result = dispatcher.run(&RunRequest::new("c", "int main(){return 0;}")).await;
    match result {
        RunResult::CompiledHandoff {
            executable_path,
            run_command,
            transcript,
        } => {
            let expected = dir
                .path()
                .join(format!("main{}", std::env::consts::EXE_SUFFIX));
            assert_eq!(executable_path, expected.to_string_lossy());
            assert!(run_command.contains(&executable_path));
            assert_eq!(transcript, "✓ Compiled");
        }
        other => panic!("Expected CompiledHandoff, got {:?}", other),
    }
    // Compile only; nothing ran the program
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_capture_compile_failure_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Ok(exited(
        1,
        "",
        "main.c:1:20: error: expected ';' before '}' token\n",
    ))]);
    let dispatcher = dispatcher(dir.path(), runner);

    let result = dispatcher.run(&RunRequest::new("c", "int main(){return 0}")).await;
    match result {
        RunResult::Failure { message } => assert!(message.contains("expected ';'")),
        other => panic!("Expected Failure, got {:?}", other),
    }
}

// ============================================================================
// Dispatcher Tests: terminal mode
// ============================================================================

#[tokio::test]
async fn test_terminal_interpreted_returns_command_without_running() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let request = RunRequest::new("python", "print('hi')").in_terminal(None);
    match dispatcher.run(&request).await {
        RunResult::TerminalCommand { command } => assert!(command.contains("main.py")),
        other => panic!("Expected TerminalCommand, got {:?}", other),
    }
    assert!(runner.calls().is_empty());
    assert!(dir.path().join("main.py").exists());
}

#[tokio::test]
async fn test_terminal_interpreted_ignores_compile_action() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let request = RunRequest::new("javascript", "console.log(1)").in_terminal(Some("compile"));
    let result = dispatcher.run(&request).await;
    assert!(matches!(result, RunResult::TerminalCommand { .. }));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_terminal_compile_failure_never_produces_run_command() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Ok(exited(
        1,
        "",
        "main.c: error: expected ';'\n",
    ))]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let request = RunRequest::new("c", "int main(){return 0}").in_terminal(Some("compile-run"));
    let result = dispatcher.run(&request).await;
    assert!(result.terminal_command().is_none());
    match result {
        RunResult::Failure { message } => assert!(message.contains("error")),
        other => panic!("Expected Failure, got {:?}", other),
    }
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_terminal_compile_run_hands_off_run_command() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Ok(exited(0, "", "warning: unused\n"))]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let request = RunRequest::new("c", "int main(){return 0;}").in_terminal(Some("compile-run"));
    let result = dispatcher.run(&request).await;

    let descriptor = registry().lookup("c").unwrap().clone();
    let source = dir.path().join("main.c");
    let expected_run = descriptor.build_post_compile_run_command(&source).unwrap();
    match result {
        RunResult::CompiledHandoff {
            run_command,
            transcript,
            ..
        } => {
            assert_eq!(run_command, expected_run);
            assert_eq!(transcript, "warning: unused\n");
        }
        other => panic!("Expected CompiledHandoff, got {:?}", other),
    }
    // Only the compile ran; the run command is the caller's to forward
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("main.c"));
}

#[tokio::test]
async fn test_terminal_default_action_is_compile_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Ok(exited(0, "", ""))]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let request = RunRequest::new("cpp", "int main(){}").in_terminal(None);
    let result = dispatcher.run(&request).await;
    assert!(matches!(result, RunResult::CompiledHandoff { .. }));
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_terminal_run_action_skips_compile() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![]);
    let dispatcher = dispatcher(dir.path(), runner.clone());

    let request = RunRequest::new("c", "int main(){}").in_terminal(Some("run"));
    match dispatcher.run(&request).await {
        RunResult::CompiledHandoff { run_command, .. } => assert!(!run_command.is_empty()),
        other => panic!("Expected CompiledHandoff, got {:?}", other),
    }
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_terminal_compile_timeout_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::replying(vec![Err(ProcessError::TimedOut {
        command: "gcc".to_string(),
        timeout_ms: 60_000,
    })]);
    let dispatcher = dispatcher(dir.path(), runner);

    let request = RunRequest::new("c", "int main(){}").in_terminal(Some("compile"));
    assert_eq!(
        dispatcher.run(&request).await,
        RunResult::failure("Timed out after 60000 ms")
    );
}

// ============================================================================
// RunResult / RunRequest Tests
// ============================================================================

#[test]
fn test_run_result_serializes_with_kind_tag() {
    let json = serde_json::to_value(RunResult::TerminalCommand {
        command: "'python3' 'main.py'".to_string(),
    })
    .unwrap();
    assert_eq!(json["kind"], "terminal_command");
    assert_eq!(json["command"], "'python3' 'main.py'");
}

#[test]
fn test_run_request_accepts_wire_aliases() {
    let request: RunRequest = serde_json::from_str(
        r#"{"lang": "c", "code": "int main(){}", "options": {"runInTerminal": true, "action": "compile"}}"#,
    )
    .unwrap();
    assert_eq!(request.language, "c");
    assert!(request.options.run_in_terminal);
    assert_eq!(request.options.action.as_deref(), Some("compile"));
}

#[test]
fn test_run_request_options_default_to_capture() {
    let request: RunRequest =
        serde_json::from_str(r#"{"language": "python", "source_text": "1"}"#).unwrap();
    assert!(!request.options.run_in_terminal);
    assert!(request.options.action.is_none());
}

// ============================================================================
// File Store Tests
// ============================================================================

#[test]
fn test_sanitize_basename() {
    assert_eq!(sanitize_basename("notes.txt", "untitled.txt"), "notes.txt");
    assert_eq!(sanitize_basename("../../etc/passwd", "untitled.txt"), "passwd");
    assert_eq!(sanitize_basename("..\\..\\evil.bat", "untitled.txt"), "evil.bat");
    assert_eq!(sanitize_basename("", "untitled.txt"), "untitled.txt");
    assert_eq!(sanitize_basename("dir/..", "terminal.txt"), "terminal.txt");
}

#[tokio::test]
async fn test_save_file_silent_stays_in_scratch() {
    let scratch = tempfile::tempdir().unwrap();
    let docs = tempfile::tempdir().unwrap();
    let store = FileStore::new(scratch.path(), docs.path());

    let dest = store
        .save_file_silent("../../outside.txt", b"content")
        .await
        .unwrap();
    assert_eq!(dest, scratch.path().join("outside.txt"));
    assert_eq!(std::fs::read_to_string(dest).unwrap(), "content");
}

#[tokio::test]
async fn test_save_file_relative_goes_to_documents() {
    let scratch = tempfile::tempdir().unwrap();
    let docs = tempfile::tempdir().unwrap();
    let store = FileStore::new(scratch.path(), docs.path());

    let dest = store.save_file("notes/today.txt", b"x").await.unwrap();
    assert_eq!(dest, docs.path().join("notes/today.txt"));
    assert!(dest.exists());

    let blank = store.save_file("", b"y").await.unwrap();
    assert_eq!(blank, docs.path().join("untitled.txt"));
}

#[tokio::test]
async fn test_save_file_rejects_parent_components() {
    let scratch = tempfile::tempdir().unwrap();
    let store = FileStore::new(scratch.path(), scratch.path());
    let result = store.save_file("../escape.txt", b"x").await;
    assert!(matches!(result, Err(CoreError::InvalidPath(_))));
}

#[tokio::test]
async fn test_open_file_reads_content() {
    let scratch = tempfile::tempdir().unwrap();
    let store = FileStore::new(scratch.path(), scratch.path());
    let path = store.save_file_silent("main.py", b"print(1)").await.unwrap();

    let opened = store.open_file(&path).await.unwrap();
    assert_eq!(opened.path, path);
    assert_eq!(opened.content, "print(1)");
}

#[tokio::test]
async fn test_open_missing_file_is_error() {
    let scratch = tempfile::tempdir().unwrap();
    let store = FileStore::new(scratch.path(), scratch.path());
    let result = store.open_file(&scratch.path().join("nope.txt")).await;
    assert!(matches!(result, Err(CoreError::Persistence { .. })));
}

#[test]
fn test_within_scratch_rejects_outside_paths() {
    let scratch = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    let outside = other.path().join("prog");
    std::fs::write(&outside, "x").unwrap();
    let inside = scratch.path().join("prog");
    std::fs::write(&inside, "x").unwrap();

    let store = FileStore::new(scratch.path(), scratch.path());
    assert!(store.within_scratch(&outside).is_err());
    assert!(store.within_scratch(&inside).is_ok());
    assert!(store.within_scratch(&scratch.path().join("missing")).is_err());
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_defaults() {
    let config = CoreConfig::default();
    assert_eq!(config.interpreted_timeout(), Duration::from_secs(10));
    assert_eq!(config.compile_timeout(), Duration::from_secs(60));
    assert_eq!(config.transcript_cap_bytes, 200_000);
    assert!(config.languages.is_empty());
}

#[test]
fn test_config_partial_json_keeps_defaults() {
    let config = CoreConfig::from_json(
        r#"{
            "transcript_cap_bytes": 1024,
            "dialect": "posix",
            "languages": [
                {"id": "ruby", "source_filename": "main.rb",
                 "toolchain": {"kind": "interpreted", "interpreter": "ruby"}}
            ]
        }"#,
    )
    .unwrap();
    assert_eq!(config.transcript_cap_bytes, 1024);
    assert_eq!(config.compile_timeout_ms, 60_000);
    assert_eq!(config.dialect, ShellDialect::Posix);
    assert_eq!(config.languages.len(), 1);

    let registry = LanguageRegistry::with_overrides(config.dialect, &config.languages);
    assert!(registry.lookup("ruby").is_some());
}

#[test]
fn test_config_bad_json_is_error() {
    let result = CoreConfig::from_json(r#"{"transcript_cap_bytes": "lots"}"#);
    assert!(matches!(result, Err(CoreError::Config(_))));
}

#[test]
fn test_config_from_missing_path_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = CoreConfig::from_path(&dir.path().join("config.json"));
    assert!(matches!(result, Err(CoreError::Config(_))));
}
