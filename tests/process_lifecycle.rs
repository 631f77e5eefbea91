#![cfg(unix)]

use std::error::Error;
use std::io::Write;
use std::time::{Duration, Instant};

use procflow::errors::ProcflowError;
use procflow::process::{Input, Process, ProcessState, RunningProcess, EXIT_CODE_UNAVAILABLE};
use procflow::types::{Signal, StreamKind};
use procflow_test_utils::recorder::LineRecorder;
use procflow_test_utils::{init_tracing, with_timeout};
use regex::Regex;

type TestResult = Result<(), Box<dyn Error>>;

async fn wait_for_output(running: &RunningProcess, needle: &str) {
    with_timeout(async {
        while !running.output().contains(needle) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

#[tokio::test]
async fn echo_captures_stdout_and_succeeds() -> TestResult {
    init_tracing();

    let result = with_timeout(Process::new("echo").arg("hello").quiet().run()).await?;

    assert_eq!(result.output(), "hello\n");
    assert_eq!(result.exit_code(), 0);
    assert!(result.successful());
    assert!(!result.failed());
    assert!(!result.timed_out());
    assert_eq!(result.command(), "echo hello");
    assert!(result.seen_in_output("hell"));
    assert!(result.output_matches(&Regex::new(r"(?m)^hello$")?));
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_a_result_not_an_error() -> TestResult {
    init_tracing();

    let result = with_timeout(Process::shell("echo oops >&2; exit 7").quiet().run()).await?;

    assert_eq!(result.exit_code(), 7);
    assert!(result.failed());
    assert_eq!(result.error_output(), "oops\n");
    assert!(result.seen_in_error_output("oops"));
    Ok(())
}

#[tokio::test]
async fn missing_executable_fails_to_start() -> TestResult {
    init_tracing();

    let err = Process::new("procflow-definitely-not-a-binary")
        .quiet()
        .start()
        .unwrap_err();

    assert!(matches!(err, ProcflowError::Spawn { .. }), "got {err:?}");
    assert!(err.to_string().contains("procflow-definitely-not-a-binary"));
    Ok(())
}

#[tokio::test]
async fn timeout_kills_and_reports_failure() -> TestResult {
    init_tracing();

    let started = Instant::now();
    let result = with_timeout(
        Process::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(200))
            .quiet()
            .run(),
    )
    .await?;

    assert!(result.timed_out());
    assert!(result.failed());
    // SIGKILL, reported shell-style.
    assert_eq!(result.exit_code(), 128 + 9);
    assert!(started.elapsed() < Duration::from_secs(3));
    Ok(())
}

#[tokio::test]
async fn wait_is_idempotent() -> TestResult {
    init_tracing();

    let running = Process::shell("echo once; exit 2").quiet().start()?;
    let first = with_timeout(running.wait()).await;
    let second = with_timeout(running.wait()).await;
    let from_clone = with_timeout(running.clone().wait()).await;

    assert_eq!(first, second);
    assert_eq!(first, from_clone);
    assert_eq!(first.exit_code(), 2);
    assert_eq!(running.state(), ProcessState::Waited);
    assert_eq!(running.try_result(), Some(first));
    Ok(())
}

#[tokio::test]
async fn stdin_from_bytes_and_file() -> TestResult {
    init_tracing();

    let from_bytes = with_timeout(Process::new("cat").input("abc").quiet().run()).await?;
    assert_eq!(from_bytes.output(), "abc");

    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "from file")?;
    let from_file =
        with_timeout(Process::new("cat").input(Input::file(file.path())).quiet().run()).await?;
    assert_eq!(from_file.output(), "from file\n");

    let from_null = with_timeout(Process::new("cat").input(Input::Null).quiet().run()).await?;
    assert_eq!(from_null.output(), "");
    Ok(())
}

#[tokio::test]
async fn stdin_defaults_to_null_device() -> TestResult {
    init_tracing();

    let result = with_timeout(Process::new("cat").quiet().run()).await?;

    assert!(result.successful());
    assert_eq!(result.output(), "");
    Ok(())
}

#[tokio::test]
async fn missing_stdin_file_is_a_start_error() -> TestResult {
    init_tracing();

    let err = Process::new("cat")
        .input(Input::file("/nonexistent/procflow/stdin.txt"))
        .quiet()
        .start()
        .unwrap_err();

    assert!(matches!(err, ProcflowError::Spawn { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn env_overlay_and_working_directory() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let result = with_timeout(
        Process::shell("echo \"$PROCFLOW_TEST_VAR\"; pwd -P")
            .env("PROCFLOW_TEST_VAR", "overlay")
            .path(dir.path())
            .quiet()
            .run(),
    )
    .await?;

    let expected_dir = dir.path().canonicalize()?;
    let lines: Vec<&str> = result.output().lines().collect();
    assert_eq!(lines[0], "overlay");
    assert_eq!(lines[1], expected_dir.to_string_lossy());
    Ok(())
}

#[tokio::test]
async fn stop_terminates_gracefully() -> TestResult {
    init_tracing();

    let running = Process::new("sleep").arg("30").quiet().start()?;
    assert!(running.pid().is_some());
    assert!(running.is_running());

    with_timeout(running.stop(Duration::from_secs(2))).await?;
    let result = with_timeout(running.wait()).await;

    assert!(!running.is_running());
    assert_eq!(result.exit_code(), 128 + 15);
    assert!(!result.timed_out());
    Ok(())
}

#[tokio::test]
async fn stop_escalates_to_kill_when_signal_is_ignored() -> TestResult {
    init_tracing();

    let running = Process::shell("trap '' TERM; echo ready; exec sleep 30")
        .quiet()
        .start()?;
    wait_for_output(&running, "ready").await;

    let started = Instant::now();
    with_timeout(running.stop(Duration::from_millis(300))).await?;
    let result = with_timeout(running.wait()).await;

    assert_eq!(result.exit_code(), 128 + 9);
    assert!(started.elapsed() >= Duration::from_millis(250));
    Ok(())
}

#[tokio::test]
async fn signalling_after_exit() -> TestResult {
    init_tracing();

    let running = Process::new("true").quiet().start()?;
    with_timeout(running.wait()).await;

    let err = running.signal(Signal::Terminate).unwrap_err();
    assert!(matches!(err, ProcflowError::AlreadyExited { .. }), "got {err:?}");

    // Stop after exit is a no-op.
    running.stop(Duration::from_millis(100)).await?;
    assert!(!running.is_running());
    Ok(())
}

#[tokio::test]
async fn user_signal_reaches_the_process() -> TestResult {
    init_tracing();

    let running = Process::shell(
        "trap 'echo got-usr1; exit 0' USR1; echo ready; while :; do sleep 0.05; done",
    )
    .quiet()
    .start()?;
    wait_for_output(&running, "ready").await;

    running.signal(Signal::User1)?;
    let result = with_timeout(running.wait()).await;

    assert!(result.successful());
    assert!(result.seen_in_output("got-usr1"));
    Ok(())
}

#[tokio::test]
async fn output_handler_sees_every_line() -> TestResult {
    init_tracing();

    let recorder = LineRecorder::new();
    let result = with_timeout(
        Process::shell("printf 'a\\nb\\n\\nc'; printf 'e1\\n' >&2")
            .key("job")
            .on_output(recorder.handler())
            .quiet()
            .run(),
    )
    .await?;

    assert!(result.successful());
    assert_eq!(
        recorder.text_for("job", StreamKind::Stdout),
        vec!["a", "b", "", "c"]
    );
    assert_eq!(recorder.text_for("job", StreamKind::Stderr), vec!["e1"]);
    Ok(())
}

#[tokio::test]
async fn default_key_is_zero() -> TestResult {
    init_tracing();

    let recorder = LineRecorder::new();
    with_timeout(
        Process::new("echo")
            .arg("x")
            .on_output(recorder.handler())
            .quiet()
            .run(),
    )
    .await?;

    assert_eq!(recorder.keys(), vec!["0".to_string()]);
    Ok(())
}

#[tokio::test]
async fn panicking_handler_yields_failure_result() -> TestResult {
    init_tracing();

    let result = with_timeout(
        Process::new("echo")
            .arg("boom")
            .on_output(|_, _, _| panic!("handler exploded"))
            .quiet()
            .run(),
    )
    .await?;

    assert_eq!(result.exit_code(), EXIT_CODE_UNAVAILABLE);
    assert!(result.seen_in_error_output("output handler panicked"));
    assert!(result.seen_in_error_output("handler exploded"));
    Ok(())
}

#[tokio::test]
async fn disabled_buffering_keeps_only_the_tail() -> TestResult {
    init_tracing();

    let running = Process::shell("seq 1 2000")
        .disable_buffering()
        .quiet()
        .start()?;
    let result = with_timeout(running.wait()).await;

    assert!(result.successful());
    assert_eq!(result.output(), "");
    assert_eq!(running.output(), "");
    let tail = running.latest_output();
    assert!(tail.ends_with("2000\n"));
    assert!(tail.len() <= procflow::output::LATEST_OUTPUT_WINDOW);
    assert!(!tail.contains("\n1\n"));
    Ok(())
}
