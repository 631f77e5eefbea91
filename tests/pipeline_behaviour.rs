#![cfg(unix)]

use std::error::Error;
use std::time::{Duration, Instant};

use procflow::errors::ProcflowError;
use procflow::pipeline::Pipeline;
use procflow::types::StreamKind;
use procflow_test_utils::recorder::LineRecorder;
use procflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn stdout_feeds_next_stage() -> TestResult {
    init_tracing();

    let result = with_timeout(Pipeline::new().quiet().run(|pipe| {
        pipe.command("printf", ["hello"]);
        pipe.command("tr", ["a-z", "A-Z"]);
    }))
    .await?;

    assert_eq!(result.output(), "HELLO");
    assert!(result.successful());
    assert_eq!(result.command(), "printf hello | tr a-z A-Z");
    Ok(())
}

#[tokio::test]
async fn three_stages_chain() -> TestResult {
    init_tracing();

    let result = with_timeout(Pipeline::new().quiet().run(|pipe| {
        pipe.shell("printf 'b\\na\\nc\\n'");
        pipe.command("sort", Vec::<String>::new());
        pipe.command("head", ["-n", "2"]);
    }))
    .await?;

    assert_eq!(result.output(), "a\nb\n");
    Ok(())
}

#[tokio::test]
async fn empty_pipeline_is_rejected() -> TestResult {
    init_tracing();

    let err = Pipeline::new().start(|_| {}).unwrap_err();
    assert!(matches!(err, ProcflowError::EmptyPipeline));
    assert_eq!(err.to_string(), "pipeline must have at least one command");
    Ok(())
}

#[tokio::test]
async fn pipeline_input_goes_to_first_stage() -> TestResult {
    init_tracing();

    let result = with_timeout(Pipeline::new().input("abc").quiet().run(|pipe| {
        pipe.command("cat", Vec::<String>::new());
        pipe.command("tr", ["a-z", "A-Z"]);
    }))
    .await?;

    assert_eq!(result.output(), "ABC");
    Ok(())
}

#[tokio::test]
async fn explicit_stage_input_breaks_the_pipe() -> TestResult {
    init_tracing();

    let running = Pipeline::new().quiet().start(|pipe| {
        pipe.command("echo", ["upstream"]).key("first");
        pipe.command("cat", Vec::<String>::new())
            .key("second")
            .input("override");
    })?;
    let result = with_timeout(running.wait()).await;

    assert_eq!(result.output(), "override");
    // The first stage still ran and was captured.
    assert_eq!(running.stages()[0].output(), "upstream\n");
    assert_eq!(running.stages()[0].key(), "first");
    Ok(())
}

#[tokio::test]
async fn result_reflects_last_stage_exit_code() -> TestResult {
    init_tracing();

    let result = with_timeout(Pipeline::new().quiet().run(|pipe| {
        pipe.shell("echo data; exit 5");
        pipe.shell("cat >/dev/null; echo done; exit 4");
    }))
    .await?;

    assert_eq!(result.exit_code(), 4);
    assert_eq!(result.output(), "done\n");
    Ok(())
}

#[tokio::test]
async fn launch_failure_aborts_started_stages() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("first-stage-survived");

    let err = Pipeline::new()
        .quiet()
        .start(|pipe| {
            pipe.shell(format!("sleep 1; touch '{}'", marker.display()));
            pipe.command("procflow-definitely-not-a-binary", Vec::<String>::new());
        })
        .unwrap_err();

    assert!(matches!(err, ProcflowError::Spawn { .. }), "got {err:?}");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!marker.exists(), "first stage kept running after start failed");
    Ok(())
}

#[tokio::test]
async fn early_exit_downstream_stops_upstream() -> TestResult {
    init_tracing();

    let result = with_timeout(Pipeline::new().quiet().run(|pipe| {
        pipe.command("yes", Vec::<String>::new());
        pipe.command("head", ["-n1"]);
    }))
    .await?;

    assert_eq!(result.output(), "y\n");
    assert_eq!(result.exit_code(), 0);
    assert!(!result.timed_out());
    Ok(())
}

#[tokio::test]
async fn shared_deadline_kills_every_stage() -> TestResult {
    init_tracing();

    let started = Instant::now();
    let running = Pipeline::new()
        .timeout(Duration::from_millis(200))
        .quiet()
        .start(|pipe| {
            pipe.command("sleep", ["5"]);
            pipe.command("cat", Vec::<String>::new());
        })?;
    let result = with_timeout(running.wait()).await;

    assert!(result.timed_out());
    assert!(result.failed());
    assert!(!running.is_running());
    assert!(running.stages().iter().all(|s| s.try_result().is_some()));
    assert!(started.elapsed() < Duration::from_secs(3));
    Ok(())
}

#[tokio::test]
async fn handles_report_pids_and_memoize_wait() -> TestResult {
    init_tracing();

    let running = Pipeline::new().quiet().start(|pipe| {
        pipe.command("echo", ["x"]).key("src");
        pipe.command("cat", Vec::<String>::new()).key("sink");
    })?;

    let pids = running.pids();
    assert_eq!(pids.len(), 2);
    assert!(pids["src"] > 0);
    assert!(pids["sink"] > 0);

    let first = with_timeout(running.wait()).await;
    let second = with_timeout(running.wait()).await;
    assert_eq!(first, second);
    assert!(running.is_done());
    Ok(())
}

#[tokio::test]
async fn handlers_see_every_stage_by_key() -> TestResult {
    init_tracing();

    let shared = LineRecorder::new();
    let own = LineRecorder::new();
    let result = with_timeout(
        Pipeline::new()
            .on_output(shared.handler())
            .quiet()
            .run(|pipe| {
                pipe.command("printf", ["one\\ntwo\\n"]).key("src");
                pipe.command("tr", ["a-z", "A-Z"])
                    .key("upper")
                    .on_output(own.handler());
            }),
    )
    .await?;

    assert_eq!(result.output(), "ONE\nTWO\n");
    assert_eq!(shared.text_for("src", StreamKind::Stdout), vec!["one", "two"]);
    assert_eq!(shared.text_for("upper", StreamKind::Stdout), vec!["ONE", "TWO"]);
    assert_eq!(own.keys(), vec!["upper".to_string()]);
    Ok(())
}

#[tokio::test]
async fn stop_reaches_all_stages() -> TestResult {
    init_tracing();

    let running = Pipeline::new().quiet().start(|pipe| {
        pipe.command("sleep", ["30"]);
        pipe.command("sleep", ["30"]);
    })?;
    assert!(running.is_running());

    with_timeout(running.stop(Duration::from_secs(2))).await?;
    let result = with_timeout(running.wait()).await;

    assert!(result.failed());
    assert!(!result.timed_out());
    assert!(!running.is_running());
    Ok(())
}
