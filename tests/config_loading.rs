use std::error::Error;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use procflow::config::{
    load_and_validate, load_from_str, parse_duration, CommandInput, ConfigFile, Outcome, Started,
};
use procflow::errors::ProcflowError;
use procflow::types::{ExecutionMode, Priority, StrategyKind};
use procflow_test_utils::builders::{CommandConfigBuilder, ConfigFileBuilder};
use procflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn demo(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 30s "), Ok(Duration::from_secs(30)));
    assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
    assert_eq!(parse_duration("2H"), Ok(Duration::from_secs(7200)));
    assert_eq!(parse_duration("0s"), Ok(Duration::ZERO));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("10d").is_err());
    assert!(parse_duration("s").is_err());
}

#[test]
fn demo_configs_load_and_validate() -> TestResult {
    let pool = load_and_validate(demo("pool.toml"))?;
    assert_eq!(pool.mode, ExecutionMode::Pool);
    assert_eq!(pool.concurrency, 2);
    assert_eq!(pool.timeout, Some(Duration::from_secs(30)));
    assert_eq!(pool.strategy, StrategyKind::Priority);
    assert_eq!(pool.keys().collect::<Vec<_>>(), vec!["greet", "env", "slow"]);

    let pipeline = load_and_validate(demo("pipeline.toml"))?;
    assert_eq!(pipeline.mode, ExecutionMode::Pipeline);
    assert_eq!(pipeline.commands.len(), 3);
    Ok(())
}

#[test]
fn defaults_are_resolved_into_commands() -> TestResult {
    let raw = load_from_str(
        r#"
        [config]
        quiet = true

        [default]
        path = "/tmp"
        timeout = "10s"
        disable_buffering = true
        env = { A = "default", B = "default" }

        [[command]]
        cmd = ["echo", "one"]

        [[command]]
        key = "custom"
        cmd = ["echo", "two"]
        priority = "critical"
        timeout = "1m"
        env = { B = "own" }
        quiet = false
        disable_buffering = false
        input = "stdin text"
        "#,
    )?;
    let cfg = ConfigFile::try_from(raw)?;

    let first = &cfg.commands[0];
    assert_eq!(first.key, "0");
    assert_eq!(first.program, "echo");
    assert_eq!(first.args, vec!["one"]);
    assert_eq!(first.priority, Priority::Normal);
    assert_eq!(first.timeout, Some(Duration::from_secs(10)));
    assert_eq!(first.path.as_deref(), Some(Path::new("/tmp")));
    assert!(first.quiet);
    assert!(first.disable_buffering);
    assert_eq!(first.input, None);

    let second = &cfg.commands[1];
    assert_eq!(second.key, "custom");
    assert_eq!(second.priority, Priority::Critical);
    assert_eq!(second.timeout, Some(Duration::from_secs(60)));
    assert_eq!(second.env["A"], "default");
    assert_eq!(second.env["B"], "own");
    assert!(!second.quiet);
    assert!(!second.disable_buffering);
    assert_eq!(second.input, Some(CommandInput::Literal("stdin text".into())));
    Ok(())
}

#[test]
fn invalid_configs_are_rejected() {
    let cases = [
        ("", "at least one [[command]]"),
        ("[[command]]\ncmd = []\n", "empty `cmd`"),
        ("[config]\ntimeout = \"soon\"\n[[command]]\ncmd = [\"true\"]\n", "[config].timeout"),
        (
            "[[command]]\ncmd = [\"cat\"]\ninput = \"x\"\ninput_file = \"y\"\n",
            "both `input` and `input_file`",
        ),
    ];

    for (toml, needle) in cases {
        let raw = load_from_str(toml).expect("valid TOML");
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, ProcflowError::ConfigError(_)), "got {err:?}");
        assert!(err.to_string().contains(needle), "{err} should mention {needle}");
    }
}

#[test]
fn unknown_enum_values_fail_to_parse() {
    let err = load_from_str("[config]\nstrategy = \"random\"\n").unwrap_err();
    assert!(matches!(err, ProcflowError::TomlError(_)), "got {err:?}");

    let err = load_from_str("[[command]]\ncmd = [\"true\"]\npriority = \"urgent\"\n").unwrap_err();
    assert!(matches!(err, ProcflowError::TomlError(_)), "got {err:?}");
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/nonexistent/procflow/Procflow.toml").unwrap_err();
    assert!(matches!(err, ProcflowError::IoError(_)), "got {err:?}");
}

#[test]
fn plan_follows_the_strategy() {
    let cfg = ConfigFileBuilder::new()
        .strategy(StrategyKind::Priority)
        .with_command(CommandConfigBuilder::new(["echo", "a"]).key("a").build())
        .with_command(
            CommandConfigBuilder::new(["echo", "b"])
                .key("b")
                .priority(Priority::High)
                .build(),
        )
        .build();

    let keys: Vec<String> = cfg.plan().into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["b", "a"]);

    let fifo = ConfigFileBuilder::new()
        .strategy(StrategyKind::Fifo)
        .with_command(CommandConfigBuilder::new(["echo", "a"]).key("a").build())
        .with_command(
            CommandConfigBuilder::new(["echo", "b"])
                .key("b")
                .priority(Priority::High)
                .build(),
        )
        .build();
    assert_eq!(fifo.plan()[0], ("a".to_string(), "echo a".to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn config_drives_a_pool() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .quiet(true)
        .default_env("PROCFLOW_TEST_GREETING", "hi")
        .with_command(
            CommandConfigBuilder::shell("echo $PROCFLOW_TEST_GREETING")
                .key("greet")
                .build(),
        )
        .with_command(CommandConfigBuilder::shell("exit 3").key("fail").build())
        .with_command(CommandConfigBuilder::new(["cat"]).key("stdin").input("piped").build())
        .build();

    let started = cfg.start()?;
    assert!(matches!(started, Started::Pool(_)));
    let outcome = with_timeout(started.wait()).await;

    let Outcome::Pool(results) = &outcome else {
        panic!("expected pool outcome, got {outcome:?}");
    };
    assert_eq!(results["greet"].output(), "hi\n");
    assert_eq!(results["fail"].exit_code(), 3);
    assert_eq!(results["stdin"].output(), "piped");
    assert!(!outcome.successful());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn config_drives_a_pipeline_with_file_input() -> TestResult {
    init_tracing();

    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, "b\na\nb\n")?;

    let cfg = ConfigFileBuilder::new()
        .mode(ExecutionMode::Pipeline)
        .quiet(true)
        .timeout("5s")
        .with_command(CommandConfigBuilder::new(["cat"]).input_file(file.path()).build())
        .with_command(CommandConfigBuilder::new(["sort", "-u"]).build())
        .build();

    let running = cfg.start_pipeline()?;
    let result = with_timeout(running.wait()).await;

    assert_eq!(result.output(), "a\nb\n");
    assert_eq!(result.command(), "cat | sort -u");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn demo_pipeline_runs() -> TestResult {
    init_tracing();

    let cfg = load_and_validate(demo("pipeline.toml"))?;
    let outcome = with_timeout(cfg.start()?.wait()).await;

    let Outcome::Pipeline(result) = outcome else {
        panic!("expected pipeline outcome");
    };
    let counts: Vec<String> = result
        .output()
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    assert_eq!(counts, vec!["1 a", "2 b", "1 c"]);
    Ok(())
}
