// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub(crate) mod exec;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod process;
pub mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::config::Outcome;
use crate::process::ProcessResult;

/// High-level entry point used by `main.rs`. Returns the process exit code:
/// 0 when every command succeeded, 1 otherwise.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    let started = cfg.start()?;
    info!(mode = ?cfg.mode, commands = cfg.commands.len(), "started");

    // Ctrl-C → graceful stop of whatever is running.
    {
        let started = started.clone();
        let grace = args.stop_timeout;
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("interrupt received; stopping");
            if let Err(e) = started.stop(grace).await {
                warn!(error = %e, "stop failed");
            }
        });
    }

    let outcome = started.wait().await;
    if args.json {
        print_json(&outcome)?;
    } else {
        print_summary(&cfg, &outcome);
    }

    Ok(if outcome.successful() { 0 } else { 1 })
}

fn summary_line(key: &str, result: &ProcessResult) -> String {
    let status = if result.timed_out() {
        "timed out"
    } else if result.successful() {
        "ok"
    } else {
        "failed"
    };
    format!(
        "{key:<16} {status:<9} exit={:<4} {}",
        result.exit_code(),
        result.command()
    )
}

fn print_summary(cfg: &ConfigFile, outcome: &Outcome) {
    match outcome {
        Outcome::Pool(results) => {
            // Declaration order, each key once.
            let mut printed = std::collections::HashSet::new();
            for key in cfg.keys() {
                if !printed.insert(key) {
                    continue;
                }
                match results.get(key) {
                    Some(result) => println!("{}", summary_line(key, result)),
                    None => println!("{key:<16} missing"),
                }
            }
        }
        Outcome::Pipeline(result) => println!("{}", summary_line("pipeline", result)),
    }
}

fn print_json(outcome: &Outcome) -> Result<()> {
    let rendered = match outcome {
        Outcome::Pool(results) => {
            let sorted: BTreeMap<_, _> = results.iter().collect();
            serde_json::to_string_pretty(&sorted)?
        }
        Outcome::Pipeline(result) => serde_json::to_string_pretty(result)?,
    };
    println!("{rendered}");
    Ok(())
}

/// Print the resolved config and the order commands would start in.
fn print_dry_run(cfg: &ConfigFile) {
    println!("procflow dry-run");
    println!("  mode = {:?}", cfg.mode);
    println!("  concurrency = {}", cfg.concurrency);
    println!("  strategy = {:?}", cfg.strategy);
    if let Some(timeout) = cfg.timeout {
        println!("  timeout = {timeout:?}");
    }
    println!();

    println!("commands ({}), in start order:", cfg.commands.len());
    for (key, command) in cfg.plan() {
        println!("  - {key}: {command}");
    }

    debug!("dry-run complete (no execution)");
}
