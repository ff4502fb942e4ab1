// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::runtime::Engine;
use crate::engine::trigger::{run_trigger_loop, IntervalTrigger};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and graph construction
/// - the engine (run submission / status / cancellation)
/// - the interval trigger loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let graph = Arc::new(cfg.build_graph()?);
    let concurrency = args.concurrency.unwrap_or(cfg.config.concurrency);
    let engine = Arc::new(Engine::new(concurrency));

    // Without a [trigger] section the file describes a one-shot graph.
    let once = args.once || cfg.trigger.is_none();
    let interval = cfg
        .trigger
        .map(|t| Duration::from_secs(t.interval_secs))
        .unwrap_or(Duration::ZERO);
    let trigger = IntervalTrigger::new(SystemTime::now(), interval);

    // Ctrl-C → cancel the active run and stop triggering.
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        let _ = shutdown_tx.send(()).await;
    });

    info!(
        tasks = graph.len(),
        concurrency,
        once,
        "rundag starting"
    );
    run_trigger_loop(engine, graph, trigger, once, shutdown_rx).await?;
    Ok(())
}

/// Simple dry-run output: print trigger settings, tasks, deps and commands.
fn print_dry_run(cfg: &ConfigFile) {
    println!("rundag dry-run");
    println!("  config.concurrency = {}", cfg.config.concurrency);
    match &cfg.trigger {
        Some(trigger) => println!("  trigger.interval_secs = {}", trigger.interval_secs),
        None => println!("  trigger: none (single run)"),
    }
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(retries) = task.retries {
            println!("      retries: {retries}");
        }
        if let Some(ms) = task.retry_delay_ms {
            println!("      retry_delay_ms: {ms}");
        }
    }
}
