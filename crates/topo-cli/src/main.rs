//! `topo` – topology extraction command line interface.
//!
//! ```text
//! topo serve            run the extractor behind a rosbridge WebSocket endpoint
//! topo replay <file>    feed a recorded session of rosbridge frames through the extractor
//! topo config           print the effective configuration
//! ```
//!
//! Settings come from `~/.topo/config.toml` (created with defaults on first
//! run) with `TOPO_*` environment overrides on top.

mod config;
mod replay;

use colored::Colorize;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{info, warn};

use topo_middleware::{EventBus, RosBridge};
use topo_runtime::{GraphPresenter, TopologyExtractor, init_tracing};
use topo_types::TopoError;

/// A parsed command line.
#[derive(Debug, PartialEq)]
enum Command {
    Serve,
    Replay(PathBuf),
    Config,
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self, String> {
        match args {
            [] => Ok(Command::Help),
            [cmd] if cmd == "serve" => Ok(Command::Serve),
            [cmd] if cmd == "config" => Ok(Command::Config),
            [cmd, file] if cmd == "replay" => Ok(Command::Replay(PathBuf::from(file))),
            [cmd] if cmd == "replay" => Err("replay needs a file argument".to_string()),
            [cmd, ..] if cmd == "help" || cmd == "--help" || cmd == "-h" => Ok(Command::Help),
            [cmd, ..] => Err(format!("unknown command `{cmd}`")),
        }
    }
}

fn main() -> ExitCode {
    let _guard = init_tracing("topo");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    if command == Command::Help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let cfg = match load_or_create_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        Command::Serve => serve(cfg),
        Command::Replay(path) => run_replay(cfg, &path),
        Command::Config => {
            print_config(&cfg);
            Ok(())
        }
        Command::Help => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Run the extractor and the WebSocket endpoint until Ctrl-C.
fn serve(cfg: config::Config) -> Result<(), TopoError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| TopoError::Channel(format!("failed to start runtime: {e}")))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        stop_tx.send_replace(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    runtime.block_on(async move {
        let bus = Arc::new(EventBus::default());
        let extractor = TopologyExtractor::new(
            cfg.extraction.clone(),
            GraphPresenter::new(cfg.history_max_points),
            Arc::clone(&bus),
        )?;
        let handle = extractor.spawn(stop_rx.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], cfg.bridge_port));
        let bridge = RosBridge::new(Arc::clone(&bus));
        println!(
            "  rosbridge endpoint on {}  (Ctrl-C to stop)",
            format!("ws://{addr}").bold()
        );

        let mut stop = stop_rx;
        tokio::select! {
            result = bridge.run_ws_server(addr) => result?,
            _ = stop.wait_for(|&stopped| stopped) => {}
        }

        let extractor = handle
            .await
            .map_err(|e| TopoError::Channel(format!("extractor task failed: {e}")))?;
        info!(history = extractor.history().len(), "Serve finished");
        println!("{}", "  ✓ Stopped.".green());
        Ok::<(), TopoError>(())
    })
}

/// Replay a recorded session and print one line per grid update.
fn run_replay(cfg: config::Config, path: &Path) -> Result<(), TopoError> {
    let file = File::open(path)
        .map_err(|e| TopoError::MalformedInput(format!("cannot open {}: {e}", path.display())))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let bus = Arc::new(EventBus::default());
    let mut extractor = TopologyExtractor::new(
        cfg.extraction,
        GraphPresenter::new(cfg.history_max_points),
        bus,
    )?;

    println!("  Replaying {}", path.display().to_string().bold());
    let summary = replay::replay(BufReader::new(file), &mut extractor, &shutdown, |outcome| {
        println!("{}", replay::format_outcome(outcome));
    })?;

    if shutdown.load(Ordering::SeqCst) {
        println!("{}", "  ⚠  Interrupted.".yellow());
    }
    println!("{}", replay::format_summary(&summary));
    Ok(())
}

fn print_config(cfg: &config::Config) {
    println!("  Config file: {}", config::config_path().display().to_string().bold());
    match toml::to_string_pretty(cfg) {
        Ok(raw) => println!("\n{raw}"),
        Err(e) => println!("{}: {e}", "Cannot render config".red()),
    }
    println!(
        "  Grid: {0}×{0} cells",
        cfg.extraction.grid_cells().to_string().bold()
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Load the config, writing the defaults on first run.
fn load_or_create_config() -> Result<config::Config, TopoError> {
    let cfg = match config::load()? {
        Some(cfg) => cfg,
        None => {
            let mut cfg = config::Config::default();
            config::save(&cfg)?;
            println!(
                "  {} Default config written to {}",
                "✓".green().bold(),
                config::config_path().display().to_string().bold()
            );
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    cfg.extraction.validate()?;
    Ok(cfg)
}

fn print_usage() {
    println!();
    println!("  {} {}", "topo".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Occupancy grid → topology graph extraction");
    println!();
    println!("  {}", "Usage:".bold());
    println!("    topo serve            run behind a rosbridge WebSocket endpoint");
    println!("    topo replay <file>    replay newline-delimited rosbridge frames");
    println!("    topo config           print the effective configuration");
    println!();
}
