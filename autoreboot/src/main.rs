/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use autoreboot::config::RebootConfig;
use autoreboot::logging;
use autoreboot::process::{LaunchSpec, ProcessController};
use autoreboot::supervisor::{Supervisor, SystemClock};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Restarts a game server on a daily schedule, announcing each reboot to
/// players beforehand.
///
/// Example:
///   autoreboot --config /srv/game/reboot_config.json
#[derive(Debug, Parser)]
#[command(
    name = "autoreboot",
    about = "Scheduled-reboot supervisor for a game server",
    long_about = None,
)]
struct Cli {
    /// Path to the reboot configuration file (JSON, or YAML by extension).
    #[arg(long = "config", default_value = "reboot_config.json")]
    config: PathBuf,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ── Load configuration ────────────────────────────────────────────────────
    // Logging is not up yet (the config names the log file), so startup
    // errors go straight to the operator's console.
    let config = match RebootConfig::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config.log_file) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    info!(
        config        = %cli.config.display(),
        server        = %config.server_path.display(),
        log_file      = %config.log_file.display(),
        restart_delay = config.timings.restart_delay.as_secs(),
        "Auto reboot tool starting up..."
    );
    for entry in &config.reboot_schedule {
        info!(
            "  Reboot at {:02}:{:02}{}",
            entry.hour,
            entry.minute,
            if entry.enabled { "" } else { " (disabled)" }
        );
    }

    // ── Run the supervisor ────────────────────────────────────────────────────
    let config = Arc::new(config);
    let controller = Arc::new(ProcessController::new(
        LaunchSpec::from_config(&config),
        &config.timings,
    ));
    let shutdown = CancellationToken::new();
    let supervisor = Supervisor::new(controller, Arc::clone(&config), Arc::new(SystemClock));
    let mut loop_task = tokio::spawn(supervisor.run(shutdown.clone()));

    tokio::select! {
        joined = &mut loop_task => {
            // The loop only returns after cancellation; reaching this arm
            // means it panicked.
            if let Err(e) = joined {
                error!("Supervisor loop died: {}", e);
                process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("Received interrupt signal, shutting down...");
            shutdown.cancel();

            let budget = config.timings.shutdown_budget();
            match tokio::time::timeout(budget, loop_task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Supervisor loop died during shutdown: {}", e),
                Err(_) => warn!(
                    budget_s = budget.as_secs(),
                    "Supervisor loop did not finish within the shutdown budget"
                ),
            }
        }
    }

    info!("Auto reboot tool stopped");
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let (mut int, mut term) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(int), Ok(term)) => (int, term),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Cannot install signal handlers ({}), falling back to Ctrl-C", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    tokio::select! {
        _ = int.recv() => {}
        _ = term.recv() => {}
    }
}
