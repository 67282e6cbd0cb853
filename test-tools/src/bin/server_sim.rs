/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Stand-in game server for exercising autoreboot by hand.
//!
//! Reads line commands from stdin the way the real server console does:
//!
//! * `announcement "<text>"` – logged as a broadcast
//! * `exit`                  – clean shutdown (unless `--ignore-exit`)
//! * empty lines             – ignored
//!
//! End-of-input is treated like `exit`, which is exactly the behaviour the
//! supervisor's stdin priming guards against.
//!
//! Example:
//!   server-sim --ignore-exit --ignore-sigterm   # forces the full stop ladder
//!   server-sim --fail-bind                      # exits during startup

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "server-sim", about = "Simulated game server for autoreboot")]
struct Cli {
    /// Keep running when `exit` is received.
    #[arg(long)]
    ignore_exit: bool,

    /// Keep running when SIGTERM is received.
    #[arg(long)]
    ignore_sigterm: bool,

    /// Write a port-bind failure to `logs/server.log` and exit with code 1.
    #[arg(long)]
    fail_bind: bool,

    /// Port reported in the log output.
    #[arg(long, default_value_t = 5400)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(pid = std::process::id(), ?cli, "server-sim starting");

    if cli.fail_bind {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir).context("creating logs/")?;
        let line = format!(
            "[ERR] Failed to listen on port {}: address already in use\n",
            cli.port
        );
        std::fs::write(log_dir.join("server.log"), line).context("writing logs/server.log")?;
        error!(port = cli.port, "Failed to bind, exiting");
        std::process::exit(1);
    }

    let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!(port = cli.port, "Listening (simulated)");

    loop {
        tokio::select! {
            _ = term.recv() => {
                if cli.ignore_sigterm {
                    warn!("SIGTERM received, ignoring");
                    continue;
                }
                info!("SIGTERM received, shutting down");
                return Ok(());
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    info!("stdin closed, shutting down");
                    return Ok(());
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" {
                    if cli.ignore_exit {
                        warn!("exit received, ignoring");
                        continue;
                    }
                    info!("exit received, shutting down");
                    return Ok(());
                }
                match line.strip_prefix("announcement ") {
                    Some(text) => info!("[BROADCAST] {}", text.trim_matches('"')),
                    None => warn!(command = line, "unknown command"),
                }
            }
        }
    }
}
