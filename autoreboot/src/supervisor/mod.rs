/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The reboot supervisor loop.
//!
//! One cycle:
//!
//! ```text
//! ensure server ─► next reboot ─► arm announcements ─► sleep ─► stop ladder
//!      ▲                                                              │
//!      └──────────────── detach ◄── restart delay ◄───────────────────┘
//! ```
//!
//! A failed start backs off for `start_retry`; an empty schedule idles for
//! `idle_poll`; any other error escaping a cycle is logged and backs off for
//! `start_retry`.  The loop only ends when the shutdown token is cancelled,
//! after which the current server is taken down through the same stop ladder.
//!
//! Announcements run as independent tasks so they fire while the loop
//! sleeps.  They hold the controller, not the process, so one that fires
//! after the server was detached just fails its send.

pub mod clock;

pub use clock::{Clock, SystemClock};

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::RebootConfig;
use crate::process::{ProcessError, ServerControl, StopOutcome};
use crate::schedule::{next_reboot_time, plan_announcements};

/// Drives one [`ServerControl`] through the reboot schedule.
pub struct Supervisor<C: ServerControl> {
    server: Arc<C>,
    config: Arc<RebootConfig>,
    clock: Arc<dyn Clock>,
}

impl<C: ServerControl> Supervisor<C> {
    pub fn new(server: Arc<C>, config: Arc<RebootConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            server,
            config,
            clock,
        }
    }

    /// Runs cycles until `shutdown` is cancelled, then stops the server.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Auto reboot tool started");
        let mut announcements = JoinSet::new();

        while !shutdown.is_cancelled() {
            if let Err(e) = self.cycle(&shutdown, &mut announcements).await {
                if e.is_launch_failure() {
                    error!("Failed to start server: {}", e);
                } else {
                    error!("Error in reboot cycle: {:#}", anyhow::Error::from(e));
                }
                let retry = self.config.timings.start_retry;
                error!("Retrying in {} seconds...", retry.as_secs());
                sleep_or_cancel(retry, &shutdown).await;
            }
        }

        info!("Shutdown requested, stopping server...");
        announcements.shutdown().await;
        match self.server.stop().await {
            Ok(outcome) => info!(?outcome, "Server stopped"),
            Err(e) => error!("Failed to stop server during shutdown: {}", e),
        }
        self.server.detach();
        info!("Supervisor loop finished");
    }

    /// One pass of the reboot state machine.  Returns early with `Ok` on idle
    /// and cancellation; a failed start surfaces as a launch failure.
    async fn cycle(
        &self,
        shutdown: &CancellationToken,
        announcements: &mut JoinSet<()>,
    ) -> Result<(), ProcessError> {
        let timings = &self.config.timings;

        // ── 1. Ensure a server is running ─────────────────────────────────────
        if !self.server.is_running().await {
            self.server.start().await?;
        }

        // ── 2. Next reboot ────────────────────────────────────────────────────
        let now = self.clock.now();
        let Some(reboot_at) = next_reboot_time(now, &self.config.reboot_schedule) else {
            warn!(
                "No reboot schedule configured, sleeping for {} seconds",
                timings.idle_poll.as_secs()
            );
            sleep_or_cancel(timings.idle_poll, shutdown).await;
            return Ok(());
        };
        info!(%reboot_at, "Next reboot scheduled");

        // ── 3. Arm announcements ──────────────────────────────────────────────
        // Anything still armed belongs to a superseded cycle.
        announcements.shutdown().await;
        let base = Instant::now();
        for announcement in plan_announcements(reboot_at, now, &self.config.announcement_intervals)
        {
            let fire_at = base + until(now, announcement.fire_at);
            let command = announcement.command();
            let server = Arc::clone(&self.server);
            announcements.spawn(async move {
                tokio::time::sleep_until(fire_at).await;
                server.send_command(&command).await;
            });
            info!(
                fire_at = %announcement.fire_at,
                "Scheduled announcement: {}",
                announcement.message
            );
        }

        // ── 4. Sleep until reboot ─────────────────────────────────────────────
        let wait = until(now, reboot_at);
        info!("Waiting {} seconds until reboot time...", wait.as_secs());
        if !sleep_until_or_cancel(base + wait, shutdown).await {
            return Ok(());
        }

        // ── 5. Stop ladder (not interrupted once started) ─────────────────────
        match self.server.stop().await? {
            StopOutcome::NotRunning => warn!("Server was already gone at reboot time"),
            outcome => info!(?outcome, "Server stopped for scheduled reboot"),
        }

        // ── 5a. Restart delay ─────────────────────────────────────────────────
        info!(
            "Waiting {} seconds before restart...",
            timings.restart_delay.as_secs()
        );
        sleep_or_cancel(timings.restart_delay, shutdown).await;

        // ── 6. Drop the old handle ────────────────────────────────────────────
        self.server.detach();
        Ok(())
    }
}

/// Wall-clock distance from `now` to `then`, zero if `then` is not ahead.
fn until(now: NaiveDateTime, then: NaiveDateTime) -> Duration {
    (then - now).to_std().unwrap_or(Duration::ZERO)
}

/// Sleeps for `duration`; returns `false` if cancelled first.  Durations past
/// the end of the clock sleep until cancelled.
async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.cancelled() => false,
    }
}

async fn sleep_until_or_cancel(deadline: Instant, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep_until(deadline) => true,
        _ = shutdown.cancelled() => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
