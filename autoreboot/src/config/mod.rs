/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Reboot configuration loading and validation.
//!
//! The expected JSON structure is:
//! ```json
//! {
//!   "server_path": "Server/Intersect Server",
//!   "server_args": ["--port", "5400"],
//!   "reboot_schedule": [
//!     { "hour": 4, "minute": 0, "enabled": true },
//!     { "hour": 16, "minute": 0 }
//!   ],
//!   "announcement_intervals": [
//!     { "minutes_before": 10, "message": "Server reboot in {minutes} minutes" },
//!     { "seconds_before": 30, "message": "Server reboot in {seconds} seconds!" }
//!   ],
//!   "restart_delay_seconds": 10,
//!   "log_file": "reboot_tool.log"
//! }
//! ```
//!
//! Files ending in `.yaml` / `.yml` are parsed as YAML with the same layout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Log file used when the configuration does not name one.
pub const DEFAULT_LOG_FILE: &str = "reboot_tool.log";

const DEFAULT_STARTUP_GRACE_SECS: u64 = 3;
const DEFAULT_EXIT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TERMINATE_GRACE_SECS: u64 = 5;
const DEFAULT_START_RETRY_SECS: u64 = 60;
const DEFAULT_IDLE_POLL_SECS: u64 = 3600;

// ── Private deserialization types ─────────────────────────────────────────────

/// Top-level wrapper that maps directly onto the configuration file layout.
///
/// Kept private – callers work with [`RebootConfig`] instead.
#[derive(Debug, Deserialize)]
struct RebootConfigFile {
    server_path: PathBuf,
    #[serde(default)]
    server_args: Vec<String>,
    reboot_schedule: Vec<RebootTime>,
    announcement_intervals: Vec<AnnouncementRule>,
    restart_delay_seconds: u64,
    log_file: Option<PathBuf>,

    startup_grace_seconds: Option<u64>,
    exit_timeout_seconds: Option<u64>,
    terminate_grace_seconds: Option<u64>,
    start_retry_seconds: Option<u64>,
    idle_poll_seconds: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

// ── Public data structures ────────────────────────────────────────────────────

/// One daily reboot point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RebootTime {
    pub hour: u32,
    pub minute: u32,
    /// Disabled entries are kept but never scheduled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl RebootTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            enabled: true,
        }
    }
}

/// How long before the reboot an announcement fires, in the unit the
/// operator wrote it in.
///
/// The unit matters for rendering: `{minutes}` is substituted with the
/// minute count, `{seconds}` with the second count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadTime {
    Seconds(u64),
    Minutes(u64),
}

impl LeadTime {
    /// Total lead time in seconds, used for ordering.
    pub fn as_secs(self) -> u64 {
        match self {
            LeadTime::Seconds(s) => s,
            LeadTime::Minutes(m) => m.saturating_mul(60),
        }
    }

    /// The placeholder this lead time substitutes into a message template.
    pub fn placeholder(self) -> &'static str {
        match self {
            LeadTime::Seconds(_) => "{seconds}",
            LeadTime::Minutes(_) => "{minutes}",
        }
    }

    /// The numeric value in the declared unit.
    pub fn value(self) -> u64 {
        match self {
            LeadTime::Seconds(v) | LeadTime::Minutes(v) => v,
        }
    }
}

/// A pre-reboot announcement as written in the configuration.
///
/// Exactly one of `seconds_before` / `minutes_before` is expected.  A rule
/// with neither is accepted at load time and skipped by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnnouncementRule {
    #[serde(default)]
    pub seconds_before: Option<u64>,
    #[serde(default)]
    pub minutes_before: Option<u64>,
    pub message: String,
}

impl AnnouncementRule {
    pub fn seconds(seconds: u64, message: impl Into<String>) -> Self {
        Self {
            seconds_before: Some(seconds),
            minutes_before: None,
            message: message.into(),
        }
    }

    pub fn minutes(minutes: u64, message: impl Into<String>) -> Self {
        Self {
            seconds_before: None,
            minutes_before: Some(minutes),
            message: message.into(),
        }
    }

    /// The rule's lead time, or `None` for an invalid rule.
    ///
    /// `seconds_before` wins when both are present.
    pub fn lead_time(&self) -> Option<LeadTime> {
        match (self.seconds_before, self.minutes_before) {
            (Some(s), _) => Some(LeadTime::Seconds(s)),
            (None, Some(m)) => Some(LeadTime::Minutes(m)),
            (None, None) => None,
        }
    }
}

/// Every wait the supervisor performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Pause between spawning the child and checking it is still alive.
    pub startup_grace: Duration,
    /// How long the child gets to honour the `exit` command.
    pub exit_timeout: Duration,
    /// How long the child gets after SIGTERM before SIGKILL.
    pub terminate_grace: Duration,
    /// Backoff after a failed start or a faulted cycle.
    pub start_retry: Duration,
    /// Re-check interval when no reboot entry is enabled.
    pub idle_poll: Duration,
    /// Pause between the old child's exit and the new child's start.
    pub restart_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_secs(DEFAULT_STARTUP_GRACE_SECS),
            exit_timeout: Duration::from_secs(DEFAULT_EXIT_TIMEOUT_SECS),
            terminate_grace: Duration::from_secs(DEFAULT_TERMINATE_GRACE_SECS),
            start_retry: Duration::from_secs(DEFAULT_START_RETRY_SECS),
            idle_poll: Duration::from_secs(DEFAULT_IDLE_POLL_SECS),
            restart_delay: Duration::ZERO,
        }
    }
}

impl Timings {
    /// Upper bound on how long a shutdown may take to stop the child and
    /// return from the supervisor loop.
    /// Saturates at [`Duration::MAX`] for absurd configured values.
    pub fn shutdown_budget(&self) -> Duration {
        self.exit_timeout
            .saturating_add(self.terminate_grace.saturating_mul(2))
            .saturating_add(Duration::from_secs(10))
    }
}

/// Validated reboot configuration.  Immutable after loading.
#[derive(Debug, Clone)]
pub struct RebootConfig {
    pub server_path: PathBuf,
    pub server_args: Vec<String>,
    pub reboot_schedule: Vec<RebootTime>,
    pub announcement_intervals: Vec<AnnouncementRule>,
    pub log_file: PathBuf,
    pub timings: Timings,
    /// Directory of the configuration file.  Relative `server_path` values
    /// that do not resolve from the working directory are tried here.
    pub base_dir: PathBuf,
}

impl RebootConfig {
    /// Parses and validates `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is structurally invalid,
    /// misses a required field, or holds an out-of-range schedule entry.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading reboot configuration from: {}", path.display());

        ensure!(path.exists(), "Config file not found: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: RebootConfigFile = if is_yaml(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON file: {}", path.display()))?
        };

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let config = Self::from_file(file, base_dir)?;

        info!(
            server = %config.server_path.display(),
            schedule_entries = config.reboot_schedule.len(),
            announcements = config.announcement_intervals.len(),
            restart_delay_s = config.timings.restart_delay.as_secs(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn from_file(file: RebootConfigFile, base_dir: PathBuf) -> Result<Self> {
        ensure!(
            !file.server_path.as_os_str().is_empty(),
            "server_path must not be empty"
        );

        for (i, entry) in file.reboot_schedule.iter().enumerate() {
            ensure!(
                entry.hour <= 23,
                "reboot_schedule[{i}]: hour {} is out of range 0-23",
                entry.hour
            );
            ensure!(
                entry.minute <= 59,
                "reboot_schedule[{i}]: minute {} is out of range 0-59",
                entry.minute
            );
            debug!(
                "  Reboot at {:02}:{:02} (enabled: {})",
                entry.hour, entry.minute, entry.enabled
            );
        }

        if !file.reboot_schedule.iter().any(|e| e.enabled) {
            warn!("No enabled reboot_schedule entry, the supervisor will only keep the server running");
        }

        for (i, rule) in file.announcement_intervals.iter().enumerate() {
            match (rule.seconds_before, rule.minutes_before) {
                (Some(_), Some(_)) => warn!(
                    "announcement_intervals[{i}] sets both seconds_before and minutes_before, using seconds_before"
                ),
                (None, None) => warn!(
                    "announcement_intervals[{i}] sets neither seconds_before nor minutes_before, it will be skipped"
                ),
                _ => {}
            }
        }

        let defaults = Timings::default();
        let secs_or = |v: Option<u64>, d: Duration| v.map(Duration::from_secs).unwrap_or(d);
        let timings = Timings {
            startup_grace: secs_or(file.startup_grace_seconds, defaults.startup_grace),
            exit_timeout: secs_or(file.exit_timeout_seconds, defaults.exit_timeout),
            terminate_grace: secs_or(file.terminate_grace_seconds, defaults.terminate_grace),
            start_retry: secs_or(file.start_retry_seconds, defaults.start_retry),
            idle_poll: secs_or(file.idle_poll_seconds, defaults.idle_poll),
            restart_delay: Duration::from_secs(file.restart_delay_seconds),
        };

        Ok(Self {
            server_path: file.server_path,
            server_args: file.server_args,
            reboot_schedule: file.reboot_schedule,
            announcement_intervals: file.announcement_intervals,
            log_file: file
                .log_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            timings,
            base_dir,
        })
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
