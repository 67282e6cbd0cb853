/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Best-effort hints for a server that died during startup.
//!
//! The server writes its own logs to `<workdir>/logs/*.log`.  When it exits
//! within the grace period, the tail of the newest log usually says why
//! (most often a port that is already bound).  Nothing here is
//! authoritative: the hint is logged and attached to the start error, never
//! used to decide anything.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

/// How many trailing lines of the newest log are scanned.
const TAIL_LINES: usize = 10;

/// Returns the most recently modified `*.log` file directly inside `dir`.
pub fn latest_log_file(dir: &Path) -> Option<PathBuf> {
    fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "log"))
        .filter_map(|p| {
            let modified = fs::metadata(&p).and_then(|m| m.modified()).ok()?;
            Some((modified, p))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, p)| p)
}

/// Picks the most telling line from the tail of a server log.
///
/// Newest lines are checked first.  A port / bind failure wins; otherwise the
/// newest line carrying an `ERR` level marker is returned.
pub fn failure_hint<S: AsRef<str>>(tail: &[S]) -> Option<String> {
    let port_failure = tail.iter().rev().find(|line| {
        let lower = line.as_ref().to_lowercase();
        lower.contains("port")
            && (lower.contains("fail") || lower.contains("error") || lower.contains("listen"))
    });

    port_failure
        .or_else(|| tail.iter().rev().find(|line| line.as_ref().contains("ERR")))
        .map(|line| line.as_ref().trim().to_string())
}

/// Reads the newest log under `log_dir` and returns a hint, if any.
pub fn scan_log_dir(log_dir: &Path) -> Option<String> {
    let log_file = latest_log_file(log_dir)?;
    let bytes = match fs::read(&log_file) {
        Ok(b) => b,
        Err(e) => {
            debug!("Could not read log file {}: {}", log_file.display(), e);
            return None;
        }
    };
    let content = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = content.lines().collect();
    let tail = &lines[lines.len().saturating_sub(TAIL_LINES)..];
    failure_hint(tail)
}

/// Logs everything known about an early exit of a server whose working
/// directory was `working_dir`, and returns the log hint if one was found.
pub fn report_early_exit(working_dir: &Path) -> Option<String> {
    let log_dir = working_dir.join("logs");
    let hint = scan_log_dir(&log_dir);
    if let Some(hint) = &hint {
        error!("Server log: {}", hint);
    }
    error!("Common issues: port already in use, missing config files, or database connection problems");
    error!("Check server logs in: {}", log_dir.display());
    hint
}

// ── Tests ─────────────────────────────────────────────────────────────────────
