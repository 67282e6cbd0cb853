/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Tracing subscriber setup.
//!
//! Every event goes to stdout and is appended to the configured log file.
//! The level is taken from `RUST_LOG` (e.g. `RUST_LOG=debug`) and defaults to
//! `info`.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create log directory: {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open log file: {}", path.display()))
}

/// Installs the global subscriber.  Call once, after the configuration has
/// been loaded (it names the log file).
///
/// # Errors
/// Fails if the log file cannot be opened or a global subscriber is already
/// installed.
pub fn init(log_file: &Path) -> Result<()> {
    let file = open_log_file(log_file)?;

    let console = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let logfile = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console)
        .with(logfile)
        .try_init()
        .context("Failed to install tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_and_parent_dirs_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reboot_tool.log");
        open_log_file(&path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn log_file_is_appended_not_truncated() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reboot_tool.log");
        std::fs::write(&path, "previous run\n").unwrap();

        let mut f = open_log_file(&path).unwrap();
        f.write_all(b"this run\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "previous run\nthis run\n");
    }
}
