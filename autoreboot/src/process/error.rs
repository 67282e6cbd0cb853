/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the server process controller.
//!
//! Launch failures ([`ProcessError::ExecutableNotFound`],
//! [`ProcessError::Spawn`], [`ProcessError::ExitedEarly`]) are recoverable:
//! the supervisor backs off and retries.  The remaining variants surface from
//! the stop sequence and are treated as a faulted cycle.
//!
//! Command-send failures are not represented here; `send_command` logs them
//! and returns `false`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// None of the candidate locations for `server_path` exist.
    #[error("server executable not found: {}", .path.display())]
    ExecutableNotFound { path: PathBuf },

    /// The OS refused to start the executable.
    #[error("failed to start server {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The child exited before the startup grace period was over.  `hint` is
    /// the telling line from the server's own log, if there was one.
    #[error("server process exited immediately with code {}", fmt_code(.code))]
    ExitedEarly {
        code: Option<i32>,
        hint: Option<String>,
    },

    /// Delivering a signal to the child failed for a reason other than the
    /// child already being gone.
    #[error("failed to send {signal} to pid {pid}: {source}")]
    Signal {
        pid: u32,
        signal: &'static str,
        #[source]
        source: nix::errno::Errno,
    },

    /// SIGKILL could not be delivered.
    #[error("failed to kill pid {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// Polling or reaping the child failed.
    #[error("failed to wait for pid {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// `true` for failures raised by `start()`, which the supervisor answers
    /// with the start-retry backoff.
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            ProcessError::ExecutableNotFound { .. }
                | ProcessError::Spawn { .. }
                | ProcessError::ExitedEarly { .. }
        )
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none (killed by signal)".to_string(),
    }
}
