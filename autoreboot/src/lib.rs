/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! autoreboot – scheduled-reboot supervisor for a game-server process
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/         – reboot_config.json loading & validation
//! ├── schedule/       – next reboot instant + announcement planning
//! ├── process/        – child process controller and stop ladder
//! ├── supervisor/     – the reboot loop
//! └── logging         – console + log file tracing subscriber
//! ```

pub mod config;
pub mod logging;
pub mod process;
pub mod schedule;
pub mod supervisor;
