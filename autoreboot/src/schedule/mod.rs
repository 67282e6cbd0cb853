/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Daily reboot schedule calculation.
//!
//! Times are local wall-clock [`NaiveDateTime`]s: a reboot configured for
//! `04:00` happens when the host clock reads 04:00, whatever the time zone.

pub mod announcement;

pub use announcement::{plan_announcements, ScheduledAnnouncement};

use chrono::{Duration, NaiveDateTime};

use crate::config::RebootTime;

/// Returns the nearest reboot instant strictly after `now`, or `None` when no
/// entry is enabled.
///
/// Each enabled entry is placed on `now`'s date at `hh:mm:00`; an instant that
/// is not in the future moves to the next day.
pub fn next_reboot_time(now: NaiveDateTime, schedule: &[RebootTime]) -> Option<NaiveDateTime> {
    let today = now.date();

    schedule
        .iter()
        .filter(|entry| entry.enabled)
        .filter_map(|entry| today.and_hms_opt(entry.hour, entry.minute, 0))
        .map(|candidate| {
            if candidate <= now {
                candidate + Duration::days(1)
            } else {
                candidate
            }
        })
        .min()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
