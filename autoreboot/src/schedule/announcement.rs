/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pre-reboot announcement planning.

use chrono::{Duration, NaiveDateTime};
use tracing::warn;

use crate::config::{AnnouncementRule, LeadTime};

/// One announcement armed for the current reboot cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAnnouncement {
    pub fire_at: NaiveDateTime,
    pub lead_time: LeadTime,
    /// Rendered text, placeholder already substituted.
    pub message: String,
}

impl ScheduledAnnouncement {
    /// The line sent to the server's stdin.
    pub fn command(&self) -> String {
        format!("announcement \"{}\"", self.message)
    }
}

/// Substitutes the lead time's value for its placeholder, if the template
/// carries one.
pub fn render_message(template: &str, lead_time: LeadTime) -> String {
    let placeholder = lead_time.placeholder();
    if template.contains(placeholder) {
        template.replace(placeholder, &lead_time.value().to_string())
    } else {
        template.to_string()
    }
}

/// Computes the announcements still ahead of `now` for a reboot at
/// `reboot_at`, furthest from the reboot first.
///
/// Announcements whose fire time is not after `now` are dropped; a missed
/// announcement is never caught up.
pub fn plan_announcements(
    reboot_at: NaiveDateTime,
    now: NaiveDateTime,
    rules: &[AnnouncementRule],
) -> Vec<ScheduledAnnouncement> {
    let mut planned: Vec<ScheduledAnnouncement> = rules
        .iter()
        .filter_map(|rule| {
            let Some(lead_time) = rule.lead_time() else {
                warn!(template = %rule.message, "announcement has no lead time, skipping");
                return None;
            };
            let fire_at = i64::try_from(lead_time.as_secs())
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|offset| reboot_at.checked_sub_signed(offset));
            let Some(fire_at) = fire_at else {
                warn!(
                    template = %rule.message,
                    lead_s = lead_time.as_secs(),
                    "announcement lead time is out of range, skipping"
                );
                return None;
            };
            Some(ScheduledAnnouncement {
                fire_at,
                lead_time,
                message: render_message(&rule.message, lead_time),
            })
        })
        .filter(|a| a.fire_at > now)
        .collect();

    // Stable: equal lead times keep their configured order.
    planned.sort_by(|a, b| b.lead_time.as_secs().cmp(&a.lead_time.as_secs()));
    planned
}

// ── Tests ─────────────────────────────────────────────────────────────────────
