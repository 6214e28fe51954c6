//! Member listing entries.

use chrono::{DateTime, Utc};
use rollcall_core::{PresenceRecord, Status};
use serde::{Deserialize, Serialize};

/// One row of the roster listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub member: String,
    pub status: Status,
    pub joined_at: DateTime<Utc>,
    pub pending_check: bool,
}

impl From<(String, PresenceRecord)> for MemberEntry {
    fn from((member, record): (String, PresenceRecord)) -> Self {
        Self {
            member,
            status: record.status(),
            joined_at: record.joined_at(),
            pending_check: record.pending_check(),
        }
    }
}

/// Relative age of a join time, e.g. `12 min ago` or `3 hrs ago`.
pub fn format_since(joined_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - joined_at).num_minutes().max(0);
    if minutes < 60 {
        return format!("{} min ago", minutes);
    }
    let hours = minutes / 60;
    format!("{} hr{} ago", hours, if hours == 1 { "" } else { "s" })
}

/// Render a listing for display.
pub fn render_list(entries: &[MemberEntry], now: DateTime<Utc>) -> String {
    if entries.is_empty() {
        return "No one is active.".to_string();
    }
    let clock = now.format("%H:%M:%S UTC");
    entries
        .iter()
        .map(|entry| {
            let mark = match entry.status {
                Status::Active => "✅",
                Status::Inactive => "❌",
            };
            format!(
                "{} {} — {} ({}, {})",
                mark,
                entry.member,
                entry.status.label(),
                format_since(entry.joined_at, now),
                clock
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
