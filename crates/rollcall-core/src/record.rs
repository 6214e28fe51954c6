//! Presence record - one per tracked member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confirmed presence of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    /// Upper-case label used in listings.
    pub fn label(self) -> &'static str {
        match self {
            Status::Active => "ACTIVE",
            Status::Inactive => "INACTIVE",
        }
    }
}

/// Presence state of a single tracked member.
///
/// Fields are only reachable through transitions, which keep
/// `pending_check` implying [`Status::Inactive`] and only move `joined_at`
/// when the member (re)enters [`Status::Active`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredRecord")]
pub struct PresenceRecord {
    status: Status,
    joined_at: DateTime<Utc>,
    pending_check: bool,
}

/// Wire form of a record, normalized on load.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    status: Status,
    joined_at: DateTime<Utc>,
    #[serde(default)]
    pending_check: bool,
}

impl From<StoredRecord> for PresenceRecord {
    fn from(raw: StoredRecord) -> Self {
        // An outstanding check always means the member is not active.
        let status = if raw.pending_check {
            Status::Inactive
        } else {
            raw.status
        };
        Self {
            status,
            joined_at: raw.joined_at,
            pending_check: raw.pending_check,
        }
    }
}

impl PresenceRecord {
    /// Record for a member who just joined.
    pub fn joined(now: DateTime<Utc>) -> Self {
        Self {
            status: Status::Active,
            joined_at: now,
            pending_check: false,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Last moment the member entered active status.
    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    /// Whether a challenge is outstanding.
    pub fn pending_check(&self) -> bool {
        self.pending_check
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Reconfirm presence. Clears any outstanding check.
    pub fn confirm(&mut self, now: DateTime<Utc>) {
        self.status = Status::Active;
        self.joined_at = now;
        self.pending_check = false;
    }

    /// Issue a challenge. Returns true if the record was active and is now
    /// waiting for reconfirmation.
    pub fn challenge(&mut self) -> bool {
        if self.status != Status::Active {
            return false;
        }
        self.status = Status::Inactive;
        self.pending_check = true;
        true
    }

    /// Close an outstanding check after the grace window.
    /// Returns true if there was a check to close.
    pub fn settle(&mut self) -> bool {
        if !self.pending_check {
            return false;
        }
        self.status = Status::Inactive;
        self.pending_check = false;
        true
    }
}
