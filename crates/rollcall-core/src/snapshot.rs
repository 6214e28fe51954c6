//! Roster snapshot and the presence state machine.
//!
//! A [`Snapshot`] is the full identity → record mapping read at the start of
//! one step. Member commands touch a single entry; the scheduler's
//! challenge and grace transitions sweep the whole snapshot at once, so
//! there are no per-member deadlines to track.

use crate::record::PresenceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of a reconfirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Member is active again
    Confirmed,
    /// No record for that identity; nothing changed
    NotTracked,
}

/// Every tracked member and their presence record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    members: BTreeMap<String, PresenceRecord>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, member: &str) -> Option<&PresenceRecord> {
        self.members.get(member)
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains_key(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PresenceRecord)> {
        self.members.iter().map(|(id, record)| (id.as_str(), record))
    }

    /// Start tracking a member as active, replacing any previous record.
    pub fn join(&mut self, member: &str, now: DateTime<Utc>) {
        self.members
            .insert(member.to_string(), PresenceRecord::joined(now));
    }

    /// Stop tracking a member. Removing an untracked member is a no-op.
    pub fn leave(&mut self, member: &str) -> Option<PresenceRecord> {
        self.members.remove(member)
    }

    /// Reconfirm a tracked member.
    pub fn confirm(&mut self, member: &str, now: DateTime<Utc>) -> ConfirmOutcome {
        match self.members.get_mut(member) {
            Some(record) => {
                record.confirm(now);
                ConfirmOutcome::Confirmed
            }
            None => ConfirmOutcome::NotTracked,
        }
    }

    /// Challenge every active member.
    /// Returns the members that were challenged, each owed one notice.
    pub fn challenge_active(&mut self) -> Vec<String> {
        self.members
            .iter_mut()
            .filter_map(|(id, record)| record.challenge().then(|| id.clone()))
            .collect()
    }

    /// Close every outstanding check.
    /// Returns the members that were demoted.
    pub fn settle_pending(&mut self) -> Vec<String> {
        self.members
            .iter_mut()
            .filter_map(|(id, record)| record.settle().then(|| id.clone()))
            .collect()
    }
}

impl FromIterator<(String, PresenceRecord)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, PresenceRecord)>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Status;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn join_then_confirm_is_active() {
        let mut snapshot = Snapshot::new();
        snapshot.join("alice", t0());
        assert_eq!(snapshot.confirm("alice", t0()), ConfirmOutcome::Confirmed);

        let record = snapshot.get("alice").unwrap();
        assert!(record.is_active());
        assert!(!record.pending_check());
    }

    #[test]
    fn join_overwrites_previous_record() {
        let later = t0() + chrono::Duration::hours(2);
        let mut snapshot = Snapshot::new();
        snapshot.join("alice", t0());
        snapshot.challenge_active();
        snapshot.join("alice", later);

        let record = snapshot.get("alice").unwrap();
        assert!(record.is_active());
        assert_eq!(record.joined_at(), later);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn confirm_ghost_is_not_tracked() {
        let mut snapshot = Snapshot::new();
        snapshot.join("alice", t0());
        let before = snapshot.clone();

        assert_eq!(snapshot.confirm("ghost", t0()), ConfirmOutcome::NotTracked);
        assert_eq!(snapshot, before);
    }

    #[test]
    fn leave_is_idempotent() {
        let mut snapshot = Snapshot::new();
        snapshot.join("alice", t0());
        assert!(snapshot.leave("alice").is_some());
        assert!(snapshot.leave("alice").is_none());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn challenge_skips_inactive() {
        let mut snapshot = Snapshot::new();
        snapshot.join("alice", t0());
        snapshot.join("bob", t0());
        assert_eq!(snapshot.challenge_active(), vec!["alice", "bob"]);

        snapshot.confirm("bob", t0());
        assert_eq!(snapshot.challenge_active(), vec!["bob"]);
    }

    #[test]
    fn confirmation_wins_over_grace() {
        let mut snapshot = Snapshot::new();
        snapshot.join("alice", t0());
        snapshot.join("bob", t0());
        snapshot.challenge_active();

        snapshot.confirm("alice", t0() + chrono::Duration::minutes(30));
        assert_eq!(snapshot.settle_pending(), vec!["bob"]);

        assert!(snapshot.get("alice").unwrap().is_active());
        let bob = snapshot.get("bob").unwrap();
        assert_eq!(bob.status(), Status::Inactive);
        assert!(!bob.pending_check());
    }

    #[test]
    fn settle_after_leave_recreates_nothing() {
        let mut snapshot = Snapshot::new();
        snapshot.join("alice", t0());
        snapshot.challenge_active();
        snapshot.leave("alice");

        assert!(snapshot.settle_pending().is_empty());
        assert!(!snapshot.contains("alice"));
    }

    #[test]
    fn snapshot_serializes_as_plain_map() {
        let mut snapshot = Snapshot::new();
        snapshot.join("alice", t0());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["alice"]["status"], "active");
    }

    #[derive(Debug, Clone)]
    enum Event {
        Join(u8),
        Leave(u8),
        Confirm(u8),
        Challenge,
        Grace,
    }

    fn event() -> impl Strategy<Value = Event> {
        prop_oneof![
            (0u8..4).prop_map(Event::Join),
            (0u8..4).prop_map(Event::Leave),
            (0u8..4).prop_map(Event::Confirm),
            Just(Event::Challenge),
            Just(Event::Grace),
        ]
    }

    fn apply(snapshot: &mut Snapshot, event: &Event, now: DateTime<Utc>) {
        match event {
            Event::Join(n) => snapshot.join(&format!("m{n}"), now),
            Event::Leave(n) => {
                snapshot.leave(&format!("m{n}"));
            }
            Event::Confirm(n) => {
                snapshot.confirm(&format!("m{n}"), now);
            }
            Event::Challenge => {
                snapshot.challenge_active();
            }
            Event::Grace => {
                snapshot.settle_pending();
            }
        }
    }

    proptest! {
        #[test]
        fn pending_check_implies_inactive(events in prop::collection::vec(event(), 0..64)) {
            let mut snapshot = Snapshot::new();
            for (i, event) in events.iter().enumerate() {
                apply(&mut snapshot, event, t0() + chrono::Duration::minutes(i as i64));
                for (_, record) in snapshot.iter() {
                    prop_assert!(!record.pending_check() || record.status() == Status::Inactive);
                }
            }
        }

        #[test]
        fn grace_twice_equals_grace_once(events in prop::collection::vec(event(), 0..64)) {
            let mut snapshot = Snapshot::new();
            for event in &events {
                apply(&mut snapshot, event, t0());
            }
            snapshot.settle_pending();
            let once = snapshot.clone();
            prop_assert!(snapshot.settle_pending().is_empty());
            prop_assert_eq!(snapshot, once);
        }

        #[test]
        fn confirm_before_grace_stays_active(events in prop::collection::vec(event(), 0..32)) {
            let mut snapshot = Snapshot::new();
            for event in &events {
                apply(&mut snapshot, event, t0());
            }
            snapshot.join("target", t0());
            snapshot.challenge_active();
            snapshot.confirm("target", t0());
            snapshot.settle_pending();

            let record = snapshot.get("target").unwrap();
            prop_assert!(record.is_active());
            prop_assert!(!record.pending_check());
        }

        #[test]
        fn joined_at_moves_only_when_activated(events in prop::collection::vec(event(), 0..64)) {
            let mut snapshot = Snapshot::new();
            for (i, event) in events.iter().enumerate() {
                let now = t0() + chrono::Duration::minutes(i as i64);
                let before = snapshot.clone();
                apply(&mut snapshot, event, now);
                for (id, record) in snapshot.iter() {
                    if let Some(old) = before.get(id) {
                        if old.joined_at() != record.joined_at() {
                            prop_assert!(record.is_active());
                            prop_assert_eq!(record.joined_at(), now);
                        }
                    }
                }
            }
        }
    }
}
