//! Roster - the command handler over the snapshot store.
//!
//! Every operation is one read → transition → write step taken under a
//! single lock, so member commands, challenge cycles and grace sweeps never
//! interleave. Member commands fail open (an unreadable store is treated as
//! empty); scheduler steps fail closed and write nothing.

use crate::directory::MemberDirectory;
use crate::error::Result;
use crate::record::PresenceRecord;
use crate::snapshot::{ConfirmOutcome, Snapshot};
use crate::store::Store;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// Shared roster of tracked members.
pub struct Roster {
    store: Mutex<Box<dyn Store>>,
    directory: Box<dyn MemberDirectory>,
}

impl Roster {
    /// Create a roster over a store, resolving members through `directory`.
    pub fn new<S, D>(store: S, directory: D) -> Self
    where
        S: Store + 'static,
        D: MemberDirectory + 'static,
    {
        Self {
            store: Mutex::new(Box::new(store)),
            directory: Box::new(directory),
        }
    }

    /// Start tracking a member as active. Returns the resolved identity.
    pub async fn join(&self, member: &str) -> Result<String> {
        self.join_at(member, Utc::now()).await
    }

    pub async fn join_at(&self, member: &str, now: DateTime<Utc>) -> Result<String> {
        let id = self.directory.resolve(member)?;
        let store = self.store.lock().await;

        let mut snapshot = read_or_empty(&**store);
        snapshot.join(&id, now);
        store.write(&snapshot)?;

        tracing::info!("{} is now active", id);
        Ok(id)
    }

    /// Stop tracking a member. Returns the resolved identity.
    pub async fn leave(&self, member: &str) -> Result<String> {
        let id = self.directory.resolve(member)?;
        let store = self.store.lock().await;

        let mut snapshot = read_or_empty(&**store);
        if snapshot.leave(&id).is_some() {
            store.write(&snapshot)?;
            tracing::info!("{} left the roster", id);
        } else {
            tracing::debug!("{} was not on the roster", id);
        }
        Ok(id)
    }

    /// Reconfirm a member's presence.
    pub async fn confirm(&self, member: &str) -> Result<ConfirmOutcome> {
        self.confirm_at(member, Utc::now()).await
    }

    pub async fn confirm_at(&self, member: &str, now: DateTime<Utc>) -> Result<ConfirmOutcome> {
        let id = self.directory.resolve(member)?;
        let store = self.store.lock().await;

        let mut snapshot = read_or_empty(&**store);
        let outcome = snapshot.confirm(&id, now);
        if outcome == ConfirmOutcome::Confirmed {
            store.write(&snapshot)?;
            tracing::info!("{} is marked as active again", id);
        }
        Ok(outcome)
    }

    /// Tracked members in identity order.
    pub async fn list(&self) -> Vec<(String, PresenceRecord)> {
        let store = self.store.lock().await;
        read_or_empty(&**store)
            .iter()
            .map(|(id, record)| (id.to_string(), record.clone()))
            .collect()
    }

    /// Challenge every active member.
    ///
    /// Returns the challenged members once the new snapshot is stored.
    /// An unreadable store is an error here and nothing is written.
    pub async fn challenge(&self) -> Result<Vec<String>> {
        let store = self.store.lock().await;
        let mut snapshot = store.read()?;
        let challenged = snapshot.challenge_active();
        store.write(&snapshot)?;
        Ok(challenged)
    }

    /// Demote every member whose check is still outstanding.
    ///
    /// Reads the store fresh, so confirmations that landed since the
    /// challenge are respected.
    pub async fn settle(&self) -> Result<Vec<String>> {
        let store = self.store.lock().await;
        let mut snapshot = store.read()?;
        let demoted = snapshot.settle_pending();
        if !demoted.is_empty() {
            store.write(&snapshot)?;
        }
        Ok(demoted)
    }
}

fn read_or_empty(store: &dyn Store) -> Snapshot {
    store.read().unwrap_or_else(|e| {
        tracing::warn!("Treating roster as empty: {}", e);
        Snapshot::new()
    })
}
