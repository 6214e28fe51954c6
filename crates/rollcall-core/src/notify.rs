//! Challenge notices.
//!
//! Delivery is best-effort: the scheduler logs a failed notice and moves on.
//! The state transition it announces is already committed.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Notification delivery failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Nobody is listening on the destination
    #[error("notification channel '{0}' unreachable")]
    Unreachable(String),
}

/// A notice addressed to one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Destination label the notice was posted to
    pub channel: String,
    pub member: String,
    pub message: String,
}

/// Outbound channel for member notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, member: &str, message: &str) -> Result<(), NotifyError>;
}

/// Publishes notices to every current subscriber.
///
/// With no subscribers the notice is dropped and reported unreachable.
pub struct BroadcastNotifier {
    channel: String,
    tx: broadcast::Sender<Notice>,
}

impl BroadcastNotifier {
    /// Create a notifier posting to `channel`, buffering up to `capacity`
    /// notices per slow subscriber.
    pub fn new(channel: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            channel: channel.into(),
            tx,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receive every notice published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, member: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!("[#{}] {}", self.channel, message);
        let notice = Notice {
            channel: self.channel.clone(),
            member: member.to_string(),
            message: message.to_string(),
        };
        self.tx
            .send(notice)
            .map(|_| ())
            .map_err(|_| NotifyError::Unreachable(self.channel.clone()))
    }
}

/// Message asking a member to reconfirm within the grace window.
pub fn challenge_message(member: &str, grace: Duration) -> String {
    format!(
        "{} are you still active? Reply with `rollcall-admin yes` within {}!",
        member,
        describe(grace)
    )
}

fn describe(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (n, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}
