//! Challenge scheduler.
//!
//! One task owns both timing relationships:
//!
//! - **Challenge cycle**: every `interval`, challenge all active members and
//!   send each of them a notice.
//! - **Grace sweep**: one `grace` after each committed cycle, demote every
//!   member whose check is still outstanding.
//!
//! Grace deadlines are kept in a queue rather than per-member timers. Each
//! sweep reads the store fresh, so a member who confirmed in time is simply
//! no longer pending when the sweep runs.

use crate::error::{Error, Result};
use crate::notify::{challenge_message, Notifier};
use crate::roster::Roster;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Timing for the challenge cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Time between challenge cycles
    pub interval: Duration,

    /// Time after a cycle during which reconfirmation still counts
    pub grace: Duration,
}

impl ScheduleConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(60 * 60);

    /// Longest interval or grace window accepted.
    pub const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Check that both periods can be scheduled: a non-zero interval and
    /// nothing beyond [`Self::MAX_PERIOD`].
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::InvalidSchedule("interval must be non-zero".into()));
        }
        for (name, period) in [("interval", self.interval), ("grace", self.grace)] {
            if period > Self::MAX_PERIOD || Instant::now().checked_add(period).is_none() {
                return Err(Error::InvalidSchedule(format!(
                    "{} {:?} exceeds {:?}",
                    name,
                    period,
                    Self::MAX_PERIOD
                )));
            }
        }
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            grace: Self::DEFAULT_GRACE,
        }
    }
}

/// Drives challenge cycles and grace sweeps against a roster.
pub struct Scheduler {
    roster: Arc<Roster>,
    notifier: Arc<dyn Notifier>,
    config: ScheduleConfig,
}

impl Scheduler {
    pub fn new(roster: Arc<Roster>, notifier: Arc<dyn Notifier>, config: ScheduleConfig) -> Self {
        Self {
            roster,
            notifier,
            config,
        }
    }

    /// Run one challenge cycle.
    ///
    /// Returns the challenged members, or `None` if the cycle was skipped
    /// because the store could not be read or written. Notices go out after
    /// the new snapshot is stored; a failed notice is logged and dropped.
    pub async fn challenge_cycle(&self) -> Option<Vec<String>> {
        let challenged = match self.roster.challenge().await {
            Ok(challenged) => challenged,
            Err(e) => {
                tracing::warn!("Skipping challenge cycle: {}", e);
                return None;
            }
        };

        tracing::info!("Challenged {} active member(s)", challenged.len());

        for member in &challenged {
            let message = challenge_message(member, self.config.grace);
            if let Err(e) = self.notifier.notify(member, &message) {
                tracing::warn!("Challenge notice for {} not delivered: {}", member, e);
            }
        }

        Some(challenged)
    }

    /// Run one grace sweep.
    ///
    /// Returns the demoted members, or `None` if the sweep was skipped.
    pub async fn grace_sweep(&self) -> Option<Vec<String>> {
        match self.roster.settle().await {
            Ok(demoted) => {
                if !demoted.is_empty() {
                    tracing::info!("Grace elapsed, demoted: {}", demoted.join(", "));
                }
                Some(demoted)
            }
            Err(e) => {
                tracing::warn!("Skipping grace sweep: {}", e);
                None
            }
        }
    }

    /// Spawn the scheduler loop. The first cycle fires one interval from now.
    ///
    /// Fails without spawning anything if the schedule does not validate.
    pub fn start(self) -> Result<SchedulerHandle> {
        self.config.validate()?;
        let (shutdown, rx) = watch::channel(false);
        tracing::info!(
            "Scheduler started (interval {:?}, grace {:?})",
            self.config.interval,
            self.config.grace
        );
        let task = tokio::spawn(self.run(rx));
        Ok(SchedulerHandle { shutdown, task })
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let first = match Instant::now().checked_add(self.config.interval) {
            Some(first) if !self.config.interval.is_zero() => first,
            _ => {
                tracing::error!("Scheduler cannot run with interval {:?}", self.config.interval);
                return;
            }
        };
        let mut ticker = time::interval_at(first, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Deadlines are armed in firing order with a fixed grace, so the
        // front of the queue is always the next one due.
        let mut grace_deadlines: VecDeque<Instant> = VecDeque::new();

        loop {
            let next_grace = grace_deadlines.front().copied();

            tokio::select! {
                _ = shutdown.changed() => break,

                _ = ticker.tick() => {
                    if self.challenge_cycle().await.is_some() {
                        match Instant::now().checked_add(self.config.grace) {
                            Some(deadline) => grace_deadlines.push_back(deadline),
                            None => tracing::warn!("Grace deadline out of range, sweep not armed"),
                        }
                    }
                }

                _ = time::sleep_until(next_grace.unwrap_or_else(Instant::now)), if next_grace.is_some() => {
                    grace_deadlines.pop_front();
                    self.grace_sweep().await;
                }
            }
        }

        if !grace_deadlines.is_empty() {
            tracing::debug!("Dropping {} pending grace sweep(s)", grace_deadlines.len());
        }
        tracing::info!("Scheduler stopped");
    }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for it to exit. Pending grace sweeps are dropped.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Scheduler task failed: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
