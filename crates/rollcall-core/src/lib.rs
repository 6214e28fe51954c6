//! Rollcall Core - Presence tracking for a community roster
//!
//! Members opt in, are periodically challenged to reconfirm that they are
//! still around, and are demoted to inactive when they miss the grace window.
//!
//! # Architecture
//!
//! - **Record**: [`PresenceRecord`] and its per-member transitions
//! - **Snapshot**: the full roster and the batch transitions over it
//! - **Store**: full-replace persistence of a [`Snapshot`]
//! - **Roster**: command handler; one locked read-modify-write per operation
//! - **Scheduler**: challenge cadence plus one-shot grace sweeps
//! - **Notify / Directory**: collaborator seams for notices and identity lookup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rollcall_core::{
//!     BroadcastNotifier, FileStore, Notifier, OpenDirectory, Roster, ScheduleConfig, Scheduler,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let roster = Arc::new(Roster::new(FileStore::open("./rollcall-data")?, OpenDirectory));
//!     let notifier: Arc<dyn Notifier> = Arc::new(BroadcastNotifier::new("checks", 64));
//!
//!     roster.join("alice").await?;
//!
//!     let handle = Scheduler::new(roster, notifier, ScheduleConfig::default()).start()?;
//!     tokio::signal::ctrl_c().await?;
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```

pub mod directory;
pub mod error;
pub mod notify;
pub mod record;
pub mod roster;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use directory::{MemberDirectory, OpenDirectory, StaticDirectory};
pub use error::{Error, Result};
pub use notify::{challenge_message, BroadcastNotifier, Notice, NotifyError, Notifier};
pub use record::{PresenceRecord, Status};
pub use roster::Roster;
pub use scheduler::{ScheduleConfig, Scheduler, SchedulerHandle};
pub use snapshot::{ConfirmOutcome, Snapshot};
pub use store::{FileStore, MemoryStore, Store};
