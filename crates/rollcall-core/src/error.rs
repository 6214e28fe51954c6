//! Error types for Rollcall.

use thiserror::Error;

/// Result type for Rollcall operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur at the roster's I/O boundary.
///
/// Transitions themselves never fail; everything here comes from the store,
/// from resolving a member identity, or from an unusable schedule.
#[derive(Debug, Error)]
pub enum Error {
    /// Stored snapshot exists but could not be read or decoded
    #[error("Store unreadable: {0}")]
    StoreUnreadable(String),

    /// Snapshot could not be persisted
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// Schedule timing the scheduler cannot run with
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Target identity could not be resolved
    #[error("Couldn't find member: {0}")]
    MemberResolution(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
