//! Member identity resolution.
//!
//! Every roster command resolves its target before touching the store, so
//! an unknown member never causes a partial write.

use crate::error::{Error, Result};
use std::collections::HashSet;

/// Longest identity accepted.
pub const MAX_IDENTITY_LEN: usize = 64;

/// Resolves raw, user-supplied identities to tracked member keys.
pub trait MemberDirectory: Send + Sync {
    fn resolve(&self, raw: &str) -> Result<String>;
}

/// Accepts any well-formed identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenDirectory;

impl MemberDirectory for OpenDirectory {
    fn resolve(&self, raw: &str) -> Result<String> {
        well_formed(raw).map(str::to_string)
    }
}

/// Only resolves members from a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    members: HashSet<String>,
}

impl StaticDirectory {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

impl MemberDirectory for StaticDirectory {
    fn resolve(&self, raw: &str) -> Result<String> {
        let id = well_formed(raw)?;
        if self.members.contains(id) {
            Ok(id.to_string())
        } else {
            Err(Error::MemberResolution(id.to_string()))
        }
    }
}

fn well_formed(raw: &str) -> Result<&str> {
    let id = raw.trim();
    let valid = !id.is_empty()
        && id.len() <= MAX_IDENTITY_LEN
        && !id.chars().any(|c| c.is_whitespace() || c.is_control());
    if valid {
        Ok(id)
    } else {
        Err(Error::MemberResolution(format!("{:?}", raw)))
    }
}
