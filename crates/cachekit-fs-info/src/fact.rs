//! The tri-state shape every cached filesystem fact takes: present with a
//! value, a positive "did not exist at read time", or a permanently-invalid
//! read recorded only inside a snapshot.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fact<T> {
    Present(T),
    Missing,
    Error,
}

impl<T> Fact<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, Fact::Error)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Fact::Present(v) => Some(v),
            _ => None,
        }
    }
}

/// A file's timestamp fact: `safe_time` is the earliest instant at which
/// `mtime` can be trusted to reflect past writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsEntry {
    pub safe_time: i64,
    pub timestamp: Option<i64>,
}

impl FsEntry {
    /// mtime 0/unknown never becomes stale: treat its safe time as infinite.
    pub const INFINITE_SAFE_TIME: i64 = i64::MAX;
}
