// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session ownership.
//!
//! Sessions are owned either by a user in a specific worktree or by a user
//! alone. Quotas are accounted per user regardless of worktree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity used for session lookup and per-user quota accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerKey {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree: Option<PathBuf>,
}

impl OwnerKey {
    /// Owner scoped to a user only.
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            worktree: None,
        }
    }

    /// Owner scoped to a user working in one worktree.
    pub fn worktree(user: impl Into<String>, worktree: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            worktree: Some(worktree.into()),
        }
    }

    /// Whether a session owned by `self` is selected by `filter`.
    ///
    /// A user-only filter selects every session of that user; a worktree
    /// filter selects only sessions in that exact worktree.
    pub fn matches(&self, filter: &OwnerKey) -> bool {
        if self.user != filter.user {
            return false;
        }
        match &filter.worktree {
            None => true,
            Some(path) => self.worktree.as_deref() == Some(path.as_path()),
        }
    }

    pub fn worktree_path(&self) -> Option<&Path> {
        self.worktree.as_deref()
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.worktree {
            Some(path) => write!(f, "{}@{}", self.user, path.display()),
            None => f.write_str(&self.user),
        }
    }
}

#[cfg(test)]
#[path = "owner_tests.rs"]
mod tests;
