// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: TH_STATE_DIR > XDG_STATE_HOME/th > ~/.local/state/th
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    state_dir_from(|key| std::env::var(key).ok())
}

pub(crate) fn state_dir_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = lookup("TH_STATE_DIR").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = lookup("XDG_STATE_HOME").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(xdg).join("th"));
    }
    let home = lookup("HOME").ok_or(LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/th"))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
