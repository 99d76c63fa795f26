// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identity, liveness state and terminal geometry.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for an engine session.
    ///
    /// Generated at creation and stable for the session's lifetime, including
    /// across engine restarts for multiplexer-backed sessions (the id is
    /// embedded in the multiplexer session name).
    pub struct SessionId;
}

impl SessionId {
    /// Name of the multiplexer session backing this id under `prefix`.
    pub fn mux_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.0)
    }

    /// Recover an id from a multiplexer session name, if it carries `prefix`.
    pub fn from_mux_name(name: &str, prefix: &str) -> Option<Self> {
        name.strip_prefix(prefix)
            .filter(|id| !id.is_empty())
            .map(Self::new)
    }
}

/// Liveness classification of a session's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing is happening; the agent finished and shows its input box
    Idle,
    /// The agent is producing output or announced it is working
    Busy,
    /// The agent asked a question and is blocked on a decision
    WaitingInput,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Busy => "busy",
            SessionState::WaitingInput => "waiting_input",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 120, rows: 40 }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
