// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events published by the session engine.

use crate::owner::OwnerKey;
use crate::session::{SessionId, SessionState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle, data and state events fanned out to subscribers.
///
/// Serializes with `{"type": "session:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    #[serde(rename = "session:created")]
    Created {
        id: SessionId,
        owner: OwnerKey,
        dir: PathBuf,
    },

    /// Sanitized output chunk, in the order the process produced it
    #[serde(rename = "session:data")]
    Data { id: SessionId, bytes: Vec<u8> },

    #[serde(rename = "session:state")]
    StateChanged { id: SessionId, state: SessionState },

    /// The process exited; `code` is absent when it was killed by a signal
    #[serde(rename = "session:exit")]
    Exit { id: SessionId, code: Option<i32> },

    #[serde(rename = "session:destroyed")]
    Destroyed { id: SessionId },
}

impl SessionEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            SessionEvent::Created { id, .. }
            | SessionEvent::Data { id, .. }
            | SessionEvent::StateChanged { id, .. }
            | SessionEvent::Exit { id, .. }
            | SessionEvent::Destroyed { id } => id,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Created { .. } => "session:created",
            SessionEvent::Data { .. } => "session:data",
            SessionEvent::StateChanged { .. } => "session:state",
            SessionEvent::Exit { .. } => "session:exit",
            SessionEvent::Destroyed { .. } => "session:destroyed",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
