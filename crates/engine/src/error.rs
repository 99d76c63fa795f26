// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the session engine

use std::path::PathBuf;
use th_adapters::{MuxError, PtyError};
use th_core::SessionId;
use thiserror::Error;

/// Errors reported to callers of the session registry.
///
/// Each variant has a stable [`EngineError::kind`] so calling layers can
/// render distinct messages without matching on display text.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("working directory {}: {reason}", path.display())]
    WorkingDirectoryInvalid { path: PathBuf, reason: String },
    #[error("executable not found: {0}")]
    ExecutableNotFound(String),
    #[error("session quota exceeded for {user} (limit {limit})")]
    SessionQuotaExceeded { user: String, limit: usize },
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("multiplexer unavailable: {0}")]
    MultiplexerUnavailable(String),
    #[error("reattach to {id} failed: {reason}")]
    ReattachFailed { id: SessionId, reason: String },
    #[error("session {0} has no live process")]
    WriteToDeadSession(SessionId),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::WorkingDirectoryInvalid { .. } => "working_directory_invalid",
            EngineError::ExecutableNotFound(_) => "executable_not_found",
            EngineError::SessionQuotaExceeded { .. } => "session_quota_exceeded",
            EngineError::SessionNotFound(_) => "session_not_found",
            EngineError::SpawnFailed(_) => "spawn_failed",
            EngineError::MultiplexerUnavailable(_) => "multiplexer_unavailable",
            EngineError::ReattachFailed { .. } => "reattach_failed",
            EngineError::WriteToDeadSession(_) => "write_to_dead_session",
        }
    }

    pub(crate) fn reattach(id: &SessionId, reason: impl ToString) -> Self {
        EngineError::ReattachFailed {
            id: id.clone(),
            reason: reason.to_string(),
        }
    }
}

impl From<PtyError> for EngineError {
    fn from(e: PtyError) -> Self {
        match e {
            PtyError::WorkingDirectoryInvalid { path, reason } => {
                EngineError::WorkingDirectoryInvalid { path, reason }
            }
            PtyError::ExecutableNotFound(program) => EngineError::ExecutableNotFound(program),
            other => EngineError::SpawnFailed(other.to_string()),
        }
    }
}

impl From<MuxError> for EngineError {
    fn from(e: MuxError) -> Self {
        match e {
            MuxError::Unavailable(reason) => EngineError::MultiplexerUnavailable(reason),
            other => EngineError::SpawnFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
