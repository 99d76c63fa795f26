// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session state owned by the registry

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use th_adapters::ProcessHandle;
use th_core::{OutputBuffer, OwnerKey, SessionId, SessionState, StateDetector, TerminalSize};
use tokio::task::JoinHandle;

/// Serializable snapshot of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub owner: OwnerKey,
    pub cwd: PathBuf,
    pub command: String,
    pub state: SessionState,
    /// A local terminal handle is live
    pub attached: bool,
    /// Backed by a multiplexer session that outlives the engine
    pub persistent: bool,
    pub size: TerminalSize,
    pub pid: Option<u32>,
    pub created_at_ms: u64,
    pub last_activity_at_ms: u64,
    pub buffered_bytes: usize,
}

/// A live local terminal handle and the task pumping its events.
pub(crate) struct Attachment {
    pub(crate) handle: Box<dyn ProcessHandle>,
    pub(crate) generation: u64,
    pub(crate) pump: Option<JoinHandle<()>>,
}

impl Attachment {
    /// Stop delivering callbacks, then kill the local process.
    pub(crate) fn close(self) {
        if let Some(pump) = self.pump {
            pump.abort();
        }
        self.handle.kill();
    }
}

pub(crate) struct Session {
    pub(crate) id: SessionId,
    pub(crate) owner: OwnerKey,
    pub(crate) cwd: PathBuf,
    pub(crate) command: String,
    pub(crate) size: TerminalSize,
    pub(crate) persistent: bool,
    pub(crate) created_at_ms: u64,
    pub(crate) last_activity_at_ms: u64,
    pub(crate) buffer: OutputBuffer,
    pub(crate) detector: StateDetector,
    /// `None` for a multiplexer-backed session nobody has attached to yet
    pub(crate) attachment: Option<Attachment>,
    pub(crate) idle_task: Option<JoinHandle<()>>,
    /// Bumped on every attach and on teardown; events from an older
    /// attachment are ignored
    pub(crate) generation: u64,
    /// Serializes reattach attempts
    pub(crate) attach_lock: Arc<tokio::sync::Mutex<()>>,
    pub(crate) closed: bool,
}

impl Session {
    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            owner: self.owner.clone(),
            cwd: self.cwd.clone(),
            command: self.command.clone(),
            state: self.detector.state(),
            attached: self.attachment.is_some(),
            persistent: self.persistent,
            size: self.size,
            pid: self.attachment.as_ref().and_then(|a| a.handle.pid()),
            created_at_ms: self.created_at_ms,
            last_activity_at_ms: self.last_activity_at_ms,
            buffered_bytes: self.buffer.len(),
        }
    }

    /// Drop the pending idle timer task, if any.
    pub(crate) fn cancel_idle_task(&mut self) {
        if let Some(task) = self.idle_task.take() {
            task.abort();
        }
    }
}
