// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake PTY adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProcessHandle, PtyAdapter, PtyError, PtyEvent, SpawnRequest};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use th_core::TerminalSize;
use tokio::sync::mpsc;

/// Recorded PTY call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyCall {
    Spawn { request: SpawnRequest },
    Write { pid: u32, data: Vec<u8> },
    Resize { pid: u32, size: TerminalSize },
    Kill { pid: u32 },
}

/// Fake process state
#[derive(Debug, Clone)]
pub struct FakeProcess {
    pub request: SpawnRequest,
    pub size: TerminalSize,
    pub written: Vec<u8>,
    pub alive: bool,
}

struct FakePtyState {
    processes: HashMap<u32, FakeProcess>,
    senders: HashMap<u32, mpsc::Sender<PtyEvent>>,
    calls: Vec<PtyCall>,
    next_pid: u32,
    fail_next_spawn: Option<PtyError>,
    check_preconditions: bool,
}

/// Fake PTY adapter for testing
///
/// Spawned processes never produce output on their own; tests drive them
/// with [`FakePtyAdapter::emit`] and [`FakePtyAdapter::exit`].
#[derive(Clone)]
pub struct FakePtyAdapter {
    inner: Arc<Mutex<FakePtyState>>,
}

impl Default for FakePtyAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakePtyState {
                processes: HashMap::new(),
                senders: HashMap::new(),
                calls: Vec::new(),
                next_pid: 1000,
                fail_next_spawn: None,
                check_preconditions: false,
            })),
        }
    }
}

impl FakePtyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the real working-directory and executable checks on spawn
    pub fn with_preconditions(self) -> Self {
        self.inner.lock().check_preconditions = true;
        self
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<PtyCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of spawn calls, successful or not
    pub fn spawn_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, PtyCall::Spawn { .. }))
            .count()
    }

    /// Get a process by pid
    pub fn process(&self, pid: u32) -> Option<FakeProcess> {
        self.inner.lock().processes.get(&pid).cloned()
    }

    /// Pid of the most recent successful spawn
    pub fn last_pid(&self) -> Option<u32> {
        self.inner.lock().processes.keys().max().copied()
    }

    /// Make the next spawn fail with `error`
    pub fn fail_next_spawn(&self, error: PtyError) {
        self.inner.lock().fail_next_spawn = Some(error);
    }

    /// Deliver output from a process. Returns false if it is not running.
    pub async fn emit(&self, pid: u32, bytes: impl Into<Vec<u8>>) -> bool {
        let sender = self.inner.lock().senders.get(&pid).cloned();
        match sender {
            Some(tx) => tx.send(PtyEvent::Data(bytes.into())).await.is_ok(),
            None => false,
        }
    }

    /// Terminate a process with the given exit code
    pub async fn exit(&self, pid: u32, code: Option<i32>) -> bool {
        let sender = {
            let mut inner = self.inner.lock();
            if let Some(process) = inner.processes.get_mut(&pid) {
                process.alive = false;
            }
            inner.senders.remove(&pid)
        };
        match sender {
            Some(tx) => tx.send(PtyEvent::Exit(code)).await.is_ok(),
            None => false,
        }
    }
}

impl PtyAdapter for FakePtyAdapter {
    fn spawn(
        &self,
        request: SpawnRequest,
        events: mpsc::Sender<PtyEvent>,
    ) -> Result<Box<dyn ProcessHandle>, PtyError> {
        let mut inner = self.inner.lock();

        inner.calls.push(PtyCall::Spawn {
            request: request.clone(),
        });

        if let Some(error) = inner.fail_next_spawn.take() {
            return Err(error);
        }
        if inner.check_preconditions {
            request.verify()?;
        }

        inner.next_pid += 1;
        let pid = inner.next_pid;

        inner.processes.insert(
            pid,
            FakeProcess {
                size: request.size,
                request,
                written: Vec::new(),
                alive: true,
            },
        );
        inner.senders.insert(pid, events);

        Ok(Box::new(FakeHandle {
            pid,
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct FakeHandle {
    pid: u32,
    inner: Arc<Mutex<FakePtyState>>,
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PtyCall::Write {
            pid: self.pid,
            data: data.to_vec(),
        });
        match inner.processes.get_mut(&self.pid) {
            Some(process) if process.alive => {
                process.written.extend_from_slice(data);
                Ok(())
            }
            _ => Err(PtyError::WriteFailed("process has exited".to_string())),
        }
    }

    fn resize(&self, size: TerminalSize) -> Result<(), PtyError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PtyCall::Resize {
            pid: self.pid,
            size,
        });
        match inner.processes.get_mut(&self.pid) {
            Some(process) if process.alive => {
                process.size = size;
                Ok(())
            }
            _ => Err(PtyError::ResizeFailed("process has exited".to_string())),
        }
    }

    fn kill(&self) {
        let mut inner = self.inner.lock();
        inner.calls.push(PtyCall::Kill { pid: self.pid });
        if let Some(process) = inner.processes.get_mut(&self.pid) {
            process.alive = false;
        }
        if let Some(tx) = inner.senders.remove(&self.pid) {
            let _ = tx.try_send(PtyEvent::Exit(None));
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
