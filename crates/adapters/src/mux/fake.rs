// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake multiplexer for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::tmux::attach_command;
use super::{session_command, MuxError, MuxSessionInfo, Multiplexer};
use crate::pty::SpawnRequest;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use th_core::TerminalSize;

/// Recorded multiplexer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxCall {
    Probe,
    CreateDetached {
        name: String,
        cwd: PathBuf,
        size: TerminalSize,
        command_line: String,
        env: Vec<(String, String)>,
    },
    Attach {
        name: String,
    },
    Exists {
        name: String,
    },
    Kill {
        name: String,
    },
    ListAll {
        prefix: String,
    },
    Capture {
        name: String,
        max_lines: u32,
    },
}

/// Fake multiplexer session state
#[derive(Debug, Clone)]
pub struct FakeMuxSession {
    pub cwd: PathBuf,
    pub size: TerminalSize,
    /// Command line as it would run, after dev-server wrapping
    pub command_line: String,
    pub env: Vec<(String, String)>,
    pub created_at_ms: u64,
    /// Screen contents returned by capture
    pub pane: String,
}

struct FakeMuxState {
    sessions: BTreeMap<String, FakeMuxSession>,
    calls: Vec<MuxCall>,
    available: bool,
    fail_next_create: Option<String>,
    clock_ms: u64,
}

/// Fake multiplexer for testing
#[derive(Clone)]
pub struct FakeMultiplexer {
    inner: Arc<Mutex<FakeMuxState>>,
}

impl Default for FakeMultiplexer {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeMuxState {
                sessions: BTreeMap::new(),
                calls: Vec::new(),
                available: true,
                fail_next_create: None,
                clock_ms: 1_700_000_000_000,
            })),
        }
    }
}

impl FakeMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<MuxCall> {
        self.inner.lock().calls.clone()
    }

    /// Get a session by name
    pub fn session(&self, name: &str) -> Option<FakeMuxSession> {
        self.inner.lock().sessions.get(name).cloned()
    }

    pub fn session_names(&self) -> Vec<String> {
        self.inner.lock().sessions.keys().cloned().collect()
    }

    /// Make the binary look missing: probe fails
    pub fn set_unavailable(&self) {
        self.inner.lock().available = false;
    }

    /// Make the next create fail with `stderr`
    pub fn fail_next_create(&self, stderr: &str) {
        self.inner.lock().fail_next_create = Some(stderr.to_string());
    }

    /// Add a session that survived from an earlier engine run
    pub fn add_session(&self, name: &str, cwd: &Path, pane: &str) {
        let mut inner = self.inner.lock();
        inner.clock_ms += 1000;
        let created_at_ms = inner.clock_ms;
        inner.sessions.insert(
            name.to_string(),
            FakeMuxSession {
                cwd: cwd.to_path_buf(),
                size: TerminalSize::default(),
                command_line: String::new(),
                env: Vec::new(),
                created_at_ms,
                pane: pane.to_string(),
            },
        );
    }

    /// Replace a session's screen contents
    pub fn set_pane(&self, name: &str, pane: &str) {
        if let Some(session) = self.inner.lock().sessions.get_mut(name) {
            session.pane = pane.to_string();
        }
    }

    /// Simulate the session ending on its own
    pub fn end_session(&self, name: &str) {
        self.inner.lock().sessions.remove(name);
    }
}

#[async_trait]
impl Multiplexer for FakeMultiplexer {
    async fn probe(&self) -> Result<String, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::Probe);
        if inner.available {
            Ok("tmux 3.4".to_string())
        } else {
            Err(MuxError::Unavailable("tmux: not found".to_string()))
        }
    }

    async fn create_detached(
        &self,
        name: &str,
        cwd: &Path,
        size: TerminalSize,
        command_line: &str,
        env: &[(String, String)],
    ) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();

        inner.calls.push(MuxCall::CreateDetached {
            name: name.to_string(),
            cwd: cwd.to_path_buf(),
            size,
            command_line: command_line.to_string(),
            env: env.to_vec(),
        });

        if let Some(stderr) = inner.fail_next_create.take() {
            return Err(MuxError::SpawnFailed(stderr));
        }

        inner.clock_ms += 1000;
        let created_at_ms = inner.clock_ms;
        inner.sessions.insert(
            name.to_string(),
            FakeMuxSession {
                cwd: cwd.to_path_buf(),
                size,
                command_line: session_command(command_line),
                env: env.to_vec(),
                created_at_ms,
                pane: String::new(),
            },
        );
        Ok(())
    }

    fn attach_request(&self, name: &str, cwd: &Path, size: TerminalSize) -> SpawnRequest {
        self.inner.lock().calls.push(MuxCall::Attach {
            name: name.to_string(),
        });
        attach_command(name, cwd, size)
    }

    async fn exists(&self, name: &str) -> Result<bool, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::Exists {
            name: name.to_string(),
        });
        Ok(inner.sessions.contains_key(name))
    }

    async fn kill(&self, name: &str) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::Kill {
            name: name.to_string(),
        });
        inner.sessions.remove(name);
        Ok(())
    }

    async fn list_all(&self, prefix: &str) -> Result<Vec<MuxSessionInfo>, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::ListAll {
            prefix: prefix.to_string(),
        });
        Ok(inner
            .sessions
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, session)| MuxSessionInfo {
                name: name.clone(),
                created_at_ms: session.created_at_ms,
                attached: 0,
            })
            .collect())
    }

    async fn capture_buffer(&self, name: &str, max_lines: u32) -> Result<String, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::Capture {
            name: name.to_string(),
            max_lines,
        });
        match inner.sessions.get(name) {
            Some(session) => {
                let lines: Vec<&str> = session.pane.split('\n').collect();
                let start = lines.len().saturating_sub(max_lines as usize);
                Ok(lines[start..].join("\n"))
            }
            None => Err(MuxError::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
