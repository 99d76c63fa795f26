// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pseudo-terminal process adapters
//!
//! A [`PtyAdapter`] spawns one process behind a pseudo-terminal and reports
//! its output and exit through a [`PtyEvent`] channel, in the order the
//! process produced them. The returned [`ProcessHandle`] writes, resizes and
//! kills.

mod native;

pub use native::NativePtyAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProcess, FakePtyAdapter, PtyCall};

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use th_core::TerminalSize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from PTY operations
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("working directory {}: {reason}", path.display())]
    WorkingDirectoryInvalid { path: PathBuf, reason: String },
    #[error("executable not found: {0}")]
    ExecutableNotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("resize failed: {0}")]
    ResizeFailed(String),
}

/// Output and exit notifications from a PTY process.
///
/// `Exit` is always the last event for a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    Data(Vec<u8>),
    Exit(Option<i32>),
}

/// What to run inside a new pseudo-terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub size: TerminalSize,
    pub env: Vec<(String, String)>,
}

impl SpawnRequest {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>, size: TerminalSize) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            size,
            env: Vec::new(),
        }
    }

    /// Build a request from a single command string.
    ///
    /// Legacy configuration stores commands as one string with embedded
    /// arguments (`"claude --continue"`). The string is split on whitespace
    /// into executable and arguments; no shell quoting is interpreted.
    pub fn from_command_line(command_line: &str, cwd: impl Into<PathBuf>, size: TerminalSize) -> Self {
        let (program, args) = split_command_line(command_line);
        Self {
            args,
            ..Self::new(program, cwd, size)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// Check that the working directory is usable and the program resolves.
    ///
    /// This is a precondition check only: the directory or binary can still
    /// vanish before the spawn, which callers must handle as a spawn failure.
    /// Returns the resolved program path.
    pub fn verify(&self) -> Result<PathBuf, PtyError> {
        check_working_directory(&self.cwd)?;
        resolve_program(&self.program, self.search_path(), &self.cwd)
    }

    /// PATH as the child will see it
    fn search_path(&self) -> Option<OsString> {
        self.env
            .iter()
            .rev()
            .find(|(key, _)| key == "PATH")
            .map(|(_, value)| OsString::from(value))
            .or_else(|| std::env::var_os("PATH"))
    }
}

/// Split a command string on whitespace into program and arguments.
pub fn split_command_line(command_line: &str) -> (String, Vec<String>) {
    let mut parts = command_line.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_default();
    (program, parts.collect())
}

/// Listing the directory proves it exists and is readable and searchable.
fn check_working_directory(cwd: &Path) -> Result<(), PtyError> {
    if !cwd.is_dir() {
        return Err(PtyError::WorkingDirectoryInvalid {
            path: cwd.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    std::fs::read_dir(cwd)
        .map(|_| ())
        .map_err(|e| PtyError::WorkingDirectoryInvalid {
            path: cwd.to_path_buf(),
            reason: e.to_string(),
        })
}

fn resolve_program(program: &str, path: Option<OsString>, cwd: &Path) -> Result<PathBuf, PtyError> {
    if program.is_empty() {
        return Err(PtyError::ExecutableNotFound("(empty command)".to_string()));
    }
    which::which_in(program, path, cwd)
        .map_err(|_| PtyError::ExecutableNotFound(program.to_string()))
}

/// Control surface of a live PTY process
pub trait ProcessHandle: Send + Sync {
    fn pid(&self) -> Option<u32>;

    fn write(&self, data: &[u8]) -> Result<(), PtyError>;

    fn resize(&self, size: TerminalSize) -> Result<(), PtyError>;

    /// Kill the process. Killing an already-dead process is not an error.
    fn kill(&self);
}

/// Adapter for spawning processes behind a pseudo-terminal
pub trait PtyAdapter: Clone + Send + Sync + 'static {
    /// Spawn a process; its output and exit are sent to `events`.
    fn spawn(
        &self,
        request: SpawnRequest,
        events: mpsc::Sender<PtyEvent>,
    ) -> Result<Box<dyn ProcessHandle>, PtyError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
