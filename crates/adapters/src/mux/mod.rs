// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal multiplexer adapters
//!
//! A multiplexer keeps named, detached sessions alive independently of the
//! engine process. Every name the engine creates is `<prefix><session id>`,
//! so [`Multiplexer::list_all`] can pick out the engine's own sessions among
//! everything else running on the host.

mod tmux;

pub use tmux::TmuxMultiplexer;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMultiplexer, FakeMuxSession, MuxCall};

use crate::pty::{ProcessHandle, PtyAdapter, PtyEvent, SpawnRequest};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use th_core::sanitize::strip_ansi;
use th_core::TerminalSize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from multiplexer operations
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("multiplexer unavailable: {0}")]
    Unavailable(String),
    #[error("multiplexer session not found: {0}")]
    NotFound(String),
    #[error("multiplexer command failed: {0}")]
    CommandFailed(String),
    #[error("multiplexer spawn failed: {0}")]
    SpawnFailed(String),
    #[error("attach to {name} failed: {reason}")]
    AttachFailed { name: String, reason: String },
}

/// One multiplexer session as reported by [`Multiplexer::list_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxSessionInfo {
    pub name: String,
    pub created_at_ms: u64,
    /// Number of clients currently attached
    pub attached: u32,
}

/// Adapter for a terminal multiplexer (tmux)
#[async_trait]
pub trait Multiplexer: Clone + Send + Sync + 'static {
    /// Check that the multiplexer binary runs; returns its version string
    async fn probe(&self) -> Result<String, MuxError>;

    /// Create a named, detached session running `command_line` in `cwd`.
    ///
    /// Commands that look like development servers are wrapped so the
    /// session drops to a shell instead of vanishing when they exit.
    async fn create_detached(
        &self,
        name: &str,
        cwd: &Path,
        size: TerminalSize,
        command_line: &str,
        env: &[(String, String)],
    ) -> Result<(), MuxError>;

    /// Process that attaches a terminal to `name`, forcing other clients off
    fn attach_request(&self, name: &str, cwd: &Path, size: TerminalSize) -> SpawnRequest;

    async fn exists(&self, name: &str) -> Result<bool, MuxError>;

    /// Kill a named session. A session that is already gone is not an error.
    async fn kill(&self, name: &str) -> Result<(), MuxError>;

    /// List sessions whose name starts with `prefix`
    async fn list_all(&self, prefix: &str) -> Result<Vec<MuxSessionInfo>, MuxError>;

    /// Recent pane contents including escape sequences, wrapped lines joined
    async fn capture_buffer(&self, name: &str, max_lines: u32) -> Result<String, MuxError>;

    /// Attach a local PTY to `name` through `pty`
    fn attach<P: PtyAdapter>(
        &self,
        pty: &P,
        name: &str,
        cwd: &Path,
        size: TerminalSize,
        env: &[(String, String)],
        events: mpsc::Sender<PtyEvent>,
    ) -> Result<Box<dyn ProcessHandle>, MuxError> {
        let request = self.attach_request(name, cwd, size).env(env.iter().cloned());
        pty.spawn(request, events).map_err(|e| MuxError::AttachFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Long-running foreground services that should leave a shell behind
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static DEV_SERVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:",
        r"(?:npm|pnpm|yarn|bun)\s+(?:run\s+)?(?:dev|start|serve)",
        r"|next\s+dev|vite|nodemon|webpack\s+serve",
        r"|rails\s+s(?:erver)?|manage\.py\s+runserver|http\.server",
        r"|cargo\s+watch|flask\s+run|uvicorn",
        r")\b"
    ))
    .expect("constant regex pattern is valid")
});

/// tmux's default status line, e.g. `[th-1] 0:claude* "host" 14:32 05-Mar-26`
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\[[^\]]+\]\s+\d+:\S.*"[^"]*"\s+\d{1,2}:\d{2}\s+\d{1,2}-[A-Za-z]{3}-\d{2}\s*$"#,
    )
    .expect("constant regex pattern is valid")
});

/// Heuristic: does this command start a development server?
pub fn looks_like_dev_server(command_line: &str) -> bool {
    DEV_SERVER.is_match(command_line)
}

/// Wrap `command_line` so the session drops to a shell after it exits
pub fn keepalive_command(command_line: &str) -> String {
    format!("{}; exec \"${{SHELL:-/bin/sh}}\"", command_line)
}

/// Command line to run in a new detached session
pub fn session_command(command_line: &str) -> String {
    if looks_like_dev_server(command_line) {
        keepalive_command(command_line)
    } else {
        command_line.to_string()
    }
}

/// Keep only the last occurrence of the multiplexer's status line.
pub fn collapse_status_lines(captured: &str) -> String {
    let lines: Vec<&str> = captured.split('\n').collect();
    let is_status = |line: &str| STATUS_LINE.is_match(strip_ansi(line).trim_end());
    let Some(last) = lines.iter().rposition(|line| is_status(line)) else {
        return captured.to_string();
    };
    lines
        .iter()
        .enumerate()
        .filter(|(i, line)| *i == last || !is_status(line))
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
