// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux multiplexer adapter

use super::{session_command, MuxError, MuxSessionInfo, Multiplexer};
use crate::pty::SpawnRequest;
use crate::subprocess::{run_with_timeout, MUX_TIMEOUT};
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use th_core::TerminalSize;
use tokio::process::Command;

/// Tmux-based multiplexer
#[derive(Clone, Debug)]
pub struct TmuxMultiplexer {
    timeout: Duration,
}

impl Default for TmuxMultiplexer {
    fn default() -> Self {
        Self {
            timeout: MUX_TIMEOUT,
        }
    }
}

impl TmuxMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-invocation timeout for tmux commands
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn tmux(&self, args: &[&str], description: &str) -> Result<Output, MuxError> {
        let mut cmd = Command::new("tmux");
        cmd.args(args);
        run_with_timeout(cmd, self.timeout, description)
            .await
            .map_err(MuxError::CommandFailed)
    }
}

#[async_trait]
impl Multiplexer for TmuxMultiplexer {
    async fn probe(&self) -> Result<String, MuxError> {
        let output = self
            .tmux(&["-V"], "tmux -V")
            .await
            .map_err(|e| MuxError::Unavailable(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MuxError::Unavailable(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn create_detached(
        &self,
        name: &str,
        cwd: &Path,
        size: TerminalSize,
        command_line: &str,
        env: &[(String, String)],
    ) -> Result<(), MuxError> {
        // A leftover session under the same name belongs to a dead engine run
        if self.exists(name).await.unwrap_or(false) {
            tracing::warn!(name, "session already exists, killing first");
            self.kill(name).await?;
        }

        let cols = size.cols.to_string();
        let rows = size.rows.to_string();
        let mut tmux_cmd = Command::new("tmux");
        tmux_cmd
            .args(["new-session", "-d", "-s", name, "-x", &cols, "-y", &rows])
            .arg("-c")
            .arg(cwd);

        for (key, value) in env {
            tmux_cmd.arg("-e").arg(format!("{}={}", key, value));
        }

        tmux_cmd.arg(session_command(command_line));

        let output = run_with_timeout(tmux_cmd, self.timeout, "tmux new-session")
            .await
            .map_err(MuxError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(name, stderr = %stderr, "tmux new-session failed");
            return Err(MuxError::SpawnFailed(stderr.trim().to_string()));
        }

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(name, stderr = %stderr, "tmux new-session stderr (non-fatal)");
        }

        Ok(())
    }

    fn attach_request(&self, name: &str, cwd: &Path, size: TerminalSize) -> SpawnRequest {
        attach_command(name, cwd, size)
    }

    async fn exists(&self, name: &str) -> Result<bool, MuxError> {
        let output = self
            .tmux(&["has-session", "-t", &exact(name)], "tmux has-session")
            .await?;
        Ok(output.status.success())
    }

    async fn kill(&self, name: &str) -> Result<(), MuxError> {
        // Ignore failure: the session might already be gone
        let _ = self
            .tmux(&["kill-session", "-t", &exact(name)], "tmux kill-session")
            .await;
        Ok(())
    }

    async fn list_all(&self, prefix: &str) -> Result<Vec<MuxSessionInfo>, MuxError> {
        let output = self
            .tmux(
                &[
                    "list-sessions",
                    "-F",
                    "#{session_name}\t#{session_created}\t#{session_attached}",
                ],
                "tmux list-sessions",
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // No server means no sessions
            if stderr.contains("no server running") || stderr.contains("error connecting") {
                return Ok(Vec::new());
            }
            return Err(MuxError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(parse_session_list(
            &String::from_utf8_lossy(&output.stdout),
            prefix,
        ))
    }

    async fn capture_buffer(&self, name: &str, max_lines: u32) -> Result<String, MuxError> {
        let start = format!("-{}", max_lines);
        let target = exact_pane(name);
        let output = self
            .tmux(
                &["capture-pane", "-p", "-e", "-J", "-t", &target, "-S", &start],
                "tmux capture-pane",
            )
            .await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// `attach-session -d` detaches every other client: one writer per session
pub(crate) fn attach_command(name: &str, cwd: &Path, size: TerminalSize) -> SpawnRequest {
    SpawnRequest::new("tmux", cwd, size)
        .arg("attach-session")
        .arg("-d")
        .arg("-t")
        .arg(exact(name))
}

/// Exact-match target so `th-1` never resolves to `th-10`
fn exact(name: &str) -> String {
    format!("={}", name)
}

/// Pane target: the active pane of exactly session `name`
pub(crate) fn exact_pane(name: &str) -> String {
    format!("={}:", name)
}

/// Parse `list-sessions` output in `name\tcreated\tattached` format.
///
/// Creation time is reported in seconds; lines that don't parse are skipped.
pub(crate) fn parse_session_list(stdout: &str, prefix: &str) -> Vec<MuxSessionInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next()?;
            if !name.starts_with(prefix) {
                return None;
            }
            let created_secs = fields.next()?.trim().parse::<u64>().ok()?;
            let attached = fields
                .next()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .unwrap_or(0);
            Some(MuxSessionInfo {
                name: name.to_string(),
                created_at_ms: created_secs * 1000,
                attached,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
