// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::mux::{MuxError, MuxSessionInfo, Multiplexer};
use crate::pty::SpawnRequest;
use async_trait::async_trait;
use std::path::Path;
use th_core::TerminalSize;
use tracing::Instrument;

/// Wrapper that adds tracing to any Multiplexer
#[derive(Clone)]
pub struct TracedMultiplexer<M> {
    inner: M,
}

impl<M> TracedMultiplexer<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M: Multiplexer> Multiplexer for TracedMultiplexer<M> {
    async fn probe(&self) -> Result<String, MuxError> {
        let result = self.inner.probe().await;
        match &result {
            Ok(version) => tracing::info!(version = version.as_str(), "multiplexer available"),
            Err(e) => tracing::warn!(error = %e, "multiplexer unavailable"),
        }
        result
    }

    async fn create_detached(
        &self,
        name: &str,
        cwd: &Path,
        size: TerminalSize,
        command_line: &str,
        env: &[(String, String)],
    ) -> Result<(), MuxError> {
        async {
            tracing::info!(command_line, env_count = env.len(), "starting");
            let start = std::time::Instant::now();
            let result = self
                .inner
                .create_detached(name, cwd, size, command_line, env)
                .await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::info!(elapsed_ms, "multiplexer session created"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "create failed"),
            }
            result
        }
        .instrument(tracing::info_span!("mux.create", name, cwd = %cwd.display()))
        .await
    }

    fn attach_request(&self, name: &str, cwd: &Path, size: TerminalSize) -> SpawnRequest {
        tracing::info_span!("mux.attach", name)
            .in_scope(|| tracing::debug!(cols = size.cols, rows = size.rows, "attaching"));
        self.inner.attach_request(name, cwd, size)
    }

    async fn exists(&self, name: &str) -> Result<bool, MuxError> {
        let result = self.inner.exists(name).await;
        tracing::trace!(name, exists = ?result.as_ref().ok(), "checked");
        result
    }

    async fn kill(&self, name: &str) -> Result<(), MuxError> {
        let result = self.inner.kill(name).await;
        tracing::info_span!("mux.kill", name).in_scope(|| match &result {
            Ok(()) => tracing::info!("killed"),
            Err(e) => tracing::warn!(error = %e, "kill failed (may be expected)"),
        });
        result
    }

    async fn list_all(&self, prefix: &str) -> Result<Vec<MuxSessionInfo>, MuxError> {
        let result = self.inner.list_all(prefix).await;
        match &result {
            Ok(sessions) => tracing::debug!(prefix, count = sessions.len(), "listed"),
            Err(e) => tracing::error!(prefix, error = %e, "list failed"),
        }
        result
    }

    async fn capture_buffer(&self, name: &str, max_lines: u32) -> Result<String, MuxError> {
        let start = std::time::Instant::now();
        let result = self.inner.capture_buffer(name, max_lines).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info_span!("mux.capture", name, max_lines).in_scope(|| match &result {
            Ok(text) => tracing::debug!(captured_len = text.len(), elapsed_ms, "captured"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "capture failed"),
        });
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
