// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session history persistence.
//!
//! History is best-effort relative to the live session: the registry queues
//! writes to a [`HistoryRecorder`] without waiting, a background worker
//! applies them to a [`HistoryStore`], and failures are logged and dropped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use th_core::{OwnerKey, SessionId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Pending writes the recorder holds before it starts dropping
pub const HISTORY_QUEUE: usize = 1024;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history io: {0}")]
    Io(#[from] std::io::Error),
    #[error("history encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// Which side of the terminal a history line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Output,
    Input,
}

/// Persisted metadata of a session that has not been closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub owner: OwnerKey,
    pub dir: PathBuf,
    pub command: String,
    pub created_at_ms: u64,
}

/// Storage for session history
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    async fn record_create(&self, record: &SessionRecord) -> Result<(), HistoryError>;

    async fn append_line(
        &self,
        id: &SessionId,
        content: &str,
        kind: LineKind,
    ) -> Result<(), HistoryError>;

    async fn record_close(&self, id: &SessionId, exit_code: Option<i32>)
        -> Result<(), HistoryError>;

    /// Sessions created and not yet closed
    async fn active_sessions(&self) -> Result<Vec<SessionRecord>, HistoryError>;
}

/// History store that keeps nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpHistory;

#[async_trait]
impl HistoryStore for NoOpHistory {
    async fn record_create(&self, _record: &SessionRecord) -> Result<(), HistoryError> {
        Ok(())
    }

    async fn append_line(
        &self,
        _id: &SessionId,
        _content: &str,
        _kind: LineKind,
    ) -> Result<(), HistoryError> {
        Ok(())
    }

    async fn record_close(
        &self,
        _id: &SessionId,
        _exit_code: Option<i32>,
    ) -> Result<(), HistoryError> {
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<SessionRecord>, HistoryError> {
        Ok(Vec::new())
    }
}

enum HistoryOp {
    Create(SessionRecord),
    Line {
        id: SessionId,
        content: String,
        kind: LineKind,
    },
    Close {
        id: SessionId,
        exit_code: Option<i32>,
    },
    Flush(oneshot::Sender<()>),
}

/// Non-blocking handle that queues history writes for a background worker.
#[derive(Clone)]
pub struct HistoryRecorder {
    tx: Option<mpsc::Sender<HistoryOp>>,
}

impl HistoryRecorder {
    /// Start a worker applying writes to `store`.
    ///
    /// The worker ends once every recorder clone is dropped and the queue
    /// has drained.
    pub fn spawn<H: HistoryStore>(store: Arc<H>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(HISTORY_QUEUE);
        let worker = tokio::spawn(run_worker(store, rx));
        (Self { tx: Some(tx) }, worker)
    }

    /// A recorder that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn record_create(&self, record: SessionRecord) {
        self.submit(HistoryOp::Create(record));
    }

    pub fn append_line(&self, id: &SessionId, content: String, kind: LineKind) {
        self.submit(HistoryOp::Line {
            id: id.clone(),
            content,
            kind,
        });
    }

    pub fn record_close(&self, id: &SessionId, exit_code: Option<i32>) {
        self.submit(HistoryOp::Close {
            id: id.clone(),
            exit_code,
        });
    }

    /// Wait until every write queued so far has been applied.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(HistoryOp::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    fn submit(&self, op: HistoryOp) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(op) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("history queue full, dropping write");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("history worker stopped, dropping write");
            }
        }
    }
}

async fn run_worker<H: HistoryStore>(store: Arc<H>, mut rx: mpsc::Receiver<HistoryOp>) {
    while let Some(op) = rx.recv().await {
        let (what, result) = match op {
            HistoryOp::Create(record) => ("create", store.record_create(&record).await),
            HistoryOp::Line { id, content, kind } => {
                ("line", store.append_line(&id, &content, kind).await)
            }
            HistoryOp::Close { id, exit_code } => ("close", store.record_close(&id, exit_code).await),
            HistoryOp::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        if let Err(e) = result {
            tracing::warn!(op = what, error = %e, "history write failed");
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeHistory, HistoryCall};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::*;
    use parking_lot::Mutex;

    /// Recorded history call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum HistoryCall {
        Create(SessionRecord),
        Line {
            id: SessionId,
            content: String,
            kind: LineKind,
        },
        Close {
            id: SessionId,
            exit_code: Option<i32>,
        },
    }

    #[derive(Default)]
    struct FakeHistoryState {
        calls: Vec<HistoryCall>,
        active: Vec<SessionRecord>,
        failing: bool,
    }

    /// In-memory history store for testing
    #[derive(Clone, Default)]
    pub struct FakeHistory {
        inner: Arc<Mutex<FakeHistoryState>>,
    }

    impl FakeHistory {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<HistoryCall> {
            self.inner.lock().calls.clone()
        }

        /// Seed a session left active by an earlier run
        pub fn add_active(&self, record: SessionRecord) {
            self.inner.lock().active.push(record);
        }

        /// Make every write fail
        pub fn set_failing(&self, failing: bool) {
            self.inner.lock().failing = failing;
        }

        fn check(&self) -> Result<(), HistoryError> {
            if self.inner.lock().failing {
                return Err(HistoryError::Unavailable("disk full".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl HistoryStore for FakeHistory {
        async fn record_create(&self, record: &SessionRecord) -> Result<(), HistoryError> {
            self.check()?;
            let mut inner = self.inner.lock();
            inner.calls.push(HistoryCall::Create(record.clone()));
            inner.active.push(record.clone());
            Ok(())
        }

        async fn append_line(
            &self,
            id: &SessionId,
            content: &str,
            kind: LineKind,
        ) -> Result<(), HistoryError> {
            self.check()?;
            self.inner.lock().calls.push(HistoryCall::Line {
                id: id.clone(),
                content: content.to_string(),
                kind,
            });
            Ok(())
        }

        async fn record_close(
            &self,
            id: &SessionId,
            exit_code: Option<i32>,
        ) -> Result<(), HistoryError> {
            self.check()?;
            let mut inner = self.inner.lock();
            inner.calls.push(HistoryCall::Close {
                id: id.clone(),
                exit_code,
            });
            inner.active.retain(|r| &r.id != id);
            Ok(())
        }

        async fn active_sessions(&self) -> Result<Vec<SessionRecord>, HistoryError> {
            self.check()?;
            Ok(self.inner.lock().active.clone())
        }
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
