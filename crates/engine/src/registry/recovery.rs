// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup reconciliation of multiplexer sessions against history.

use super::SessionRegistry;
use crate::error::EngineError;
use crate::history::SessionRecord;
use std::collections::HashMap;
use std::sync::Arc;
use th_adapters::{Multiplexer, PtyAdapter};
use th_core::{Clock, IdGen, SessionEvent, SessionId};

/// What startup recovery did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Sessions re-registered detached; they attach on first use
    pub restored: Vec<SessionId>,
    /// Multiplexer sessions with our prefix and no history record
    pub orphaned: Vec<String>,
    /// History records whose multiplexer session no longer exists
    pub closed: Vec<SessionId>,
}

impl<P, M, C, I> SessionRegistry<P, M, C, I>
where
    P: PtyAdapter,
    M: Multiplexer,
    C: Clock,
    I: IdGen,
{
    /// Rebuild the table from surviving multiplexer sessions.
    ///
    /// `active` are the sessions history believes are still open. Each one
    /// with a live multiplexer session is registered without an attachment;
    /// the rest are closed in history. Orphaned multiplexer sessions are
    /// reported and left alone.
    pub async fn recover(&self, active: Vec<SessionRecord>) -> Result<RecoveryReport, EngineError> {
        let inner = &self.inner;
        let mut report = RecoveryReport::default();
        let mut pending: HashMap<SessionId, SessionRecord> = active
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let live = match inner.backend.multiplexer() {
            Some(mux) => mux.list_all(&inner.config.mux_prefix).await?,
            None => Vec::new(),
        };

        for mux_session in live {
            let Some(id) = SessionId::from_mux_name(&mux_session.name, &inner.config.mux_prefix)
            else {
                continue;
            };
            let Some(record) = pending.remove(&id) else {
                tracing::warn!(name = %mux_session.name, "orphaned multiplexer session");
                report.orphaned.push(mux_session.name);
                continue;
            };

            let mut session = inner.new_session(
                id.clone(),
                record.owner.clone(),
                record.dir.clone(),
                &record.command,
                Default::default(),
                true,
                record.created_at_ms,
            );
            session.last_activity_at_ms = mux_session.created_at_ms.max(record.created_at_ms);
            let shared = Arc::new(parking_lot::Mutex::new(session));
            inner
                .table
                .lock()
                .insert(id.clone(), &record.owner.user, shared);

            inner.bus.publish(SessionEvent::Created {
                id: id.clone(),
                owner: record.owner,
                dir: record.dir,
            });
            tracing::info!(session_id = %id, name = %mux_session.name, "session restored");
            report.restored.push(id);
        }

        for (id, _) in pending {
            tracing::info!(session_id = %id, "closing session with no multiplexer session");
            inner.history.record_close(&id, None);
            report.closed.push(id);
        }

        report.restored.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        report.closed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        report.orphaned.sort();
        tracing::info!(
            restored = report.restored.len(),
            orphaned = report.orphaned.len(),
            closed = report.closed.len(),
            "recovery complete"
        );
        Ok(report)
    }
}
