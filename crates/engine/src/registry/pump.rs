// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output pump: drains one attachment's PTY events into its session.

use super::session::Session;
use super::{Inner, SharedSession};
use crate::history::LineKind;
use parking_lot::MutexGuard;
use std::sync::Arc;
use th_adapters::{Multiplexer, PtyAdapter, PtyEvent};
use th_core::sanitize::{clean, strip_ansi};
use th_core::{Clock, IdGen, IdleTimer, SessionEvent, SessionId, SessionState};
use tokio::sync::mpsc;

impl<P, M, C, I> Inner<P, M, C, I>
where
    P: PtyAdapter,
    M: Multiplexer,
    C: Clock,
    I: IdGen,
{
    /// Spawn the task feeding `events` into the session.
    ///
    /// The task belongs to the attachment of the same generation; if that
    /// attachment is already gone the task is left to finish on its own.
    pub(super) fn start_pump(
        self: &Arc<Self>,
        shared: &SharedSession,
        generation: u64,
        mut events: mpsc::Receiver<PtyEvent>,
    ) {
        let inner = Arc::clone(self);
        let session = Arc::clone(shared);
        let task = tokio::spawn(async move {
            let mut exit_code = None;
            while let Some(event) = events.recv().await {
                match event {
                    PtyEvent::Data(bytes) => inner.on_data(&session, generation, &bytes),
                    PtyEvent::Exit(code) => {
                        exit_code = code;
                        break;
                    }
                }
            }
            inner.on_exit(&session, generation, exit_code).await;
        });

        let mut s = shared.lock();
        if let Some(attachment) = s.attachment.as_mut() {
            if attachment.generation == generation {
                attachment.pump = Some(task);
            }
        }
    }

    fn on_data(self: &Arc<Self>, shared: &SharedSession, generation: u64, raw: &[u8]) {
        let chunk = clean(raw);
        if chunk.is_empty() {
            return;
        }

        let id = {
            let mut s = shared.lock();
            if s.closed || s.generation != generation {
                return;
            }
            s.buffer.append(&chunk);
            s.last_activity_at_ms = self.clock.epoch_ms();
            let observation = s.detector.observe(&chunk, self.clock.now());

            self.bus.publish(SessionEvent::Data {
                id: s.id.clone(),
                bytes: chunk.to_vec(),
            });
            if let Some(state) = observation.transition {
                self.publish_state(&s.id, state);
            }

            match observation.armed {
                Some(timer) => self.arm_idle_task(shared, &mut s, timer),
                None if s.detector.idle_timer().is_none() => s.cancel_idle_task(),
                None => {}
            }
            s.id.clone()
        };

        let text = strip_ansi(&String::from_utf8_lossy(&chunk));
        let text = text.trim_end();
        if !text.is_empty() {
            self.history
                .append_line(&id, text.to_string(), LineKind::Output);
        }
    }

    /// Schedule the wake-up for `timer`, replacing any earlier one.
    fn arm_idle_task(
        self: &Arc<Self>,
        shared: &SharedSession,
        s: &mut MutexGuard<'_, Session>,
        timer: IdleTimer,
    ) {
        s.cancel_idle_task();
        let inner = Arc::clone(self);
        let session = Arc::downgrade(shared);
        let delay = timer.deadline.saturating_duration_since(self.clock.now());
        s.idle_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = session.upgrade() else {
                return;
            };
            let mut s = shared.lock();
            if let Some(state) = s.detector.fire_idle_timer(timer.token) {
                s.idle_task = None;
                inner.publish_state(&s.id, state);
            }
        }));
    }

    /// The attachment's event stream ended.
    ///
    /// A multiplexer session that is still alive only loses its local
    /// attachment; anything else is an exit and the session is destroyed.
    async fn on_exit(self: &Arc<Self>, shared: &SharedSession, generation: u64, code: Option<i32>) {
        let (id, persistent) = {
            let s = shared.lock();
            if s.closed || s.generation != generation {
                return;
            }
            (s.id.clone(), s.persistent)
        };

        if persistent {
            if let Some(mux) = self.backend.multiplexer() {
                let name = id.mux_name(&self.config.mux_prefix);
                if matches!(mux.exists(&name).await, Ok(true)) {
                    let mut s = shared.lock();
                    if s.generation == generation {
                        s.generation += 1;
                        s.cancel_idle_task();
                        s.attachment = None;
                    }
                    tracing::info!(session_id = %id, name = %name, "attachment ended, multiplexer session kept");
                    return;
                }
            }
        }

        {
            let mut s = shared.lock();
            if s.closed || s.generation != generation {
                return;
            }
            // Dropping the attachment detaches its pump, which is this task
            s.attachment = None;
        }

        tracing::info!(session_id = %id, ?code, "session process exited");
        self.bus.publish(SessionEvent::Exit {
            id: id.clone(),
            code,
        });
        self.destroy(&id, code).await;
    }

    pub(super) fn publish_state(&self, id: &SessionId, state: SessionState) {
        tracing::debug!(session_id = %id, state = state.as_str(), "state changed");
        self.bus.publish(SessionEvent::StateChanged {
            id: id.clone(),
            state,
        });
    }
}
