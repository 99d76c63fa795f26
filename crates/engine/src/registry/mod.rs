// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: the engine's map of live sessions.
//!
//! The table (sessions plus per-user counts) is the only cross-session
//! structure and is locked only by lifecycle calls. Each session sits behind
//! its own lock; its output pump holds the session directly, so the hot data
//! path never touches the table.
//!
//! Lock order is table, then session. Neither lock is held across an await.

mod pump;
mod recovery;
mod session;

pub use recovery::RecoveryReport;
pub use session::SessionInfo;

use crate::backend::Persistence;
use crate::bus::{EventBus, Subscription};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::history::{HistoryRecorder, LineKind, SessionRecord};
use parking_lot::Mutex;
use session::{Attachment, Session};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use th_adapters::mux::collapse_status_lines;
use th_adapters::{Multiplexer, PtyAdapter, PtyEvent, SpawnRequest};
use th_core::{
    Clock, IdGen, OutputBuffer, OwnerKey, SessionEvent, SessionId, StateDetector, SystemClock,
    TerminalSize, UuidIdGen,
};
use tokio::sync::mpsc;

/// PTY events a session may queue before its process is throttled
const PTY_EVENT_QUEUE: usize = 256;

type SharedSession = Arc<Mutex<Session>>;

/// Collaborators the registry drives
pub struct RegistryDeps<P, M, C, I> {
    pub pty: P,
    pub backend: Persistence<M>,
    pub clock: C,
    pub ids: I,
    pub history: HistoryRecorder,
    pub bus: EventBus,
}

/// Registry of live sessions. Cheap to clone; clones share state.
pub struct SessionRegistry<P, M, C = SystemClock, I = UuidIdGen> {
    inner: Arc<Inner<P, M, C, I>>,
}

impl<P, M, C, I> Clone for SessionRegistry<P, M, C, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<P, M, C, I> {
    config: EngineConfig,
    pty: P,
    backend: Persistence<M>,
    clock: C,
    ids: I,
    history: HistoryRecorder,
    bus: EventBus,
    table: Mutex<Table>,
}

struct Entry {
    user: String,
    session: SharedSession,
}

/// Sessions and per-user quota accounting.
///
/// `owned` always equals the number of entries per user; `reserved` counts
/// creations in flight so concurrent creates cannot overshoot the quota.
#[derive(Default)]
struct Table {
    sessions: HashMap<SessionId, Entry>,
    owned: HashMap<String, usize>,
    reserved: HashMap<String, usize>,
}

impl Table {
    fn used(&self, user: &str) -> usize {
        self.owned.get(user).copied().unwrap_or(0) + self.reserved.get(user).copied().unwrap_or(0)
    }

    fn reserve(&mut self, user: &str) {
        *self.reserved.entry(user.to_string()).or_default() += 1;
    }

    fn release(&mut self, user: &str) {
        decrement(&mut self.reserved, user);
    }

    fn insert(&mut self, id: SessionId, user: &str, session: SharedSession) {
        *self.owned.entry(user.to_string()).or_default() += 1;
        self.sessions.insert(
            id,
            Entry {
                user: user.to_string(),
                session,
            },
        );
    }

    fn remove(&mut self, id: &SessionId) -> Option<SharedSession> {
        let entry = self.sessions.remove(id)?;
        decrement(&mut self.owned, &entry.user);
        Some(entry.session)
    }

    fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.get(id).map(|e| Arc::clone(&e.session))
    }

    fn all(&self) -> Vec<SharedSession> {
        self.sessions.values().map(|e| Arc::clone(&e.session)).collect()
    }
}

fn decrement(counts: &mut HashMap<String, usize>, user: &str) {
    if let Some(n) = counts.get_mut(user) {
        *n = n.saturating_sub(1);
        if *n == 0 {
            counts.remove(user);
        }
    }
}

impl<P, M, C, I> SessionRegistry<P, M, C, I>
where
    P: PtyAdapter,
    M: Multiplexer,
    C: Clock,
    I: IdGen,
{
    pub fn new(config: EngineConfig, deps: RegistryDeps<P, M, C, I>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                pty: deps.pty,
                backend: deps.backend,
                clock: deps.clock,
                ids: deps.ids,
                history: deps.history,
                bus: deps.bus,
                table: Mutex::new(Table::default()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn is_persistent(&self) -> bool {
        self.inner.backend.is_persistent()
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn subscribe(&self) -> Subscription {
        self.inner.bus.subscribe()
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.inner.table.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a session running `command` in `cwd`.
    ///
    /// An owner key naming a worktree that already has a session gets that
    /// session back unchanged. Fails without registering anything when the
    /// user is at quota or the process cannot be started.
    pub async fn create(
        &self,
        owner: OwnerKey,
        cwd: impl Into<PathBuf>,
        command: &str,
        size: TerminalSize,
    ) -> Result<SessionInfo, EngineError> {
        let inner = &self.inner;
        let cwd = cwd.into();

        if owner.worktree.is_some() {
            if let Some(existing) = inner.find_by_owner(&owner) {
                tracing::info!(session_id = %existing.id, %owner, "reusing worktree session");
                return Ok(existing);
            }
        }

        {
            let mut table = inner.table.lock();
            let limit = inner.config.max_sessions_per_owner;
            if table.used(&owner.user) >= limit {
                tracing::warn!(%owner, limit, "session quota exceeded");
                return Err(EngineError::SessionQuotaExceeded {
                    user: owner.user.clone(),
                    limit,
                });
            }
            table.reserve(&owner.user);
        }

        let started = inner.start(owner.clone(), cwd, command, size).await;

        let (session, events) = match started {
            Ok(started) => started,
            Err(e) => {
                inner.table.lock().release(&owner.user);
                tracing::error!(%owner, command, error = %e, "create failed");
                return Err(e);
            }
        };

        let id = session.id.clone();
        let generation = session.generation;
        let shared = Arc::new(Mutex::new(session));
        {
            let mut table = inner.table.lock();
            table.release(&owner.user);
            table.insert(id.clone(), &owner.user, Arc::clone(&shared));
        }

        let info = {
            let s = shared.lock();
            inner.bus.publish(SessionEvent::Created {
                id: id.clone(),
                owner: s.owner.clone(),
                dir: s.cwd.clone(),
            });
            inner.history.record_create(SessionRecord {
                id: id.clone(),
                owner: s.owner.clone(),
                dir: s.cwd.clone(),
                command: s.command.clone(),
                created_at_ms: s.created_at_ms,
            });
            s.info()
        };
        inner.start_pump(&shared, generation, events);

        tracing::info!(
            session_id = %id,
            %owner,
            command,
            persistent = info.persistent,
            pid = ?info.pid,
            "session created"
        );
        Ok(info)
    }

    /// Attach a local terminal to a multiplexer-backed session.
    ///
    /// Already-attached sessions are returned as they are. The buffer is
    /// replaced with the multiplexer's capture of the pane.
    pub async fn reattach(
        &self,
        id: &SessionId,
        size: TerminalSize,
    ) -> Result<SessionInfo, EngineError> {
        let shared = self.inner.lookup(id)?;
        self.inner.reattach(&shared, size).await?;
        let info = shared.lock().info();
        Ok(info)
    }

    /// Send input to the session's process, reattaching first if needed.
    pub async fn write(&self, id: &SessionId, data: &[u8]) -> Result<(), EngineError> {
        let shared = self.inner.lookup(id)?;
        self.inner
            .ensure_attached(&shared, None)
            .await
            .map_err(|e| {
                tracing::debug!(session_id = %id, error = %e, "write without a live handle");
                EngineError::WriteToDeadSession(id.clone())
            })?;

        {
            let mut s = shared.lock();
            let Some(attachment) = &s.attachment else {
                return Err(EngineError::WriteToDeadSession(id.clone()));
            };
            attachment.handle.write(data).map_err(|e| {
                tracing::warn!(session_id = %id, error = %e, "write failed");
                EngineError::WriteToDeadSession(id.clone())
            })?;
            s.last_activity_at_ms = self.inner.clock.epoch_ms();
        }

        let text = String::from_utf8_lossy(data);
        if !text.trim().is_empty() {
            self.inner
                .history
                .append_line(id, text.into_owned(), LineKind::Input);
        }
        Ok(())
    }

    /// Resize the session's terminal, reattaching at the new size if needed.
    pub async fn resize(&self, id: &SessionId, cols: u16, rows: u16) -> Result<(), EngineError> {
        let size = TerminalSize::new(cols, rows);
        let shared = self.inner.lookup(id)?;

        let attached = {
            let mut s = shared.lock();
            s.size = size;
            match &s.attachment {
                Some(attachment) => {
                    attachment.handle.resize(size).map_err(|e| {
                        tracing::warn!(session_id = %id, error = %e, "resize failed");
                        EngineError::WriteToDeadSession(id.clone())
                    })?;
                    true
                }
                None => false,
            }
        };

        if !attached {
            self.inner.ensure_attached(&shared, Some(size)).await?;
        }
        Ok(())
    }

    /// Kill the session and release its slot. Unknown ids are a no-op.
    pub async fn destroy(&self, id: &SessionId) {
        self.inner.destroy(id, None).await;
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionInfo> {
        let shared = self.inner.table.lock().get(id)?;
        let info = shared.lock().info();
        Some(info)
    }

    /// Sessions selected by `filter`, oldest first.
    ///
    /// A user-only filter selects all of the user's sessions.
    pub fn list_by_owner(&self, filter: &OwnerKey) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .snapshot()
            .iter()
            .map(|shared| shared.lock().info())
            .filter(|info| info.owner.matches(filter))
            .collect();
        sessions.sort_by(|a, b| {
            (a.created_at_ms, a.id.as_str()).cmp(&(b.created_at_ms, b.id.as_str()))
        });
        sessions
    }

    /// Every registered session, oldest first.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .snapshot()
            .iter()
            .map(|shared| shared.lock().info())
            .collect();
        sessions.sort_by(|a, b| {
            (a.created_at_ms, a.id.as_str()).cmp(&(b.created_at_ms, b.id.as_str()))
        });
        sessions
    }

    /// The session's buffered output.
    ///
    /// A detached multiplexer-backed session with nothing buffered answers
    /// from the multiplexer's capture instead.
    pub async fn get_buffer(&self, id: &SessionId) -> Result<Vec<u8>, EngineError> {
        let inner = &self.inner;
        let shared = inner.lookup(id)?;
        let (buffer, detached) = {
            let s = shared.lock();
            (s.buffer.read(), s.persistent && s.attachment.is_none())
        };
        if !buffer.is_empty() || !detached {
            return Ok(buffer);
        }
        let Some(mux) = inner.backend.multiplexer() else {
            return Ok(buffer);
        };

        let name = id.mux_name(&inner.config.mux_prefix);
        match mux.capture_buffer(&name, inner.config.capture_lines).await {
            Ok(captured) => Ok(collapse_status_lines(&captured).into_bytes()),
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "capture fallback failed");
                Ok(buffer)
            }
        }
    }

    /// Wall-clock idle check across every session. Pure comparisons, no I/O.
    pub fn tick(&self) {
        let now = self.inner.clock.now();
        for shared in self.inner.snapshot() {
            let mut s = shared.lock();
            if let Some(state) = s.detector.tick(now) {
                s.cancel_idle_task();
                self.inner.publish_state(&s.id, state);
            }
        }
    }

    /// Release every session for engine shutdown.
    ///
    /// Plain sessions are destroyed. Multiplexer-backed sessions only lose
    /// their local attachment so the next engine run can recover them.
    pub async fn shutdown(&self) {
        let sessions: Vec<(SessionId, bool)> = self
            .inner
            .snapshot()
            .iter()
            .map(|shared| {
                let s = shared.lock();
                (s.id.clone(), s.persistent)
            })
            .collect();

        for (id, persistent) in sessions {
            if persistent {
                self.inner.detach(&id);
            } else {
                self.inner.destroy(&id, None).await;
            }
        }
    }
}

impl<P, M, C, I> Inner<P, M, C, I>
where
    P: PtyAdapter,
    M: Multiplexer,
    C: Clock,
    I: IdGen,
{
    fn lookup(&self, id: &SessionId) -> Result<SharedSession, EngineError> {
        self.table
            .lock()
            .get(id)
            .ok_or_else(|| EngineError::SessionNotFound(id.clone()))
    }

    fn snapshot(&self) -> Vec<SharedSession> {
        self.table.lock().all()
    }

    fn find_by_owner(&self, owner: &OwnerKey) -> Option<SessionInfo> {
        self.snapshot().iter().find_map(|shared| {
            let s = shared.lock();
            (s.owner == *owner && !s.closed).then(|| s.info())
        })
    }

    fn new_session(
        &self,
        id: SessionId,
        owner: OwnerKey,
        cwd: PathBuf,
        command: &str,
        size: TerminalSize,
        persistent: bool,
        created_at_ms: u64,
    ) -> Session {
        Session {
            id,
            owner,
            cwd,
            command: command.to_string(),
            size,
            persistent,
            created_at_ms,
            last_activity_at_ms: self.clock.epoch_ms(),
            buffer: OutputBuffer::new(self.config.buffer_high_water, self.config.buffer_low_water),
            detector: StateDetector::new(self.config.detector(), self.clock.now()),
            attachment: None,
            idle_task: None,
            generation: 0,
            attach_lock: Arc::new(tokio::sync::Mutex::new(())),
            closed: false,
        }
    }

    /// Start the process for a new session. Nothing is registered here.
    async fn start(
        &self,
        owner: OwnerKey,
        cwd: PathBuf,
        command: &str,
        size: TerminalSize,
    ) -> Result<(Session, mpsc::Receiver<PtyEvent>), EngineError> {
        let id = SessionId::new(self.ids.next());
        let env = &self.config.default_env;
        let request =
            SpawnRequest::from_command_line(command, cwd.clone(), size).env(env.iter().cloned());
        request.verify()?;

        let (tx, rx) = mpsc::channel(PTY_EVENT_QUEUE);
        let (handle, persistent) = match &self.backend {
            Persistence::Plain => (self.pty.spawn(request, tx)?, false),
            Persistence::Multiplexer(mux) => {
                let name = id.mux_name(&self.config.mux_prefix);
                mux.create_detached(&name, &cwd, size, command, env).await?;
                match mux.attach(&self.pty, &name, &cwd, size, env, tx) {
                    Ok(handle) => (handle, true),
                    Err(e) => {
                        if let Err(kill_err) = mux.kill(&name).await {
                            tracing::warn!(
                                session_id = %id,
                                error = %kill_err,
                                "multiplexer kill after failed attach failed"
                            );
                        }
                        return Err(EngineError::SpawnFailed(e.to_string()));
                    }
                }
            }
        };

        let mut session = self.new_session(
            id,
            owner,
            cwd,
            command,
            size,
            persistent,
            self.clock.epoch_ms(),
        );
        session.generation = 1;
        session.attachment = Some(Attachment {
            handle,
            generation: 1,
            pump: None,
        });
        Ok((session, rx))
    }

    /// Reattach when the handle is absent and persistence allows it.
    async fn ensure_attached(
        self: &Arc<Self>,
        shared: &SharedSession,
        size: Option<TerminalSize>,
    ) -> Result<(), EngineError> {
        let (id, current_size, attached, persistent) = {
            let s = shared.lock();
            (s.id.clone(), s.size, s.attachment.is_some(), s.persistent)
        };
        if attached {
            return Ok(());
        }
        if !persistent || !self.backend.is_persistent() {
            return Err(EngineError::WriteToDeadSession(id));
        }
        self.reattach(shared, size.unwrap_or(current_size)).await
    }

    async fn reattach(
        self: &Arc<Self>,
        shared: &SharedSession,
        size: TerminalSize,
    ) -> Result<(), EngineError> {
        let (id, cwd, persistent, attach_lock) = {
            let s = shared.lock();
            if s.attachment.is_some() {
                return Ok(());
            }
            (
                s.id.clone(),
                s.cwd.clone(),
                s.persistent,
                Arc::clone(&s.attach_lock),
            )
        };
        let mux = match self.backend.multiplexer() {
            Some(mux) if persistent => mux,
            _ => return Err(EngineError::reattach(&id, "session is not multiplexer-backed")),
        };

        let _guard = attach_lock.lock().await;
        if shared.lock().attachment.is_some() {
            return Ok(());
        }

        let name = id.mux_name(&self.config.mux_prefix);
        let alive = mux
            .exists(&name)
            .await
            .map_err(|e| EngineError::reattach(&id, e))?;
        if !alive {
            tracing::warn!(session_id = %id, name = %name, "multiplexer session is gone");
            self.destroy(&id, None).await;
            return Err(EngineError::reattach(&id, "multiplexer session is gone"));
        }

        let captured = mux
            .capture_buffer(&name, self.config.capture_lines)
            .await
            .map_err(|e| EngineError::reattach(&id, e))?;

        let (tx, rx) = mpsc::channel(PTY_EVENT_QUEUE);
        let handle = mux
            .attach(&self.pty, &name, &cwd, size, &self.config.default_env, tx)
            .map_err(|e| EngineError::reattach(&id, e))?;

        let generation = {
            let mut s = shared.lock();
            if s.closed {
                drop(s);
                handle.kill();
                return Err(EngineError::reattach(&id, "session was destroyed"));
            }
            s.buffer.replace(collapse_status_lines(&captured).as_bytes());
            s.size = size;
            s.generation += 1;
            let generation = s.generation;
            s.attachment = Some(Attachment {
                handle,
                generation,
                pump: None,
            });
            generation
        };
        self.start_pump(shared, generation, rx);

        tracing::info!(session_id = %id, cols = size.cols, rows = size.rows, "session reattached");
        Ok(())
    }

    /// Remove the session, stop its callbacks, then kill what backs it.
    async fn destroy(&self, id: &SessionId, exit_code: Option<i32>) {
        let Some(shared) = self.table.lock().remove(id) else {
            tracing::debug!(session_id = %id, "destroy of unknown session ignored");
            return;
        };

        let (attachment, persistent) = {
            let mut s = shared.lock();
            s.closed = true;
            s.generation += 1;
            s.detector.cancel_idle_timer();
            s.cancel_idle_task();
            (s.attachment.take(), s.persistent)
        };
        if let Some(attachment) = attachment {
            attachment.close();
        }

        if persistent {
            if let Some(mux) = self.backend.multiplexer() {
                let name = id.mux_name(&self.config.mux_prefix);
                if let Err(e) = mux.kill(&name).await {
                    tracing::warn!(session_id = %id, error = %e, "multiplexer kill failed");
                }
            }
        }

        self.bus.publish(SessionEvent::Destroyed { id: id.clone() });
        self.history.record_close(id, exit_code);
        tracing::info!(session_id = %id, ?exit_code, "session destroyed");
    }

    /// Drop the local attachment, leaving the multiplexer session running.
    fn detach(&self, id: &SessionId) {
        let Some(shared) = self.table.lock().get(id) else {
            return;
        };
        let attachment = {
            let mut s = shared.lock();
            s.generation += 1;
            s.cancel_idle_task();
            s.attachment.take()
        };
        if let Some(attachment) = attachment {
            attachment.close();
            tracing::info!(session_id = %id, "session detached");
        }
    }
}

#[cfg(test)]
#[path = "../registry_tests/mod.rs"]
mod tests;
