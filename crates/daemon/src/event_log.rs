// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus subscriber that writes session activity to the daemon log.

use th_core::SessionEvent;
use th_engine::Subscription;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Log every event from `events` until the bus closes.
pub fn spawn_event_log(mut events: Subscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
        debug!("event log stopped");
    })
}

pub(crate) fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Created { id, owner, dir } => {
            info!(session_id = %id, %owner, dir = %dir.display(), "session:created")
        }
        SessionEvent::Data { id, bytes } => {
            trace!(session_id = %id, bytes = bytes.len(), "session:data")
        }
        SessionEvent::StateChanged { id, state } => {
            debug!(session_id = %id, state = state.as_str(), "session:state")
        }
        SessionEvent::Exit { id, code } => info!(session_id = %id, ?code, "session:exit"),
        SessionEvent::Destroyed { id } => info!(session_id = %id, "session:destroyed"),
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
