// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Treehouse session engine: registry, event bus and history

pub mod backend;
pub mod bus;
pub mod config;
mod error;
pub mod history;
mod registry;
mod ticker;

pub use backend::Persistence;
pub use bus::{EventBus, Subscription, BUS_CAPACITY};
pub use config::EngineConfig;
pub use error::EngineError;
#[cfg(any(test, feature = "test-support"))]
pub use history::{FakeHistory, HistoryCall};
pub use history::{
    HistoryError, HistoryRecorder, HistoryStore, LineKind, NoOpHistory, SessionRecord,
};
pub use registry::{RecoveryReport, RegistryDeps, SessionInfo, SessionRegistry};
pub use ticker::spawn_ticker;
