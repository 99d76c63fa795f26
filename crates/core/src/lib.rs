// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! th-core: pure building blocks of the treehouse session engine
//!
//! Nothing in this crate performs I/O: output sanitization, liveness
//! detection and output buffering are plain functions and state machines
//! driven by the engine.

pub mod buffer;
pub mod clock;
pub mod detector;
pub mod event;
pub mod id;
pub mod owner;
pub mod sanitize;
pub mod session;

pub use buffer::OutputBuffer;
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use clock::{Clock, SystemClock};
pub use detector::{DetectorConfig, IdleTimer, Observation, StateDetector};
pub use event::SessionEvent;
#[cfg(any(test, feature = "test-support"))]
pub use id::SequentialIdGen;
pub use id::{IdGen, UuidIdGen};
pub use owner::OwnerKey;
pub use session::{SessionId, SessionState, TerminalSize};
