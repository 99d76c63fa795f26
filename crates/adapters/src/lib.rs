// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: pseudo-terminals and the terminal multiplexer

pub mod mux;
pub mod pty;
pub mod subprocess;
pub mod traced;

pub use mux::{Multiplexer, MuxError, MuxSessionInfo, TmuxMultiplexer};
pub use pty::{NativePtyAdapter, ProcessHandle, PtyAdapter, PtyError, PtyEvent, SpawnRequest};
pub use traced::TracedMultiplexer;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use mux::{FakeMultiplexer, FakeMuxSession, MuxCall};
#[cfg(any(test, feature = "test-support"))]
pub use pty::{FakeProcess, FakePtyAdapter, PtyCall};
