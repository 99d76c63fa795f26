// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Treehouse Daemon library
//!
//! This module exposes the on-disk session history for use by tools that
//! read it while the daemon is running.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod history_file;

pub use history_file::{HistoryEntry, JsonlHistory};
