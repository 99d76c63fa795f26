//! Behavioral specifications for the treehouse session engine.
//!
//! `daemon/` specs are black-box: they run the `thd` binary and check its
//! output, files and exit codes. `session/` specs drive the engine library
//! against real processes in pseudo-terminals (and tmux, when installed).

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// daemon/
#[path = "specs/daemon/help.rs"]
mod daemon_help;
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;

// session/
#[path = "specs/session/pty.rs"]
mod session_pty;
#[path = "specs/session/tmux.rs"]
mod session_tmux;
