// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness state machine over a session's terminal output.
//!
//! Each chunk is reduced to plain text and classified, in priority order:
//!
//! 1. decorative-only (input box plus known status banners): ignored
//! 2. waiting marker (question phrasing, bare trailing prompt): `waiting_input`
//! 3. lone box bottom border while waiting: stays `waiting_input`
//! 4. busy marker ("esc to interrupt"): `busy`, arms the idle timer
//! 5. box corners: an open box is still being drawn (`busy`); a closed box
//!    resolves to `waiting_input` if it holds a question, else `idle`
//! 6. any other output: `busy`
//!
//! Silence is handled by two independent idle paths: the idle timer armed by
//! a busy marker, and a wall-clock threshold checked on every tick. Whichever
//! fires first moves the session to `idle` and clears the other.

use crate::sanitize::strip_ansi;
use crate::session::SessionState;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

const BOX_TOP_LEFT: char = '╭';
const BOX_BOTTOM_LEFT: char = '╰';
const BOX_SIDE: char = '│';
const BOX_RULE: char = '─';
const PROMPT_CHARS: [&str; 2] = [">", "❯"];

// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
static BUSY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:esc|ctrl\+c) to interrupt\b").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static WAITING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)do you want|would you like|\(y/n\)|\[y/n\]|\(yes/no\)|continue\?|proceed\?|enter your|press enter to|select an option|allow\?",
    )
    .expect("constant regex pattern is valid")
});

/// Status lines the agent redraws without any change in what it is doing.
#[allow(clippy::expect_used)]
static DECORATIVE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\? for shortcuts|update available|auto-update|update installed|run /upgrade|shift\+tab to cycle|auto-accept edits|plan mode on|bypass permissions on",
    )
    .expect("constant regex pattern is valid")
});

/// Detector tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Silence after a busy marker before the idle timer fires
    pub idle_timer: Duration,
    /// Silence after any output before the tick forces `idle`
    pub idle_threshold: Duration,
    /// Capacity of the rolling window of recent lines
    pub window_lines: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            idle_timer: Duration::from_millis(500),
            idle_threshold: Duration::from_millis(3000),
            window_lines: 200,
        }
    }
}

/// A pending idle timer.
///
/// The owner schedules a wake-up at `deadline` and hands the token back to
/// [`StateDetector::fire_idle_timer`]. Re-arming or cancelling invalidates the
/// token, so a stale wake-up is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleTimer {
    pub token: u64,
    pub deadline: Instant,
}

/// Outcome of feeding one chunk to the detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation {
    /// New state, only when it differs from the previous one
    pub transition: Option<SessionState>,
    /// Timer the owner must schedule, when one was (re-)armed
    pub armed: Option<IdleTimer>,
}

/// Per-session detector bookkeeping. Owned by exactly one session.
#[derive(Debug, Clone)]
pub struct StateDetector {
    config: DetectorConfig,
    state: SessionState,
    window: VecDeque<String>,
    last_output_at: Instant,
    idle_timer: Option<IdleTimer>,
    next_token: u64,
}

impl StateDetector {
    /// A fresh session is assumed busy until proven otherwise.
    pub fn new(config: DetectorConfig, now: Instant) -> Self {
        Self {
            config,
            state: SessionState::Busy,
            window: VecDeque::with_capacity(config.window_lines.min(256)),
            last_output_at: now,
            idle_timer: None,
            next_token: 1,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn idle_timer(&self) -> Option<IdleTimer> {
        self.idle_timer
    }

    pub fn last_output_at(&self) -> Instant {
        self.last_output_at
    }

    pub fn recent_lines(&self) -> impl Iterator<Item = &str> {
        self.window.iter().map(String::as_str)
    }

    /// Feed a sanitized output chunk.
    pub fn observe(&mut self, chunk: &[u8], now: Instant) -> Observation {
        let text = strip_ansi(&String::from_utf8_lossy(chunk));
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        // Pure cursor movement or whitespace carries no signal
        if lines.is_empty() || is_decorative_only(&lines) {
            return Observation::default();
        }

        self.push_lines(&lines);
        self.last_output_at = now;

        if has_waiting_marker(&lines) {
            self.idle_timer = None;
            return self.settle(SessionState::WaitingInput);
        }

        if self.state == SessionState::WaitingInput && is_bottom_border_only(&lines) {
            return Observation::default();
        }

        if lines.iter().any(|line| BUSY_MARKER.is_match(line)) {
            let armed = self.arm_idle_timer(now);
            return Observation {
                armed: Some(armed),
                ..self.settle(SessionState::Busy)
            };
        }

        let closes_box = lines.iter().any(|line| line.starts_with(BOX_BOTTOM_LEFT));
        if closes_box {
            self.idle_timer = None;
            return if self.closed_box_asks_question() {
                self.settle(SessionState::WaitingInput)
            } else {
                self.settle(SessionState::Idle)
            };
        }

        // Any other output, including an open box still being drawn
        let armed = self.idle_timer.is_some().then(|| self.arm_idle_timer(now));
        Observation {
            armed,
            ..self.settle(SessionState::Busy)
        }
    }

    /// Idle timer wake-up. Only the currently armed token has any effect.
    pub fn fire_idle_timer(&mut self, token: u64) -> Option<SessionState> {
        match self.idle_timer {
            Some(timer) if timer.token == token => {
                self.idle_timer = None;
                self.settle(SessionState::Idle).transition
            }
            _ => None,
        }
    }

    /// Periodic wall-clock check. Pure comparison, no I/O.
    pub fn tick(&mut self, now: Instant) -> Option<SessionState> {
        if self.state != SessionState::Busy {
            return None;
        }
        if now.saturating_duration_since(self.last_output_at) < self.config.idle_threshold {
            return None;
        }
        self.idle_timer = None;
        self.settle(SessionState::Idle).transition
    }

    /// Drop any pending idle timer (session teardown).
    pub fn cancel_idle_timer(&mut self) {
        self.idle_timer = None;
    }

    fn settle(&mut self, state: SessionState) -> Observation {
        if self.state == state {
            return Observation::default();
        }
        self.state = state;
        Observation {
            transition: Some(state),
            armed: None,
        }
    }

    /// Setting a new timer always replaces the previous one.
    fn arm_idle_timer(&mut self, now: Instant) -> IdleTimer {
        let timer = IdleTimer {
            token: self.next_token,
            deadline: now + self.config.idle_timer,
        };
        self.next_token += 1;
        self.idle_timer = Some(timer);
        timer
    }

    fn push_lines(&mut self, lines: &[&str]) {
        for line in lines {
            if self.window.len() >= self.config.window_lines.max(1) {
                self.window.pop_front();
            }
            self.window.push_back((*line).to_string());
        }
    }

    /// Whether the box ending at the newest bottom border contains a question.
    fn closed_box_asks_question(&self) -> bool {
        let Some(bottom) = self
            .window
            .iter()
            .rposition(|line| line.starts_with(BOX_BOTTOM_LEFT))
        else {
            return false;
        };
        let top = self
            .window
            .iter()
            .take(bottom)
            .rposition(|line| line.starts_with(BOX_TOP_LEFT))
            .unwrap_or(bottom);
        self.window
            .range(top..=bottom)
            .any(|line| WAITING_MARKER.is_match(line))
    }
}

fn has_waiting_marker(lines: &[&str]) -> bool {
    let trailing_prompt = lines
        .last()
        .is_some_and(|last| PROMPT_CHARS.contains(last));
    trailing_prompt || lines.iter().any(|line| WAITING_MARKER.is_match(line))
}

fn is_box_part(line: &str) -> bool {
    line.starts_with(BOX_TOP_LEFT)
        || line.starts_with(BOX_BOTTOM_LEFT)
        || line.starts_with(BOX_SIDE)
        || line.chars().all(|c| c == BOX_RULE)
}

fn is_decorative_line(line: &str) -> bool {
    DECORATIVE_LINE.is_match(line) && !BUSY_MARKER.is_match(line)
}

/// Only box parts and known banners, with at least one banner. A bare box is
/// a real signal (the agent finished drawing its input prompt).
fn is_decorative_only(lines: &[&str]) -> bool {
    let box_free_of_questions = lines
        .iter()
        .filter(|line| is_box_part(line))
        .all(|line| !WAITING_MARKER.is_match(line));
    box_free_of_questions
        && lines.iter().any(|line| is_decorative_line(line))
        && lines
            .iter()
            .all(|line| is_box_part(line) || is_decorative_line(line))
}

fn is_bottom_border_only(lines: &[&str]) -> bool {
    lines.iter().all(|line| line.starts_with(BOX_BOTTOM_LEFT))
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
