// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration knobs and their `TH_*` environment overrides.

use std::time::Duration;
use th_core::buffer::{DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER};
use th_core::DetectorConfig;

/// Tunables for the session engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Live sessions one user may hold at once
    pub max_sessions_per_owner: usize,
    /// Buffer size that triggers trimming
    pub buffer_high_water: usize,
    /// Buffer size trimming brings a session back down to
    pub buffer_low_water: usize,
    /// Silence after a busy marker before forcing `idle`
    pub idle_timer: Duration,
    /// Silence after any output before the tick forces `idle`
    pub idle_threshold: Duration,
    pub tick_interval: Duration,
    /// Multiplexer session names are `<prefix><session id>`
    pub mux_prefix: String,
    /// Use the multiplexer when it is available
    pub persistence: bool,
    pub detector_window_lines: usize,
    /// Lines requested from the multiplexer when capturing a pane
    pub capture_lines: u32,
    /// Timeout for each multiplexer invocation
    pub mux_timeout: Duration,
    /// Environment added to every spawned process
    pub default_env: Vec<(String, String)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_owner: 20,
            buffer_high_water: DEFAULT_HIGH_WATER,
            buffer_low_water: DEFAULT_LOW_WATER,
            idle_timer: Duration::from_millis(500),
            idle_threshold: Duration::from_millis(3000),
            tick_interval: Duration::from_millis(500),
            mux_prefix: "th-".to_string(),
            persistence: true,
            detector_window_lines: 200,
            capture_lines: 2000,
            mux_timeout: Duration::from_secs(10),
            default_env: vec![
                ("TERM".to_string(), "xterm-256color".to_string()),
                ("COLORTERM".to_string(), "truecolor".to_string()),
            ],
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `TH_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`. Unparseable values are
    /// ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let number = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let millis = |key: &str| number(key).map(Duration::from_millis);

        if let Some(n) = number("TH_MAX_SESSIONS") {
            config.max_sessions_per_owner = n as usize;
        }
        if let Some(n) = number("TH_BUFFER_HIGH_BYTES") {
            config.buffer_high_water = n as usize;
        }
        if let Some(n) = number("TH_BUFFER_LOW_BYTES") {
            config.buffer_low_water = n as usize;
        }
        if let Some(d) = millis("TH_IDLE_TIMER_MS") {
            config.idle_timer = d;
        }
        if let Some(d) = millis("TH_IDLE_THRESHOLD_MS") {
            config.idle_threshold = d;
        }
        if let Some(d) = millis("TH_TICK_MS").filter(|d| !d.is_zero()) {
            config.tick_interval = d;
        }
        if let Some(d) = millis("TH_MUX_TIMEOUT_MS").filter(|d| !d.is_zero()) {
            config.mux_timeout = d;
        }
        if let Some(prefix) = lookup("TH_MUX_PREFIX").filter(|s| !s.is_empty()) {
            config.mux_prefix = prefix;
        }
        if let Some(enabled) = lookup("TH_PERSISTENCE").and_then(|s| parse_bool(&s)) {
            config.persistence = enabled;
        }

        config.buffer_low_water = config.buffer_low_water.min(config.buffer_high_water);
        config
    }

    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            idle_timer: self.idle_timer,
            idle_threshold: self.idle_threshold,
            window_lines: self.detector_window_lines,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
