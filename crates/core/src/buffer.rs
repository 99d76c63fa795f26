// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded per-session output buffer.

use std::collections::VecDeque;

/// Default high-water mark (10 MiB).
pub const DEFAULT_HIGH_WATER: usize = 10 * 1024 * 1024;

/// Default low-water mark (8 MiB).
pub const DEFAULT_LOW_WATER: usize = 8 * 1024 * 1024;

/// Append-only sequence of output chunks with a running byte count.
///
/// When an append pushes the total above the high-water mark, the oldest
/// chunks are dropped in one pass until the total is at or below the
/// low-water mark.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    chunks: VecDeque<Vec<u8>>,
    total: usize,
    high_water: usize,
    low_water: usize,
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER)
    }
}

impl OutputBuffer {
    /// A low-water mark above the high-water mark is clamped to it.
    pub fn new(high_water: usize, low_water: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            total: 0,
            high_water,
            low_water: low_water.min(high_water),
        }
    }

    pub fn append(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.total += chunk.len();
        self.chunks.push_back(chunk.to_vec());
        if self.total > self.high_water {
            self.trim();
        }
    }

    /// Replace the whole content, e.g. with a multiplexer capture.
    pub fn replace(&mut self, content: &[u8]) {
        self.chunks.clear();
        self.total = 0;
        self.append(content);
    }

    /// Full concatenation of the retained output.
    pub fn read(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn trim(&mut self) {
        while self.total > self.low_water {
            if self.chunks.len() == 1 {
                // One chunk larger than the low-water mark keeps its newest bytes
                let excess = self.total - self.low_water;
                if let Some(last) = self.chunks.front_mut() {
                    last.drain(..excess);
                }
                self.total = self.low_water;
                break;
            }
            match self.chunks.pop_front() {
                Some(front) => self.total -= front.len(),
                None => break,
            }
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
