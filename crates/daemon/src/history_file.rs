// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSON-lines session history.
//!
//! Each line is one [`HistoryEntry`]. The set of active sessions is rebuilt
//! by replaying creates and closes; malformed lines (a torn final write)
//! are skipped.
//!
//! Once the file grows past its size limit it is compacted: only the
//! `create` records of sessions still open are kept.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use th_core::{Clock, SessionId, SystemClock};
use th_engine::{HistoryError, HistoryStore, LineKind, SessionRecord};

/// Size past which the file is compacted (64 MiB)
pub const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;

/// One line of the history file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HistoryEntry {
    Create(SessionRecord),
    Line {
        id: SessionId,
        content: String,
        kind: LineKind,
        at_ms: u64,
    },
    Close {
        id: SessionId,
        #[serde(default)]
        exit_code: Option<i32>,
        at_ms: u64,
    },
}

struct Writer {
    file: File,
    len: u64,
}

/// History store writing to a single JSON-lines file
pub struct JsonlHistory<C: Clock = SystemClock> {
    path: PathBuf,
    writer: Mutex<Writer>,
    max_bytes: u64,
    clock: C,
}

impl JsonlHistory {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        Self::open_with_clock(path, SystemClock)
    }
}

impl<C: Clock> JsonlHistory<C> {
    pub fn open_with_clock(path: impl Into<PathBuf>, clock: C) -> Result<Self, HistoryError> {
        Self::open_with_limit(path, clock, DEFAULT_MAX_BYTES)
    }

    /// Open `path` for appending, creating it and its parent directory.
    ///
    /// A file already past `max_bytes` is compacted first. A torn final
    /// line is terminated so the next entry starts on a line of its own.
    pub fn open_with_limit(
        path: impl Into<PathBuf>,
        clock: C,
        max_bytes: u64,
    ) -> Result<Self, HistoryError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let mut len = file.metadata()?.len();
        if len > 0 && !ends_with_newline(&mut file)? {
            tracing::warn!(path = %path.display(), "history ends in a torn line");
            file.write_all(b"\n")?;
            len += 1;
        }

        let history = Self {
            path,
            writer: Mutex::new(Writer { file, len }),
            max_bytes,
            clock,
        };
        if len > max_bytes {
            let mut writer = history.writer.lock();
            history.compact_locked(&mut writer)?;
        }
        Ok(history)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry in the file, in write order
    pub fn entries(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        read_entries(&self.path)
    }

    fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut writer = self.writer.lock();
        writer.file.write_all(&line)?;
        writer.len += line.len() as u64;
        if writer.len > self.max_bytes {
            if let Err(e) = self.compact_locked(&mut writer) {
                tracing::warn!(error = %e, "history compaction failed");
            }
        }
        Ok(())
    }

    /// Rewrite the file with only the open sessions' create records.
    fn compact_locked(&self, writer: &mut Writer) -> Result<(), HistoryError> {
        let before = writer.len;
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for record in replay(read_entries(&self.path)?) {
                let mut line = serde_json::to_vec(&HistoryEntry::Create(record))?;
                line.push(b'\n');
                tmp.write_all(&line)?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        writer.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        writer.len = writer.file.metadata()?.len();
        tracing::info!(before, after = writer.len, "history compacted");
        Ok(())
    }
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Parse every line of `path` as raw bytes; a torn multibyte character only
/// costs its own line
fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>, HistoryError> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut entries = Vec::new();
    for (n, line) in content.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(line = n + 1, error = %e, "skipping malformed history line")
            }
        }
    }
    Ok(entries)
}

/// Sessions created and never closed, in creation order
fn replay(entries: Vec<HistoryEntry>) -> Vec<SessionRecord> {
    let mut order = Vec::new();
    let mut active: HashMap<SessionId, SessionRecord> = HashMap::new();
    for entry in entries {
        match entry {
            HistoryEntry::Create(record) => {
                order.push(record.id.clone());
                active.insert(record.id.clone(), record);
            }
            HistoryEntry::Close { id, .. } => {
                active.remove(&id);
            }
            HistoryEntry::Line { .. } => {}
        }
    }
    order.into_iter().filter_map(|id| active.remove(&id)).collect()
}

#[async_trait]
impl<C: Clock> HistoryStore for JsonlHistory<C> {
    async fn record_create(&self, record: &SessionRecord) -> Result<(), HistoryError> {
        self.append(&HistoryEntry::Create(record.clone()))
    }

    async fn append_line(
        &self,
        id: &SessionId,
        content: &str,
        kind: LineKind,
    ) -> Result<(), HistoryError> {
        self.append(&HistoryEntry::Line {
            id: id.clone(),
            content: content.to_string(),
            kind,
            at_ms: self.clock.epoch_ms(),
        })
    }

    async fn record_close(
        &self,
        id: &SessionId,
        exit_code: Option<i32>,
    ) -> Result<(), HistoryError> {
        self.append(&HistoryEntry::Close {
            id: id.clone(),
            exit_code,
            at_ms: self.clock.epoch_ms(),
        })
    }

    async fn active_sessions(&self) -> Result<Vec<SessionRecord>, HistoryError> {
        Ok(replay(self.entries()?))
    }
}

#[cfg(test)]
#[path = "history_file_tests.rs"]
mod tests;
