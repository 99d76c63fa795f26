// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Native PTY adapter backed by `portable-pty`

use super::{ProcessHandle, PtyAdapter, PtyError, PtyEvent, SpawnRequest};
use parking_lot::Mutex;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{ErrorKind, Read, Write};
use std::thread;
use th_core::TerminalSize;
use tokio::sync::mpsc;

const READ_BUF_SIZE: usize = 8192;

/// Spawns real processes behind OS pseudo-terminals.
///
/// Each process gets a reader thread (output, then exit) and a waiter thread.
/// Output is pushed with `blocking_send`, so a slow consumer applies
/// backpressure to the process instead of growing memory.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativePtyAdapter;

impl NativePtyAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl PtyAdapter for NativePtyAdapter {
    fn spawn(
        &self,
        request: SpawnRequest,
        events: mpsc::Sender<PtyEvent>,
    ) -> Result<Box<dyn ProcessHandle>, PtyError> {
        let program = request.verify()?;

        let pair = native_pty_system()
            .openpty(pty_size(request.size))
            .map_err(|e| PtyError::SpawnFailed(format!("openpty: {}", e)))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(&request.args);
        cmd.cwd(&request.cwd);
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("{}: {}", request.program, e)))?;
        // Close our copy of the slave so the reader sees EOF when the child exits
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("clone reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("take writer: {}", e)))?;

        let (exit_tx, exit_rx) = std::sync::mpsc::channel::<Option<i32>>();
        thread::Builder::new()
            .name("pty-wait".to_string())
            .spawn(move || {
                let code = child.wait().ok().map(|status| status.exit_code() as i32);
                let _ = exit_tx.send(code);
            })
            .map_err(|e| PtyError::SpawnFailed(format!("waiter thread: {}", e)))?;

        thread::Builder::new()
            .name("pty-read".to_string())
            .spawn(move || pump_output(reader, exit_rx, events))
            .map_err(|e| PtyError::SpawnFailed(format!("reader thread: {}", e)))?;

        tracing::debug!(pid, program = %request.program, "pty process spawned");

        Ok(Box::new(NativeProcess {
            pid,
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            killer: Mutex::new(killer),
        }))
    }
}

/// Forward output until EOF, then the exit code, preserving order.
fn pump_output(
    mut reader: Box<dyn Read + Send>,
    exit_rx: std::sync::mpsc::Receiver<Option<i32>>,
    events: mpsc::Sender<PtyEvent>,
) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if events.blocking_send(PtyEvent::Data(buf[..n].to_vec())).is_err() {
                    // Receiver gone: nobody cares about this process anymore
                    return;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            // EIO is how Linux reports a closed PTY
            Err(_) => break,
        }
    }
    let code = exit_rx.recv().ok().flatten();
    let _ = events.blocking_send(PtyEvent::Exit(code));
}

fn pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

struct NativeProcess {
    pid: Option<u32>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
}

impl ProcessHandle for NativeProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        let mut writer = self.writer.lock();
        writer
            .write_all(data)
            .and_then(|()| writer.flush())
            .map_err(|e| PtyError::WriteFailed(e.to_string()))
    }

    fn resize(&self, size: TerminalSize) -> Result<(), PtyError> {
        self.master
            .lock()
            .resize(pty_size(size))
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))
    }

    fn kill(&self) {
        // Ignore failure: the process may already be dead
        if let Err(e) = self.killer.lock().kill() {
            tracing::trace!(pid = self.pid, error = %e, "kill on exited process");
        }
    }
}

#[cfg(test)]
#[path = "native_tests.rs"]
mod tests;
