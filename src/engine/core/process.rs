//! Bounded subprocess execution.
//!
//! Every trial encode, decode probe, ffprobe call and download goes through
//! `run_bounded`: the child is hard-killed when the deadline passes or the
//! caller cancels.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared cancellation flag, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Exited {
        success: bool,
        code: Option<i32>,
        stdout: String,
        stderr_tail: String,
    },
    TimedOut,
    Cancelled,
    SpawnFailed(String),
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Exited { success: true, .. })
    }
}

/// Run `cmd` to completion, killing it after `timeout` or on cancellation
pub fn run_bounded(mut cmd: Command, timeout: Duration, cancel: &CancelFlag) -> RunOutcome {
    if cancel.is_cancelled() {
        return RunOutcome::Cancelled;
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return RunOutcome::SpawnFailed(e.to_string()),
    };

    // Drain pipes on their own threads so a chatty child never blocks on a full pipe
    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if cancel.is_cancelled() {
                    kill(&mut child);
                    return RunOutcome::Cancelled;
                }
                if start.elapsed() >= timeout {
                    kill(&mut child);
                    return RunOutcome::TimedOut;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill(&mut child);
                return RunOutcome::SpawnFailed(e.to_string());
            }
        }
    };

    let stdout = join(stdout_reader);
    let stderr = join(stderr_reader);

    RunOutcome::Exited {
        success: status.success(),
        code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr_tail: tail_utf8(&stderr),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut p| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            buf
        })
    })
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

pub fn tail_utf8(buf: &[u8]) -> String {
    const MAX_BYTES: usize = 1200;
    if buf.len() <= MAX_BYTES {
        return String::from_utf8_lossy(buf).to_string();
    }
    let tail = &buf[buf.len().saturating_sub(MAX_BYTES)..];
    String::from_utf8_lossy(tail).to_string()
}
