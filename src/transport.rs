// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The byte channel underneath a Connection.
//
// `Transport` is the seam between the call bridge and whatever carries
// frames to the server process. The bridge only needs "send one frame" and
// "receive one frame, with a timeout"; framing and connection setup belong
// to the implementation.
//
// `pair()` builds an in-process implementation: two bounded FIFO pipes, one
// per direction, each with a read-side and a write-side waiter.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::waiter::Waiter;

/// Frames a pipe holds before senders start blocking.
const PIPE_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// IpcBuffer
// ---------------------------------------------------------------------------

/// One owned frame as it crosses a [`Transport`].
///
/// An empty buffer is what `recv` returns on timeout.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IpcBuffer {
    data: Vec<u8>,
}

impl IpcBuffer {
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl std::fmt::Debug for IpcBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcBuffer")
            .field("len", &self.data.len())
            .finish()
    }
}

impl From<Vec<u8>> for IpcBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A bidirectional frame channel to the server process.
pub trait Transport: Send + Sync {
    /// Send one frame. Returns `Ok(false)` if it could not be queued within
    /// `timeout_ms` (nobody draining the other end), and an error once the
    /// channel is closed.
    fn send(&self, data: &[u8], timeout_ms: u64) -> io::Result<bool>;

    /// Receive one frame. Returns an empty buffer on timeout and an error once
    /// the channel is closed and drained.
    fn recv(&self, timeout_ms: Option<u64>) -> io::Result<IpcBuffer>;

    /// Tear the channel down. Pending and later operations on both ends fail.
    fn close(&self) {}
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "channel closed")
}

// ---------------------------------------------------------------------------
// Pipe: one direction of a loopback pair
// ---------------------------------------------------------------------------

struct Pipe {
    queue: Mutex<VecDeque<IpcBuffer>>,
    rd_waiter: Waiter, // receivers block here when the pipe is empty
    wt_waiter: Waiter, // senders block here when the pipe is full
    closed: AtomicBool,
}

impl Pipe {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            rd_waiter: Waiter::new(),
            wt_waiter: Waiter::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn push(&self, data: &[u8], timeout_ms: u64) -> io::Result<bool> {
        if data.is_empty() {
            return Ok(false);
        }
        if self.is_closed() {
            return Err(closed_error());
        }

        let ok = self.wt_waiter.wait_if(
            || !self.is_closed() && self.len() >= PIPE_CAPACITY,
            Some(timeout_ms),
        );
        if !ok {
            return Ok(false); // still full
        }
        if self.is_closed() {
            return Err(closed_error());
        }

        {
            let mut q = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            if q.len() >= PIPE_CAPACITY {
                return Ok(false); // another sender won the slot
            }
            q.push_back(IpcBuffer::from_slice(data));
        }
        self.rd_waiter.broadcast();
        Ok(true)
    }

    fn pop(&self, timeout_ms: Option<u64>) -> io::Result<IpcBuffer> {
        let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
        loop {
            let front = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            if let Some(buf) = front {
                self.wt_waiter.notify();
                return Ok(buf);
            }
            // Frames queued before close are still delivered.
            if self.is_closed() {
                return Err(closed_error());
            }

            let tm = match deadline {
                Some(dl) => {
                    let remaining = dl.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(IpcBuffer::new());
                    }
                    Some(remaining.as_millis().max(1) as u64)
                }
                None => None,
            };
            let ok = self
                .rd_waiter
                .wait_if(|| !self.is_closed() && self.len() == 0, tm);
            if !ok {
                return Ok(IpcBuffer::new()); // timeout
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.rd_waiter.quit_waiting();
        self.wt_waiter.quit_waiting();
    }
}

// ---------------------------------------------------------------------------
// Endpoint: one side of an in-process channel
// ---------------------------------------------------------------------------

/// One end of an in-process channel created by [`pair`].
///
/// Dropping or closing either end closes both directions.
pub struct Endpoint {
    tx: Arc<Pipe>,
    rx: Arc<Pipe>,
}

/// Create two connected endpoints: frames sent on one are received on the
/// other.
pub fn pair() -> (Endpoint, Endpoint) {
    let a_to_b = Arc::new(Pipe::new());
    let b_to_a = Arc::new(Pipe::new());
    let a = Endpoint {
        tx: Arc::clone(&a_to_b),
        rx: Arc::clone(&b_to_a),
    };
    let b = Endpoint {
        tx: b_to_a,
        rx: a_to_b,
    };
    (a, b)
}

impl Endpoint {
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || self.rx.is_closed()
    }
}

impl Transport for Endpoint {
    fn send(&self, data: &[u8], timeout_ms: u64) -> io::Result<bool> {
        self.tx.push(data, timeout_ms)
    }

    fn recv(&self, timeout_ms: Option<u64>) -> io::Result<IpcBuffer> {
        self.rx.pop(timeout_ms)
    }

    fn close(&self) {
        self.tx.close();
        self.rx.close();
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        Transport::close(self);
    }
}
