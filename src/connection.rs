// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Call dispatch over a Transport.
//
// A Connection sends `Post` frames for fire-and-forget calls and `Call`
// frames for synchronous ones. A reader thread owns the receive side and
// routes each `Reply` to the caller waiting on that call id through a
// one-shot channel, so no lock is held while a caller blocks.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::response::CallResponse;
use crate::transport::Transport;
use crate::value::TypedValue;
use crate::wire::{self, Envelope, EnvelopeKind};

/// Invoked with `true` when a synchronous call stops making progress and
/// with `false` once it completes. The second argument is the path that was
/// registered alongside the callback.
pub type FreezeCallback = Arc<dyn Fn(bool, &str) + Send + Sync>;

#[derive(Clone)]
struct Watchdog {
    callback: FreezeCallback,
    path: String,
}

type Pending = Arc<Mutex<HashMap<u64, mpsc::Sender<CallResponse>>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A live channel to the server process.
pub struct Connection {
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    watchdog: Mutex<Option<Watchdog>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Start routing replies from `transport`.
    pub fn open<T>(transport: T, config: ConnectionConfig) -> io::Result<Arc<Self>>
    where
        T: Transport + 'static,
    {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader = {
            let transport = Arc::clone(&transport);
            let pending = Arc::clone(&pending);
            let closed = Arc::clone(&closed);
            let poll_ms = config.poll_interval.as_millis().max(1) as u64;
            thread::Builder::new()
                .name("obs-bridge-replies".into())
                .spawn(move || reply_loop(transport, pending, closed, poll_ms))?
        };

        Ok(Arc::new(Self {
            transport,
            config,
            pending,
            next_id: AtomicU64::new(1),
            closed,
            watchdog: Mutex::new(None),
            reader: Mutex::new(Some(reader)),
        }))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Whether the channel has failed or been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fire-and-forget call. Failures are logged, never reported.
    pub fn call(&self, class: &str, method: &str, args: Vec<TypedValue>) {
        if self.is_closed() {
            debug!(class, method, "connection closed; dropping call");
            return;
        }
        let frame = wire::encode(&Envelope::post(class, method, args));
        match self.transport.send(frame.data(), self.config.send_timeout_ms) {
            Ok(true) => trace!(class, method, "posted"),
            Ok(false) => warn!(class, method, "server is not draining calls; dropped"),
            Err(e) => warn!(class, method, error = %e, "failed to post call"),
        }
    }

    /// Call and block until the server replies.
    ///
    /// Returns an empty response when the channel fails, the frame cannot be
    /// sent, or the configured reply timeout expires.
    pub fn call_synchronous(&self, class: &str, method: &str, args: Vec<TypedValue>) -> CallResponse {
        if self.is_closed() {
            debug!(class, method, "connection closed; no reply");
            return CallResponse::empty();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        lock(&self.pending).insert(id, tx);
        // The reader may have shut down between the check above and the insert.
        if self.is_closed() {
            lock(&self.pending).remove(&id);
            return CallResponse::empty();
        }

        let frame = wire::encode(&Envelope::call(id, class, method, args));
        let sent = self.transport.send(frame.data(), self.config.send_timeout_ms);
        if !matches!(sent, Ok(true)) {
            lock(&self.pending).remove(&id);
            match sent {
                Err(e) => warn!(class, method, error = %e, "failed to send call"),
                _ => warn!(class, method, "server is not draining calls"),
            }
            return CallResponse::empty();
        }
        trace!(class, method, id, "waiting for reply");

        let watchdog = lock(&self.watchdog).clone();
        self.await_reply(id, method, &rx, watchdog.as_ref())
    }

    fn await_reply(
        &self,
        id: u64,
        method: &str,
        rx: &mpsc::Receiver<CallResponse>,
        watchdog: Option<&Watchdog>,
    ) -> CallResponse {
        let started = Instant::now();
        let reply_deadline = self.config.reply_timeout.map(|t| started + t);
        let freeze_deadline = watchdog.map(|_| started + self.config.freeze_threshold);
        let mut frozen = false;

        let response = loop {
            let next = [if frozen { None } else { freeze_deadline }, reply_deadline]
                .into_iter()
                .flatten()
                .min();
            let received = match next {
                Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(r) => break r,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(method, id, "channel failed while waiting for reply");
                    break CallResponse::empty();
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    if let (false, Some(w), Some(at)) = (frozen, watchdog, freeze_deadline) {
                        if now >= at {
                            frozen = true;
                            warn!(method, id, path = %w.path, "server call appears frozen");
                            (w.callback)(true, &w.path);
                            continue;
                        }
                    }
                    if reply_deadline.is_some_and(|at| now >= at) {
                        lock(&self.pending).remove(&id);
                        warn!(method, id, "timed out waiting for reply");
                        break CallResponse::empty();
                    }
                }
            }
        };

        if frozen {
            if let Some(w) = watchdog {
                debug!(method, id, "server call resumed");
                (w.callback)(false, &w.path);
            }
        }
        response
    }

    /// Register the freeze watchdog for this connection, replacing any
    /// previous registration.
    pub fn set_freeze_callback(&self, callback: FreezeCallback, path: impl Into<String>) {
        let path = path.into();
        debug!(path = %path, "freeze watchdog armed");
        *lock(&self.watchdog) = Some(Watchdog { callback, path });
    }

    pub fn clear_freeze_callback(&self) {
        *lock(&self.watchdog) = None;
    }

    /// Path of the current watchdog registration.
    pub fn watchdog_path(&self) -> Option<String> {
        lock(&self.watchdog).as_ref().map(|w| w.path.clone())
    }

    /// Close the transport and stop the reply reader. Callers still waiting
    /// get an empty response.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.transport.close();
        let reader = lock(&self.reader).take();
        if let Some(handle) = reader {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("reply reader panicked");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn reply_loop(transport: Arc<dyn Transport>, pending: Pending, closed: Arc<AtomicBool>, poll_ms: u64) {
    while !closed.load(Ordering::Acquire) {
        let buf = match transport.recv(Some(poll_ms)) {
            Ok(buf) => buf,
            Err(e) => {
                debug!(error = %e, "reply channel closed");
                break;
            }
        };
        if buf.is_empty() {
            continue; // timeout
        }

        let env = match wire::decode(buf.data()) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                continue;
            }
        };
        if env.kind != EnvelopeKind::Reply {
            warn!(kind = ?env.kind, method = %env.method, "unexpected frame from server");
            continue;
        }

        let waiter = lock(&pending).remove(&env.id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(CallResponse::new(env.values));
            }
            None => trace!(id = env.id, "reply for an abandoned call"),
        }
    }

    closed.store(true, Ordering::Release);
    // Dropping the senders wakes every caller still waiting.
    lock(&pending).clear();
}

// ---------------------------------------------------------------------------
// ConnectionSlot
// ---------------------------------------------------------------------------

/// The session's shared connection handle.
///
/// Empty before a connection is installed and after [`disconnect`]; callers
/// treat an empty slot as "skip the call".
///
/// [`disconnect`]: ConnectionSlot::disconnect
#[derive(Clone, Default)]
pub struct ConnectionSlot {
    inner: Arc<RwLock<Option<Arc<Connection>>>>,
}

impl ConnectionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `conn`, returning the connection it replaces.
    pub fn install(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(conn)
    }

    pub fn get(&self) -> Option<Arc<Connection>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and close the current connection.
    pub fn disconnect(&self) -> Option<Arc<Connection>> {
        let conn = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(c) = &conn {
            c.close();
        }
        conn
    }
}
