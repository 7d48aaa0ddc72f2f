// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// In-process stand-in for the server process.
//
// `RemoteServer` serves one transport endpoint on its own thread: it decodes
// each frame, dispatches `(class, method)` to a registered handler, answers
// `Call` frames with the handler's values and runs `Post` frames without a
// reply. Every frame it receives is recorded for inspection.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::transport::Transport;
use crate::value::TypedValue;
use crate::waiter::Waiter;
use crate::wire::{self, Envelope, EnvelopeKind};

/// Status a server answers unknown methods with.
pub const STATUS_UNKNOWN_METHOD: u64 = 1;

type MethodHandler = Arc<dyn Fn(&[TypedValue]) -> Vec<TypedValue> + Send + Sync>;

/// A frame as the server received it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedCall {
    pub kind: EnvelopeKind,
    pub class: String,
    pub method: String,
    pub values: Vec<TypedValue>,
}

struct Journal {
    calls: Mutex<Vec<ReceivedCall>>,
    waiter: Waiter,
}

impl Journal {
    fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn push(&self, call: ReceivedCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        self.waiter.broadcast();
    }
}

// ---------------------------------------------------------------------------
// RemoteServer
// ---------------------------------------------------------------------------

/// Builder for a loopback server.
#[derive(Default)]
pub struct RemoteServer {
    handlers: HashMap<(String, String), MethodHandler>,
}

impl RemoteServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `class.method` with `f`. The returned values are the whole
    /// reply, status first.
    pub fn handle<F>(mut self, class: &str, method: &str, f: F) -> Self
    where
        F: Fn(&[TypedValue]) -> Vec<TypedValue> + Send + Sync + 'static,
    {
        self.handlers
            .insert((class.to_owned(), method.to_owned()), Arc::new(f));
        self
    }

    /// Serve `transport` on a new thread.
    pub fn spawn<T>(self, transport: T) -> io::Result<ServerHandle>
    where
        T: Transport + 'static,
    {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let stop = Arc::new(AtomicBool::new(false));
        let journal = Arc::new(Journal {
            calls: Mutex::new(Vec::new()),
            waiter: Waiter::new(),
        });

        let thread = {
            let transport = Arc::clone(&transport);
            let stop = Arc::clone(&stop);
            let journal = Arc::clone(&journal);
            thread::Builder::new()
                .name("obs-bridge-server".into())
                .spawn(move || serve(&self.handlers, transport.as_ref(), &stop, &journal))?
        };

        Ok(ServerHandle {
            transport,
            stop,
            journal,
            thread: Some(thread),
        })
    }
}

fn serve(
    handlers: &HashMap<(String, String), MethodHandler>,
    transport: &dyn Transport,
    stop: &AtomicBool,
    journal: &Journal,
) {
    const POLL_MS: u64 = 20;
    const REPLY_TIMEOUT_MS: u64 = 1000;

    while !stop.load(Ordering::Acquire) {
        let buf = match transport.recv(Some(POLL_MS)) {
            Ok(buf) => buf,
            Err(e) => {
                debug!(error = %e, "server channel closed");
                break;
            }
        };
        if buf.is_empty() {
            continue;
        }

        let env = match wire::decode(buf.data()) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "server dropping undecodable frame");
                continue;
            }
        };
        trace!(kind = ?env.kind, class = %env.class, method = %env.method, "server received");

        journal.push(ReceivedCall {
            kind: env.kind,
            class: env.class.clone(),
            method: env.method.clone(),
            values: env.values.clone(),
        });

        let handler = handlers.get(&(env.class.clone(), env.method.clone()));
        let answer = match handler {
            Some(h) => h(&env.values),
            None => {
                warn!(class = %env.class, method = %env.method, "unknown method");
                vec![
                    TypedValue::UInt64(STATUS_UNKNOWN_METHOD),
                    TypedValue::String(format!("unknown method {}.{}", env.class, env.method)),
                ]
            }
        };

        match env.kind {
            EnvelopeKind::Call => {
                let frame = wire::encode(&Envelope::reply(env.id, answer));
                match transport.send(frame.data(), REPLY_TIMEOUT_MS) {
                    Ok(true) => {}
                    Ok(false) => warn!(id = env.id, "client is not draining replies"),
                    Err(e) => {
                        debug!(error = %e, "server channel closed while replying");
                        break;
                    }
                }
            }
            EnvelopeKind::Post => {}
            EnvelopeKind::Reply => warn!(id = env.id, "server received a reply frame"),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerHandle
// ---------------------------------------------------------------------------

/// A running loopback server. Dropping it shuts the server down.
pub struct ServerHandle {
    transport: Arc<dyn Transport>,
    stop: Arc<AtomicBool>,
    journal: Arc<Journal>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Every frame received so far, in arrival order.
    pub fn received(&self) -> Vec<ReceivedCall> {
        self.journal
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until at least `count` frames have arrived. Returns `false` on
    /// timeout.
    pub fn wait_for(&self, count: usize, timeout_ms: u64) -> bool {
        self.journal
            .waiter
            .wait_if(|| self.journal.len() < count, Some(timeout_ms))
    }

    /// Close the channel and join the server thread.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.transport.close();
        if let Some(t) = self.thread.take() {
            if t.join().is_err() {
                warn!("server thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
