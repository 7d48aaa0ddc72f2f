// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Hand-off from producer threads to a handler on the host thread.
//
// Producers push items through a `QueueSender` from any thread; each push
// wakes the queue's runner on the `HostLoop`, which drains the pending items
// in FIFO order into the single handler. The mutex guards only the pending
// buffer; the handler always runs with it released.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::host::{AsyncSignal, HostHandle};

/// What the handler wants after consuming an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Continue,
    /// Stop the queue; remaining and later items are dropped.
    Finished,
}

/// Whether the queue currently accepts and delivers items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Running,
}

type Handler<T> = Box<dyn FnMut(T) -> Delivery>;

struct Slot<T> {
    pending: VecDeque<T>,
    /// Present while running.
    signal: Option<AsyncSignal>,
}

type Shared<T> = Arc<Mutex<Slot<T>>>;

fn lock<T>(shared: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// QueueSender
// ---------------------------------------------------------------------------

/// The producer side of a [`CallbackQueue`]. Cheap to clone, `Send` when
/// `T` is.
pub struct QueueSender<T> {
    shared: Shared<T>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> QueueSender<T> {
    /// Append `item` and wake the host runner. Returns `false` (and drops the
    /// item) when the queue is not running.
    pub fn send(&self, item: T) -> bool {
        let signal = {
            let mut slot = lock(&self.shared);
            match slot.signal.clone() {
                Some(signal) => {
                    slot.pending.push_back(item);
                    signal
                }
                None => return false,
            }
        };
        if !signal.notify() {
            debug!("host loop gone; item will not be delivered");
        }
        true
    }
}

// ---------------------------------------------------------------------------
// CallbackQueue
// ---------------------------------------------------------------------------

/// A FIFO of items produced anywhere and consumed on the host thread.
///
/// Lifecycle is idle → running → idle, and restartable. `start` and `stop`
/// are idempotent. Dropping the queue stops it.
pub struct CallbackQueue<T> {
    shared: Shared<T>,
    host: HostHandle,
    handler: Rc<RefCell<Option<Handler<T>>>>,
}

impl<T: 'static> CallbackQueue<T> {
    pub fn new<F>(host: HostHandle, handler: F) -> Self
    where
        F: FnMut(T) -> Delivery + 'static,
    {
        Self {
            shared: Arc::new(Mutex::new(Slot {
                pending: VecDeque::new(),
                signal: None,
            })),
            host,
            handler: Rc::new(RefCell::new(Some(Box::new(handler)))),
        }
    }

    /// Replace the handler. Takes effect from the next item.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: FnMut(T) -> Delivery + 'static,
    {
        *self.handler.borrow_mut() = Some(Box::new(handler));
    }

    /// Register the runner on the host loop. No-op while running.
    pub fn start(&self) {
        if lock(&self.shared).signal.is_some() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let handler = Rc::clone(&self.handler);
        let host = self.host.clone();
        let opened = self
            .host
            .open_async(move || dispatch(&shared, &handler, &host));

        match opened {
            Some(signal) => {
                trace!(runner = signal.id(), "callback queue started");
                lock(&self.shared).signal = Some(signal);
            }
            None => warn!("host loop gone; callback queue stays idle"),
        }
    }

    /// Unregister the runner and drop anything pending. No-op while idle.
    pub fn stop(&self) {
        stop(&self.shared, &self.host);
    }

    pub fn state(&self) -> QueueState {
        if lock(&self.shared).signal.is_some() {
            QueueState::Running
        } else {
            QueueState::Idle
        }
    }

    /// Items queued but not yet delivered.
    pub fn pending(&self) -> usize {
        lock(&self.shared).pending.len()
    }

    pub fn sender(&self) -> QueueSender<T> {
        QueueSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Same as `self.sender().send(item)`.
    pub fn enqueue(&self, item: T) -> bool {
        self.sender().send(item)
    }
}

impl<T> Drop for CallbackQueue<T> {
    fn drop(&mut self) {
        stop(&self.shared, &self.host);
    }
}

fn stop<T>(shared: &Mutex<Slot<T>>, host: &HostHandle) {
    let (signal, dropped) = {
        let mut slot = lock(shared);
        let dropped = slot.pending.len();
        slot.pending.clear();
        (slot.signal.take(), dropped)
    };
    if let Some(signal) = signal {
        host.close_async(&signal);
        debug!(runner = signal.id(), dropped, "callback queue stopped");
    }
}

/// Runs on the host thread whenever the queue's signal fires.
fn dispatch<T>(shared: &Mutex<Slot<T>>, handler: &RefCell<Option<Handler<T>>>, host: &HostHandle) {
    loop {
        let item = {
            let mut slot = lock(shared);
            if slot.signal.is_none() {
                return;
            }
            slot.pending.pop_front()
        };
        // Nothing pending: a coalesced or spurious wake.
        let Some(item) = item else { return };

        // Taken out for the call so the handler may use the queue itself.
        let taken = handler.borrow_mut().take();
        let Some(mut h) = taken else {
            // Re-entered from inside the handler; the outer dispatch drains it.
            lock(shared).pending.push_front(item);
            return;
        };
        let outcome = h(item);
        {
            let mut current = handler.borrow_mut();
            if current.is_none() {
                *current = Some(h);
            }
        }

        if outcome == Delivery::Finished {
            stop(shared, host);
            return;
        }
    }
}
