// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Condition-variable + mutex wrapper used by the loopback pipes to
// sleep/wake sender and receiver threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A waiter combining a condition variable, a mutex, and a quit flag.
///
/// The predicate is evaluated with the waiter's lock held, so a notifier
/// that changes the predicate's inputs and then calls [`notify`] or
/// [`broadcast`] can never slip in between the check and the sleep.
///
/// [`notify`]: Waiter::notify
/// [`broadcast`]: Waiter::broadcast
pub(crate) struct Waiter {
    cond: Condvar,
    lock: Mutex<()>,
    quit: AtomicBool,
}

impl Waiter {
    pub(crate) fn new() -> Self {
        Self {
            cond: Condvar::new(),
            lock: Mutex::new(()),
            quit: AtomicBool::new(false),
        }
    }

    /// Block until `pred` returns `false` or quit is signalled.
    /// Returns `false` on timeout, `true` otherwise.
    pub(crate) fn wait_if<F>(&self, pred: F, timeout_ms: Option<u64>) -> bool
    where
        F: Fn() -> bool,
    {
        let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !self.quit.load(Ordering::Acquire) && pred() {
            match deadline {
                None => {
                    guard = self
                        .cond
                        .wait(guard)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(dl) => {
                    let remaining = dl.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false; // timeout
                    }
                    guard = self
                        .cond
                        .wait_timeout(guard, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
        true
    }

    /// Wake one waiter.
    pub(crate) fn notify(&self) {
        // Barrier: briefly acquire lock to ensure the waiter is in cond_wait
        drop(self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        self.cond.notify_one();
    }

    /// Wake all waiters.
    pub(crate) fn broadcast(&self) {
        drop(self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        self.cond.notify_all();
    }

    /// Signal quit and broadcast to wake all waiters.
    pub(crate) fn quit_waiting(&self) {
        self.quit.store(true, Ordering::Release);
        self.broadcast();
    }
}
