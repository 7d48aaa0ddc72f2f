// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The host scripting environment, as seen from the bridge.
//
// `HostValue` is what host callers pass in and get back. `HostLoop` is the
// host's single-threaded event loop: async runners are registered on it from
// the host thread, other threads wake them through a `Send` signal, and the
// loop invokes them on the host thread when driven.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// HostValue
// ---------------------------------------------------------------------------

/// A host-native value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    #[default]
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    /// Properties in insertion order.
    Object(Vec<(String, HostValue)>),
    Function(HostFunction),
}

impl HostValue {
    /// Build an object from `(key, value)` pairs.
    pub fn object<K, I>(props: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HostValue)>,
    {
        Self::Object(props.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Property lookup on an object. `None` for other variants.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            Self::Object(props) => props.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[HostValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<u32> for HostValue {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

// Host numbers are doubles; ids above 2^53 lose precision as they do in the
// host itself.
impl From<u64> for HostValue {
    fn from(v: u64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(v: Vec<HostValue>) -> Self {
        Self::Array(v)
    }
}

impl From<HostFunction> for HostValue {
    fn from(v: HostFunction) -> Self {
        Self::Function(v)
    }
}

// ---------------------------------------------------------------------------
// HostFunction
// ---------------------------------------------------------------------------

/// A host callback. Only callable on the host thread.
#[derive(Clone)]
pub struct HostFunction(Rc<dyn Fn(&[HostValue])>);

impl HostFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[HostValue]) + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[HostValue]) {
        (self.0)(args)
    }
}

impl PartialEq for HostFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostFunction")
    }
}

// ---------------------------------------------------------------------------
// Argument extraction
// ---------------------------------------------------------------------------

/// Native types a host argument can be converted into.
pub trait FromHostValue: Sized {
    /// Type name reported in [`Error::InvalidArgument`].
    const EXPECTED: &'static str;
    fn from_host(v: &HostValue) -> Option<Self>;
}

impl FromHostValue for String {
    const EXPECTED: &'static str = "string";
    fn from_host(v: &HostValue) -> Option<Self> {
        v.as_str().map(str::to_owned)
    }
}

impl FromHostValue for bool {
    const EXPECTED: &'static str = "boolean";
    fn from_host(v: &HostValue) -> Option<Self> {
        v.as_bool()
    }
}

impl FromHostValue for f64 {
    const EXPECTED: &'static str = "number";
    fn from_host(v: &HostValue) -> Option<Self> {
        v.as_f64()
    }
}

/// Whole, non-negative numbers strictly below `limit`.
fn whole_number(v: &HostValue, limit: f64) -> Option<f64> {
    v.as_f64()
        .filter(|n| n.is_finite() && n.fract() == 0.0 && *n >= 0.0 && *n < limit)
}

impl FromHostValue for u32 {
    const EXPECTED: &'static str = "unsigned integer";
    fn from_host(v: &HostValue) -> Option<Self> {
        whole_number(v, f64::from(u32::MAX) + 1.0).map(|n| n as u32)
    }
}

impl FromHostValue for u64 {
    const EXPECTED: &'static str = "unsigned integer";
    fn from_host(v: &HostValue) -> Option<Self> {
        // 2^64: `u64::MAX as f64` rounds up to it.
        whole_number(v, 18_446_744_073_709_551_616.0).map(|n| n as u64)
    }
}

impl FromHostValue for HostFunction {
    const EXPECTED: &'static str = "function";
    fn from_host(v: &HostValue) -> Option<Self> {
        match v {
            HostValue::Function(f) => Some(f.clone()),
            _ => None,
        }
    }
}

/// Extract argument `index` as `T`. Missing or mistyped arguments are an
/// [`Error::InvalidArgument`].
pub fn arg<T: FromHostValue>(args: &[HostValue], index: usize) -> Result<T> {
    args.get(index)
        .and_then(T::from_host)
        .ok_or(Error::InvalidArgument {
            index,
            expected: T::EXPECTED,
        })
}

// ---------------------------------------------------------------------------
// HostLoop
// ---------------------------------------------------------------------------

type Runner = Rc<dyn Fn()>;

struct LoopInner {
    runners: RefCell<HashMap<u64, Runner>>,
    next_id: Cell<u64>,
    wake_tx: mpsc::Sender<u64>,
    wake_rx: mpsc::Receiver<u64>,
}

/// The host thread's event loop.
///
/// Not `Send`: it lives on the host thread. Other threads only ever hold an
/// [`AsyncSignal`].
pub struct HostLoop {
    inner: Rc<LoopInner>,
}

impl Default for HostLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl HostLoop {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = mpsc::channel();
        Self {
            inner: Rc::new(LoopInner {
                runners: RefCell::new(HashMap::new()),
                next_id: Cell::new(1),
                wake_tx,
                wake_rx,
            }),
        }
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Number of registered async runners.
    pub fn active_runners(&self) -> usize {
        self.inner.runners.borrow().len()
    }

    /// Run every runner woken so far without blocking. Several wakes of the
    /// same runner before it runs collapse into one invocation. Returns the
    /// number of invocations.
    pub fn run_pending(&self) -> usize {
        let mut woken: Vec<u64> = Vec::new();
        while let Ok(id) = self.inner.wake_rx.try_recv() {
            if !woken.contains(&id) {
                woken.push(id);
            }
        }
        self.run(&woken)
    }

    /// Wait up to `timeout` for a wake, then run everything pending.
    pub fn run_once(&self, timeout: Duration) -> usize {
        match self.inner.wake_rx.recv_timeout(timeout) {
            Ok(first) => {
                let mut woken = vec![first];
                while let Ok(id) = self.inner.wake_rx.try_recv() {
                    if !woken.contains(&id) {
                        woken.push(id);
                    }
                }
                self.run(&woken)
            }
            Err(_) => 0,
        }
    }

    /// Drive the loop until no runner is registered or `timeout` expires.
    /// Returns `true` if the loop went idle.
    pub fn run_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.active_runners() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.run_once(remaining);
        }
        true
    }

    fn run(&self, woken: &[u64]) -> usize {
        let mut ran = 0;
        for id in woken {
            // Clone out so the runner may close itself or open others.
            let runner = self.inner.runners.borrow().get(id).cloned();
            if let Some(runner) = runner {
                runner();
                ran += 1;
            }
        }
        ran
    }
}

/// A weak reference to a [`HostLoop`], held by components that register
/// runners on it.
#[derive(Clone)]
pub struct HostHandle {
    inner: Weak<LoopInner>,
}

impl HostHandle {
    /// Register `runner`. Returns the signal that wakes it, or `None` if the
    /// loop is gone.
    pub fn open_async<F>(&self, runner: F) -> Option<AsyncSignal>
    where
        F: Fn() + 'static,
    {
        let inner = self.inner.upgrade()?;
        let id = inner.next_id.get();
        inner.next_id.set(id + 1);
        inner.runners.borrow_mut().insert(id, Rc::new(runner));
        Some(AsyncSignal {
            id,
            tx: inner.wake_tx.clone(),
        })
    }

    /// Unregister a runner. Wakes already in flight for it are ignored.
    pub fn close_async(&self, signal: &AsyncSignal) {
        if let Some(inner) = self.inner.upgrade() {
            inner.runners.borrow_mut().remove(&signal.id);
        }
    }
}

/// Wakes one async runner on the host loop. Safe to use from any thread.
#[derive(Clone, Debug)]
pub struct AsyncSignal {
    id: u64,
    tx: mpsc::Sender<u64>,
}

impl AsyncSignal {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Schedule the runner. Returns `false` if the loop is gone.
    pub fn notify(&self) -> bool {
        self.tx.send(self.id).is_ok()
    }
}
