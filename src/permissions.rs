// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Camera / microphone permission queries.
//
// The platform permission subsystem answers on its own threads. Its answers
// reach the host through a `CallbackQueue<PermissionResult>`.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::callback_queue::{CallbackQueue, Delivery, QueueSender, QueueState};
use crate::host::{HostHandle, HostValue};

/// Snapshot of both capture permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionResult {
    pub webcam: bool,
    pub mic: bool,
}

impl PermissionResult {
    pub fn both_granted(&self) -> bool {
        self.webcam && self.mic
    }

    /// `{ webcamPermission, micPermission }`
    pub fn to_host(&self) -> HostValue {
        HostValue::object([
            ("webcamPermission", HostValue::Bool(self.webcam)),
            ("micPermission", HostValue::Bool(self.mic)),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Camera,
    Microphone,
}

/// The platform permission subsystem.
pub trait PermissionQuery: Send + Sync {
    /// Current authorization, without prompting.
    fn authorized(&self, cap: Capability) -> bool;

    /// Ask for access. `done` is called exactly once, on any thread, with the
    /// outcome.
    fn request_access(&self, cap: Capability, done: Box<dyn FnOnce(bool) + Send>);
}

/// Which permission backend the bridge talks to.
#[derive(Clone, Default)]
pub enum CapabilityBridge {
    /// No permission subsystem on this platform: nothing is granted.
    #[default]
    Unsupported,
    Platform(Arc<dyn PermissionQuery>),
}

impl fmt::Debug for CapabilityBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => f.write_str("Unsupported"),
            Self::Platform(_) => f.write_str("Platform"),
        }
    }
}

impl CapabilityBridge {
    pub fn status(&self) -> PermissionResult {
        match self {
            Self::Unsupported => PermissionResult::default(),
            Self::Platform(q) => PermissionResult {
                webcam: q.authorized(Capability::Camera),
                mic: q.authorized(Capability::Microphone),
            },
        }
    }

    /// Query camera, then microphone. Each answer pushes one snapshot into
    /// `sink`: the answered capability's outcome next to the other's current
    /// authorization.
    pub fn request(&self, sink: QueueSender<PermissionResult>) {
        match self {
            Self::Unsupported => {
                sink.send(PermissionResult::default());
                sink.send(PermissionResult::default());
            }
            Self::Platform(q) => {
                for cap in [Capability::Camera, Capability::Microphone] {
                    let query = Arc::clone(q);
                    let sink = sink.clone();
                    q.request_access(
                        cap,
                        Box::new(move |granted| {
                            let result = match cap {
                                Capability::Camera => PermissionResult {
                                    webcam: granted,
                                    mic: query.authorized(Capability::Microphone),
                                },
                                Capability::Microphone => PermissionResult {
                                    webcam: query.authorized(Capability::Camera),
                                    mic: granted,
                                },
                            };
                            if !sink.send(result) {
                                debug!(?cap, "permission request no longer active");
                            }
                        }),
                    );
                }
            }
        }
    }
}

/// Results a request delivers before it is complete: one per capability.
const EXPECTED_RESULTS: usize = 2;

/// An in-flight `RequestPermissions`.
///
/// Owns the queue that carries results to `callback`. The queue stops once
/// both capabilities have answered or as soon as both are granted.
pub struct PermissionRequest {
    queue: CallbackQueue<PermissionResult>,
}

impl PermissionRequest {
    pub fn start<F>(host: HostHandle, bridge: &CapabilityBridge, mut callback: F) -> Self
    where
        F: FnMut(PermissionResult) + 'static,
    {
        let mut delivered = 0usize;
        let queue = CallbackQueue::new(host, move |result: PermissionResult| {
            callback(result);
            delivered += 1;
            if result.both_granted() || delivered >= EXPECTED_RESULTS {
                Delivery::Finished
            } else {
                Delivery::Continue
            }
        });
        queue.start();
        bridge.request(queue.sender());
        Self { queue }
    }

    pub fn state(&self) -> QueueState {
        self.queue.state()
    }

    pub fn stop(&self) {
        self.queue.stop();
    }
}
