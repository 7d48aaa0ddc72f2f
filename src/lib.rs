// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Client-side bridge between a host scripting environment and the OBS server
// process: typed-value calls over a frame transport, reply validation, and
// queued delivery of out-of-band results onto the host thread.

mod waiter;

pub mod value;
pub use value::{DecodeError, FromValue, Kind, TypedValue};

pub mod wire;
pub use wire::{Envelope, EnvelopeKind, WireError};

pub mod error;
pub use error::{Error, Result};

pub mod transport;
pub use transport::{pair, Endpoint, IpcBuffer, Transport};

pub mod config;
pub use config::{BridgeConfig, ConnectionConfig, API_CLASS};

pub mod response;
pub use response::{is_valid, validate, CallResponse};

pub mod connection;
pub use connection::{Connection, ConnectionSlot, FreezeCallback};

pub mod host;
pub use host::{AsyncSignal, FromHostValue, HostFunction, HostHandle, HostLoop, HostValue};

pub mod callback_queue;
pub use callback_queue::{CallbackQueue, Delivery, QueueSender, QueueState};

pub mod permissions;
pub use permissions::{
    Capability, CapabilityBridge, PermissionQuery, PermissionRequest, PermissionResult,
};

pub mod api;
pub use api::{Api, HotkeyInfo, PerformanceStatistics};

pub mod loopback;
pub use loopback::{ReceivedCall, RemoteServer, ServerHandle};
