// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The control API exposed to the host.
//
// Every operation follows the same path: take typed arguments, look up the
// session connection (none installed means skip the call and return
// nothing), call the server, validate the reply, decode it at fixed offsets.
// `Api::invoke` adds host-argument extraction and host-value conversion on
// top, keyed by the exported method name.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::callback_queue::QueueState;
use crate::config::BridgeConfig;
use crate::connection::{Connection, ConnectionSlot, FreezeCallback};
use crate::error::{Error, Result};
use crate::host::{arg, HostFunction, HostHandle, HostValue};
use crate::permissions::{PermissionRequest, PermissionResult};
use crate::response::{validate, CallResponse};
use crate::value::TypedValue;

/// Exported method names, as the host sees them.
pub const EXPORTS: &[&str] = &[
    "OBS_API_initAPI",
    "OBS_API_destroyOBS_API",
    "OBS_API_getPerformanceStatistics",
    "SetWorkingDirectory",
    "StopCrashHandler",
    "OBS_API_QueryHotkeys",
    "OBS_API_ProcessHotkeyStatus",
    "SetUsername",
    "GetPermissionsStatus",
    "RequestPermissions",
];

/// Disk space reported when the server leaves it out.
pub const DISK_SPACE_UNKNOWN: &str = "0 MB";

/// Values per hotkey record in an `OBS_API_QueryHotkeys` reply.
const HOTKEY_FIELDS: usize = 5;

// ---------------------------------------------------------------------------
// Reply records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceStatistics {
    pub cpu: f64,
    pub dropped_frames: i32,
    pub dropped_frames_pct: f64,
    pub streaming_bandwidth: f64,
    pub streaming_data_output: f64,
    pub recording_bandwidth: f64,
    pub recording_data_output: f64,
    pub frame_rate: f64,
    pub average_render_time: f64,
    pub memory_usage: f64,
    pub disk_space_available: String,
}

impl PerformanceStatistics {
    const METHOD: &'static str = "OBS_API_getPerformanceStatistics";
    const MIN_LEN: usize = 11;

    fn from_response(r: &CallResponse) -> Result<Self> {
        r.require_len(Self::METHOD, Self::MIN_LEN)?;
        let m = Self::METHOD;
        Ok(Self {
            cpu: r.decode(m, 1)?,
            dropped_frames: r.decode(m, 2)?,
            dropped_frames_pct: r.decode(m, 3)?,
            streaming_bandwidth: r.decode(m, 4)?,
            streaming_data_output: r.decode(m, 5)?,
            recording_bandwidth: r.decode(m, 6)?,
            recording_data_output: r.decode(m, 7)?,
            frame_rate: r.decode(m, 8)?,
            average_render_time: r.decode(m, 9)?,
            memory_usage: r.decode(m, 10)?,
            disk_space_available: r.string_or(11, DISK_SPACE_UNKNOWN),
        })
    }

    pub fn to_host(&self) -> HostValue {
        HostValue::object([
            ("CPU", HostValue::from(self.cpu)),
            ("numberDroppedFrames", HostValue::from(self.dropped_frames)),
            ("percentageDroppedFrames", HostValue::from(self.dropped_frames_pct)),
            ("streamingBandwidth", HostValue::from(self.streaming_bandwidth)),
            ("streamingDataOutput", HostValue::from(self.streaming_data_output)),
            ("recordingBandwidth", HostValue::from(self.recording_bandwidth)),
            ("recordingDataOutput", HostValue::from(self.recording_data_output)),
            ("frameRate", HostValue::from(self.frame_rate)),
            ("averageTimeToRenderFrame", HostValue::from(self.average_render_time)),
            ("memoryUsage", HostValue::from(self.memory_usage)),
            ("diskSpaceAvailable", HostValue::from(self.disk_space_available.as_str())),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyInfo {
    pub object_name: String,
    pub object_type: u32,
    pub hotkey_name: String,
    pub hotkey_desc: String,
    pub hotkey_id: u64,
}

impl HotkeyInfo {
    const METHOD: &'static str = "OBS_API_QueryHotkeys";

    /// Decode every complete record after the status. A trailing partial
    /// record is ignored.
    fn list_from_response(r: &CallResponse) -> Result<Vec<Self>> {
        let m = Self::METHOD;
        let count = r.len().saturating_sub(1) / HOTKEY_FIELDS;
        (0..count)
            .map(|i| {
                let at = 1 + i * HOTKEY_FIELDS;
                Ok(Self {
                    object_name: r.decode(m, at)?,
                    object_type: r.decode(m, at + 1)?,
                    hotkey_name: r.decode(m, at + 2)?,
                    hotkey_desc: r.decode(m, at + 3)?,
                    hotkey_id: r.decode(m, at + 4)?,
                })
            })
            .collect()
    }

    pub fn to_host(&self) -> HostValue {
        HostValue::object([
            ("ObjectName", HostValue::from(self.object_name.as_str())),
            ("ObjectType", HostValue::from(self.object_type)),
            ("HotkeyName", HostValue::from(self.hotkey_name.as_str())),
            ("HotkeyDesc", HostValue::from(self.hotkey_desc.as_str())),
            ("HotkeyId", HostValue::from(self.hotkey_id)),
        ])
    }
}

// ---------------------------------------------------------------------------
// Api
// ---------------------------------------------------------------------------

/// The control-API surface of one host session.
///
/// Lives on the host thread. Operations that need the server return
/// `Ok(None)` (or do nothing) while no connection is installed.
pub struct Api {
    slot: ConnectionSlot,
    host: HostHandle,
    config: BridgeConfig,
    freeze_callback: Option<FreezeCallback>,
    permission_request: RefCell<Option<PermissionRequest>>,
}

impl Api {
    pub fn new(slot: ConnectionSlot, host: HostHandle, config: BridgeConfig) -> Self {
        Self {
            slot,
            host,
            config,
            freeze_callback: None,
            permission_request: RefCell::new(None),
        }
    }

    /// Freeze watchdog armed on the connection by [`init_api`](Self::init_api).
    pub fn with_freeze_callback(mut self, callback: FreezeCallback) -> Self {
        self.freeze_callback = Some(callback);
        self
    }

    pub fn connection(&self) -> Option<Arc<Connection>> {
        let conn = self.slot.get();
        if conn.is_none() {
            trace!("no connection; call skipped");
        }
        conn
    }

    fn class(&self) -> &str {
        &self.config.endpoint_class
    }

    fn post(&self, method: &str, args: Vec<TypedValue>) {
        if let Some(conn) = self.connection() {
            conn.call(self.class(), method, args);
        }
    }

    /// Synchronous call followed by status validation.
    fn request(&self, method: &str, args: Vec<TypedValue>) -> Result<Option<CallResponse>> {
        let Some(conn) = self.connection() else {
            return Ok(None);
        };
        let response = conn.call_synchronous(self.class(), method, args);
        validate(&response)?;
        Ok(Some(response))
    }

    /// Start the server's API. Returns the server's init result code.
    pub fn init_api(&self, language: &str, path: &str, version: &str) -> Result<Option<i32>> {
        const METHOD: &str = "OBS_API_initAPI";
        let Some(conn) = self.connection() else {
            return Ok(None);
        };
        if let Some(cb) = &self.freeze_callback {
            conn.set_freeze_callback(Arc::clone(cb), path);
        }

        let response = conn.call_synchronous(
            self.class(),
            METHOD,
            vec![path.into(), language.into(), version.into()],
        );
        validate(&response)?;
        response.require_len(METHOD, 2)?;
        let code = response.decode::<i32>(METHOD, 1)?;
        debug!(code, "API initialised");
        Ok(Some(code))
    }

    pub fn destroy_obs_api(&self) {
        self.post("OBS_API_destroyOBS_API", Vec::new());
    }

    pub fn performance_statistics(&self) -> Result<Option<PerformanceStatistics>> {
        match self.request(PerformanceStatistics::METHOD, Vec::new())? {
            Some(r) => PerformanceStatistics::from_response(&r).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_working_directory(&self, path: &str) {
        self.post("SetWorkingDirectory", vec![path.into()]);
    }

    /// Shutdown call; the reply is not inspected.
    pub fn stop_crash_handler(&self) {
        if let Some(conn) = self.connection() {
            let response = conn.call_synchronous(self.class(), "StopCrashHandler", Vec::new());
            trace!(values = response.len(), "crash handler stop acknowledged");
        }
    }

    pub fn query_hotkeys(&self) -> Result<Option<Vec<HotkeyInfo>>> {
        match self.request(HotkeyInfo::METHOD, Vec::new())? {
            Some(r) => HotkeyInfo::list_from_response(&r).map(Some),
            None => Ok(None),
        }
    }

    pub fn process_hotkey_status(&self, hotkey_id: u64, pressed: bool) {
        self.post(
            "OBS_API_ProcessHotkeyStatus",
            vec![hotkey_id.into(), pressed.into()],
        );
    }

    pub fn set_username(&self, username: &str) {
        self.post("SetUsername", vec![username.into()]);
    }

    pub fn permissions_status(&self) -> PermissionResult {
        self.config.capabilities.status()
    }

    /// Ask for camera and microphone access. `callback` runs on the host
    /// thread once per answer. A previous request still in flight is stopped.
    pub fn request_permissions<F>(&self, callback: F)
    where
        F: FnMut(PermissionResult) + 'static,
    {
        let previous = self.permission_request.borrow_mut().take();
        if let Some(prev) = previous {
            prev.stop();
        }
        let request = PermissionRequest::start(self.host.clone(), &self.config.capabilities, callback);
        *self.permission_request.borrow_mut() = Some(request);
    }

    /// State of the most recent permission request.
    pub fn permission_state(&self) -> QueueState {
        self.permission_request
            .borrow()
            .as_ref()
            .map_or(QueueState::Idle, PermissionRequest::state)
    }

    /// Call an exported method with host arguments.
    ///
    /// Arguments are checked before any call is made. Operations with no
    /// result, and operations skipped for lack of a connection, return
    /// [`HostValue::Undefined`].
    pub fn invoke(&self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        match name {
            "OBS_API_initAPI" => {
                let language: String = arg(args, 0)?;
                let path: String = arg(args, 1)?;
                let version: String = arg(args, 2)?;
                Ok(self
                    .init_api(&language, &path, &version)?
                    .map_or(HostValue::Undefined, HostValue::from))
            }
            "OBS_API_destroyOBS_API" => {
                self.destroy_obs_api();
                Ok(HostValue::Undefined)
            }
            "OBS_API_getPerformanceStatistics" => Ok(self
                .performance_statistics()?
                .map_or(HostValue::Undefined, |s| s.to_host())),
            "SetWorkingDirectory" => {
                let path: String = arg(args, 0)?;
                self.set_working_directory(&path);
                Ok(HostValue::Undefined)
            }
            "StopCrashHandler" => {
                self.stop_crash_handler();
                Ok(HostValue::Undefined)
            }
            "OBS_API_QueryHotkeys" => Ok(self
                .query_hotkeys()?
                .map_or(HostValue::Undefined, |list| {
                    HostValue::Array(list.iter().map(HotkeyInfo::to_host).collect())
                })),
            "OBS_API_ProcessHotkeyStatus" => {
                let hotkey_id: u64 = arg(args, 0)?;
                let pressed: bool = arg(args, 1)?;
                self.process_hotkey_status(hotkey_id, pressed);
                Ok(HostValue::Undefined)
            }
            "SetUsername" => {
                let username: String = arg(args, 0)?;
                self.set_username(&username);
                Ok(HostValue::Undefined)
            }
            "GetPermissionsStatus" => Ok(self.permissions_status().to_host()),
            "RequestPermissions" => {
                let callback: HostFunction = arg(args, 0)?;
                self.request_permissions(move |result| callback.call(&[result.to_host()]));
                Ok(HostValue::Undefined)
            }
            other => Err(Error::UnknownMethod(other.to_owned())),
        }
    }
}
