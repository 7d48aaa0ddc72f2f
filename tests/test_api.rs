// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the API surface against a loopback server.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use obs_bridge::api::{DISK_SPACE_UNKNOWN, EXPORTS};
use obs_bridge::{
    pair, Api, BridgeConfig, Connection, ConnectionConfig, ConnectionSlot, EnvelopeKind, Error,
    HostFunction, HostLoop, HostValue, HotkeyInfo, QueueState, RemoteServer, ServerHandle,
    TypedValue, API_CLASS,
};

fn stats_values(with_disk: bool) -> Vec<TypedValue> {
    let mut v = vec![
        TypedValue::UInt64(0),
        TypedValue::Float64(12.5),
        TypedValue::Int32(3),
        TypedValue::Float64(0.5),
        TypedValue::Float64(2500.0),
        TypedValue::Float64(18.0),
        TypedValue::Float64(0.0),
        TypedValue::Float64(0.0),
        TypedValue::Float64(60.0),
        TypedValue::Float64(1.25),
        TypedValue::Float64(412.0),
    ];
    if with_disk {
        v.push("118 GB".into());
    }
    v
}

fn hotkey(name: &str, id: u64) -> Vec<TypedValue> {
    vec![
        format!("Scene {name}").into(),
        TypedValue::UInt32(2),
        format!("select.{name}").into(),
        format!("Switch to {name}").into(),
        TypedValue::UInt64(id),
    ]
}

fn api_server() -> RemoteServer {
    RemoteServer::new()
        .handle(API_CLASS, "OBS_API_initAPI", |_| vec![TypedValue::UInt64(0), TypedValue::Int32(0)])
        .handle(API_CLASS, "OBS_API_getPerformanceStatistics", |_| stats_values(true))
        .handle(API_CLASS, "OBS_API_QueryHotkeys", |_| {
            let mut v = vec![TypedValue::UInt64(0)];
            v.extend(hotkey("a", 10));
            v.extend(hotkey("b", 11));
            v
        })
        .handle(API_CLASS, "StopCrashHandler", |_| vec![TypedValue::UInt64(0)])
        .handle(API_CLASS, "SetUsername", |_| Vec::new())
        .handle(API_CLASS, "SetWorkingDirectory", |_| Vec::new())
        .handle(API_CLASS, "OBS_API_ProcessHotkeyStatus", |_| Vec::new())
        .handle(API_CLASS, "OBS_API_destroyOBS_API", |_| Vec::new())
}

struct Session {
    api: Api,
    server: ServerHandle,
    slot: ConnectionSlot,
    host: HostLoop,
}

fn session(server: RemoteServer) -> Session {
    let (client, server_end) = pair();
    let server = server.spawn(server_end).expect("spawn server");
    let slot = ConnectionSlot::new();
    slot.install(Connection::open(client, ConnectionConfig::default()).expect("open"));
    let host = HostLoop::new();
    let api = Api::new(slot.clone(), host.handle(), BridgeConfig::default());
    Session {
        api,
        server,
        slot,
        host,
    }
}

// ===========================================================================
// No connection
// ===========================================================================

#[test]
fn without_connection_everything_is_skipped() {
    let host = HostLoop::new();
    let api = Api::new(ConnectionSlot::new(), host.handle(), BridgeConfig::default());

    assert!(api.init_api("en-US", "/tmp", "1").expect("no error").is_none());
    assert!(api.performance_statistics().expect("no error").is_none());
    assert!(api.query_hotkeys().expect("no error").is_none());
    api.destroy_obs_api();
    api.set_username("x");
    api.stop_crash_handler();

    let v = api.invoke("OBS_API_QueryHotkeys", &[]).expect("no error");
    assert!(v.is_undefined());
}

#[test]
fn after_disconnect_calls_are_skipped() {
    let s = session(api_server());
    s.slot.disconnect();
    assert!(s.api.performance_statistics().expect("no error").is_none());
    assert!(s.server.received().is_empty());
}

// ===========================================================================
// Arguments
// ===========================================================================

#[test]
fn bad_argument_rejected_before_any_call() {
    let s = session(api_server());

    let err = s
        .api
        .invoke("OBS_API_ProcessHotkeyStatus", &["7".into(), true.into()])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { index: 0, .. }));

    let err = s
        .api
        .invoke("OBS_API_ProcessHotkeyStatus", &[7u64.into()])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { index: 1, .. }));

    let err = s.api.invoke("SetUsername", &[]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { index: 0, .. }));

    let err = s
        .api
        .invoke("OBS_API_ProcessHotkeyStatus", &[HostValue::Number(1.5), true.into()])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { index: 0, .. }));

    assert!(!s.server.wait_for(1, 100));
}

#[test]
fn hotkey_id_beyond_u64_range_is_rejected() {
    let s = session(api_server());

    // 2^64 is one past u64::MAX and must not be clamped to it.
    for id in [18_446_744_073_709_551_616.0, 1e30, -1.0] {
        let err = s
            .api
            .invoke("OBS_API_ProcessHotkeyStatus", &[HostValue::Number(id), true.into()])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { index: 0, .. }), "{id}: {err:?}");
    }
    assert!(!s.server.wait_for(1, 100));

    let largest_exact = HostValue::Number(9_007_199_254_740_992.0);
    s.api
        .invoke("OBS_API_ProcessHotkeyStatus", &[largest_exact, true.into()])
        .expect("2^53 accepted");
    assert!(s.server.wait_for(1, 2000));
    assert_eq!(
        s.server.received()[0].values[0],
        TypedValue::UInt64(9_007_199_254_740_992)
    );
}

#[test]
fn unknown_export_is_error() {
    let s = session(api_server());
    assert!(matches!(
        s.api.invoke("OBS_API_Nope", &[]),
        Err(Error::UnknownMethod(name)) if name == "OBS_API_Nope"
    ));
}

#[test]
fn every_export_is_dispatched() {
    let host = HostLoop::new();
    let api = Api::new(ConnectionSlot::new(), host.handle(), BridgeConfig::default());
    for name in EXPORTS {
        let r = api.invoke(name, &[]);
        assert!(!matches!(r, Err(Error::UnknownMethod(_))), "{name}");
    }
}

// ===========================================================================
// initAPI
// ===========================================================================

#[test]
fn init_api_sends_wire_order_and_returns_code() {
    let server = api_server().handle(API_CLASS, "OBS_API_initAPI", |_| {
        vec![TypedValue::UInt64(0), TypedValue::Int32(-2)]
    });
    let s = session(server);

    let code = s
        .api
        .invoke("OBS_API_initAPI", &["en-US".into(), "/data".into(), "2.0".into()])
        .expect("init");
    assert_eq!(code, HostValue::Number(-2.0));

    let calls = s.server.received();
    assert_eq!(calls[0].method, "OBS_API_initAPI");
    assert_eq!(calls[0].kind, EnvelopeKind::Call);
    assert_eq!(
        calls[0].values,
        vec![
            TypedValue::from("/data"),
            TypedValue::from("en-US"),
            TypedValue::from("2.0"),
        ]
    );
}

#[test]
fn init_api_arms_freeze_watchdog_with_path() {
    let (client, server_end) = pair();
    let _server = api_server().spawn(server_end).expect("spawn");
    let slot = ConnectionSlot::new();
    slot.install(Connection::open(client, ConnectionConfig::default()).expect("open"));
    let host = HostLoop::new();

    let events: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let api = Api::new(slot.clone(), host.handle(), BridgeConfig::default())
        .with_freeze_callback(Arc::new(move |frozen: bool, _: &str| sink.lock().unwrap().push(frozen)));

    assert_eq!(api.init_api("en-US", "/data", "2.0").expect("init"), Some(0));
    let conn = slot.get().expect("installed");
    assert_eq!(conn.watchdog_path().as_deref(), Some("/data"));
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn init_api_failure_and_short_reply() {
    let failing = api_server().handle(API_CLASS, "OBS_API_initAPI", |_| {
        vec![TypedValue::UInt64(3), "graphics init failed".into()]
    });
    let s = session(failing);
    match s.api.init_api("en-US", "/data", "2.0") {
        Err(Error::Remote { status, message }) => {
            assert_eq!(status, 3);
            assert_eq!(message, "graphics init failed");
        }
        other => panic!("unexpected: {other:?}"),
    }

    let short = api_server().handle(API_CLASS, "OBS_API_initAPI", |_| vec![TypedValue::UInt64(0)]);
    let s = session(short);
    assert!(matches!(
        s.api.init_api("en-US", "/data", "2.0"),
        Err(Error::Truncated { expected: 2, actual: 1, .. })
    ));
}

// ===========================================================================
// Performance statistics
// ===========================================================================

#[test]
fn performance_statistics_decoded() {
    let s = session(api_server());
    let stats = s.api.performance_statistics().expect("call").expect("connected");
    assert_eq!(stats.cpu, 12.5);
    assert_eq!(stats.dropped_frames, 3);
    assert_eq!(stats.dropped_frames_pct, 0.5);
    assert_eq!(stats.frame_rate, 60.0);
    assert_eq!(stats.memory_usage, 412.0);
    assert_eq!(stats.disk_space_available, "118 GB");

    let host = stats.to_host();
    assert_eq!(host.get("CPU"), Some(&HostValue::Number(12.5)));
    assert_eq!(host.get("numberDroppedFrames"), Some(&HostValue::Number(3.0)));
    assert_eq!(host.get("averageTimeToRenderFrame"), Some(&HostValue::Number(1.25)));
    assert_eq!(host.get("diskSpaceAvailable"), Some(&HostValue::from("118 GB")));
}

#[test]
fn eleven_element_statistics_default_disk_space() {
    let server = api_server().handle(API_CLASS, "OBS_API_getPerformanceStatistics", |_| {
        stats_values(false)
    });
    let s = session(server);
    let stats = s.api.performance_statistics().expect("call").expect("connected");
    assert_eq!(stats.disk_space_available, DISK_SPACE_UNKNOWN);
    assert_eq!(stats.disk_space_available, "0 MB");
}

#[test]
fn empty_disk_space_string_defaults_too() {
    let server = api_server().handle(API_CLASS, "OBS_API_getPerformanceStatistics", |_| {
        let mut v = stats_values(false);
        v.push("".into());
        v
    });
    let s = session(server);
    let v = s.api.invoke("OBS_API_getPerformanceStatistics", &[]).expect("call");
    assert_eq!(v.get("diskSpaceAvailable"), Some(&HostValue::from("0 MB")));
}

#[test]
fn short_statistics_reply_is_truncated() {
    let server = api_server().handle(API_CLASS, "OBS_API_getPerformanceStatistics", |_| {
        let mut v = stats_values(false);
        v.truncate(6);
        v
    });
    let s = session(server);
    assert!(matches!(
        s.api.performance_statistics(),
        Err(Error::Truncated { expected: 11, actual: 6, .. })
    ));
}

#[test]
fn statistics_after_server_loss_is_transport_error() {
    let mut s = session(api_server());
    s.server.shutdown();
    assert!(matches!(s.api.performance_statistics(), Err(Error::Transport)));
}

// ===========================================================================
// Hotkeys
// ===========================================================================

#[test]
fn two_hotkey_groups_decode_in_field_order() {
    let s = session(api_server());
    let list = s.api.query_hotkeys().expect("call").expect("connected");
    assert_eq!(
        list,
        vec![
            HotkeyInfo {
                object_name: "Scene a".into(),
                object_type: 2,
                hotkey_name: "select.a".into(),
                hotkey_desc: "Switch to a".into(),
                hotkey_id: 10,
            },
            HotkeyInfo {
                object_name: "Scene b".into(),
                object_type: 2,
                hotkey_name: "select.b".into(),
                hotkey_desc: "Switch to b".into(),
                hotkey_id: 11,
            },
        ]
    );
}

#[test]
fn partial_trailing_hotkey_group_ignored() {
    let server = api_server().handle(API_CLASS, "OBS_API_QueryHotkeys", |_| {
        let mut v = vec![TypedValue::UInt64(0)];
        v.extend(hotkey("a", 1));
        v.extend(hotkey("b", 2).into_iter().take(3));
        v
    });
    let s = session(server);
    let list = s.api.query_hotkeys().expect("call").expect("connected");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].hotkey_id, 1);
}

#[test]
fn hotkeys_as_host_array() {
    let s = session(api_server());
    let v = s.api.invoke("OBS_API_QueryHotkeys", &[]).expect("call");
    let items = v.as_array().expect("array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].get("ObjectName"), Some(&HostValue::from("Scene b")));
    assert_eq!(items[1].get("ObjectType"), Some(&HostValue::Number(2.0)));
    assert_eq!(items[1].get("HotkeyName"), Some(&HostValue::from("select.b")));
    assert_eq!(items[1].get("HotkeyDesc"), Some(&HostValue::from("Switch to b")));
    assert_eq!(items[1].get("HotkeyId"), Some(&HostValue::Number(11.0)));
}

#[test]
fn no_hotkeys_is_empty_list() {
    let server = api_server().handle(API_CLASS, "OBS_API_QueryHotkeys", |_| vec![TypedValue::UInt64(0)]);
    let s = session(server);
    assert_eq!(s.api.query_hotkeys().expect("call"), Some(Vec::new()));
}

// ===========================================================================
// Fire-and-forget and shutdown calls
// ===========================================================================

#[test]
fn posted_operations_reach_server() {
    let s = session(api_server());
    s.api.invoke("SetUsername", &["streamer".into()]).expect("post");
    s.api.invoke("SetWorkingDirectory", &["/opt/obs".into()]).expect("post");
    s.api
        .invoke("OBS_API_ProcessHotkeyStatus", &[42u64.into(), true.into()])
        .expect("post");
    s.api.invoke("OBS_API_destroyOBS_API", &[]).expect("post");
    assert!(s.server.wait_for(4, 2000));

    let calls = s.server.received();
    assert!(calls.iter().all(|c| c.kind == EnvelopeKind::Post));
    assert_eq!(calls[0].values, vec![TypedValue::from("streamer")]);
    assert_eq!(calls[1].values, vec![TypedValue::from("/opt/obs")]);
    assert_eq!(
        calls[2].values,
        vec![TypedValue::UInt64(42), TypedValue::UInt32(1)]
    );
    assert_eq!(calls[3].method, "OBS_API_destroyOBS_API");
    assert!(calls[3].values.is_empty());
}

#[test]
fn stop_crash_handler_ignores_failed_reply() {
    let server = api_server().handle(API_CLASS, "StopCrashHandler", |_| {
        vec![TypedValue::UInt64(1), "already stopped".into()]
    });
    let s = session(server);
    assert_eq!(s.api.invoke("StopCrashHandler", &[]).expect("no error"), HostValue::Undefined);
    let calls = s.server.received();
    assert_eq!(calls[0].kind, EnvelopeKind::Call);
}

// ===========================================================================
// Permissions
// ===========================================================================

#[test]
fn permissions_status_object() {
    let s = session(api_server());
    let v = s.api.invoke("GetPermissionsStatus", &[]).expect("status");
    assert_eq!(v.get("webcamPermission"), Some(&HostValue::Bool(false)));
    assert_eq!(v.get("micPermission"), Some(&HostValue::Bool(false)));
}

#[test]
fn request_permissions_calls_back_on_host_thread() {
    let s = session(api_server());
    let seen: Rc<RefCell<Vec<HostValue>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let callback = HostFunction::new(move |args: &[HostValue]| {
        sink.borrow_mut().push(args[0].clone());
    });

    s.api
        .invoke("RequestPermissions", &[callback.into()])
        .expect("request");
    assert_eq!(s.api.permission_state(), QueueState::Running);
    assert!(seen.borrow().is_empty());

    assert!(s.host.run_until_idle(Duration::from_secs(1)));
    assert_eq!(seen.borrow().len(), 2);
    for v in seen.borrow().iter() {
        assert_eq!(v.get("webcamPermission"), Some(&HostValue::Bool(false)));
        assert_eq!(v.get("micPermission"), Some(&HostValue::Bool(false)));
    }
    assert_eq!(s.api.permission_state(), QueueState::Idle);
}

#[test]
fn request_permissions_requires_function() {
    let s = session(api_server());
    assert!(matches!(
        s.api.invoke("RequestPermissions", &["nope".into()]),
        Err(Error::InvalidArgument { index: 0, expected: "function" })
    ));
    assert_eq!(s.api.permission_state(), QueueState::Idle);
}

#[test]
fn new_request_replaces_previous() {
    let s = session(api_server());
    s.api.request_permissions(|_| {});
    s.api.request_permissions(|_| {});
    assert_eq!(s.host.active_runners(), 1);
    assert!(s.host.run_until_idle(Duration::from_secs(1)));
}
