// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Drives the whole bridge against an in-process server.
//
// Usage:
//   demo_bridge            (grant both permissions)
//   demo_bridge deny       (deny the microphone)
//
// Logging follows RUST_LOG, e.g. RUST_LOG=obs_bridge=trace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use obs_bridge::{
    pair, Api, BridgeConfig, Capability, CapabilityBridge, Connection, ConnectionConfig,
    ConnectionSlot, HostFunction, HostLoop, HostValue, PermissionQuery, RemoteServer,
    TypedValue, API_CLASS,
};

/// Answers after a short delay on its own thread, like a system prompt.
struct PromptingQuery {
    camera: AtomicBool,
    mic: AtomicBool,
    grant_mic: bool,
}

impl PermissionQuery for PromptingQuery {
    fn authorized(&self, cap: Capability) -> bool {
        match cap {
            Capability::Camera => self.camera.load(Ordering::Acquire),
            Capability::Microphone => self.mic.load(Ordering::Acquire),
        }
    }

    fn request_access(&self, cap: Capability, done: Box<dyn FnOnce(bool) + Send>) {
        let granted = match cap {
            Capability::Camera => true,
            Capability::Microphone => self.grant_mic,
        };
        match cap {
            Capability::Camera => self.camera.store(granted, Ordering::Release),
            Capability::Microphone => self.mic.store(granted, Ordering::Release),
        }
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            done(granted);
        });
    }
}

fn server() -> RemoteServer {
    RemoteServer::new()
        .handle(API_CLASS, "OBS_API_initAPI", |args| {
            let path = args.first().and_then(|v| v.as_str().ok()).unwrap_or_default();
            println!("server: initAPI at {path}");
            vec![TypedValue::UInt64(0), TypedValue::Int32(0)]
        })
        .handle(API_CLASS, "OBS_API_getPerformanceStatistics", |_| {
            vec![
                TypedValue::UInt64(0),
                TypedValue::Float64(12.5),
                TypedValue::Int32(3),
                TypedValue::Float64(0.2),
                TypedValue::Float64(2500.0),
                TypedValue::Float64(18.75),
                TypedValue::Float64(0.0),
                TypedValue::Float64(0.0),
                TypedValue::Float64(60.0),
                TypedValue::Float64(1.4),
                TypedValue::Float64(412.0),
                TypedValue::String("118 GB".into()),
            ]
        })
        .handle(API_CLASS, "OBS_API_QueryHotkeys", |_| {
            vec![
                TypedValue::UInt64(0),
                TypedValue::String("Scene".into()),
                TypedValue::UInt32(2),
                TypedValue::String("OBSBasic.SelectScene".into()),
                TypedValue::String("Switch to scene".into()),
                TypedValue::UInt64(7),
            ]
        })
        .handle(API_CLASS, "SetUsername", |_| Vec::new())
        .handle(API_CLASS, "StopCrashHandler", |_| vec![TypedValue::UInt64(0)])
}

fn main() -> obs_bridge::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let grant_mic = std::env::args().nth(1).as_deref() != Some("deny");

    let (client_end, server_end) = pair();
    let mut server = server().spawn(server_end)?;

    let slot = ConnectionSlot::new();
    slot.install(Connection::open(client_end, ConnectionConfig::from_env())?);

    let host = HostLoop::new();
    let bridge = CapabilityBridge::Platform(Arc::new(PromptingQuery {
        camera: AtomicBool::new(false),
        mic: AtomicBool::new(false),
        grant_mic,
    }));
    let api = Api::new(slot.clone(), host.handle(), BridgeConfig::new(bridge))
        .with_freeze_callback(Arc::new(|frozen: bool, path: &str| {
            println!("watchdog: frozen={frozen} ({path})");
        }));

    let code = api.invoke(
        "OBS_API_initAPI",
        &["en-US".into(), "/tmp/obs-demo".into(), "0.1.0".into()],
    )?;
    println!("initAPI -> {code:?}");

    let stats = api.invoke("OBS_API_getPerformanceStatistics", &[])?;
    for key in ["CPU", "frameRate", "diskSpaceAvailable"] {
        println!("stats.{key} = {:?}", stats.get(key));
    }

    let hotkeys = api.invoke("OBS_API_QueryHotkeys", &[])?;
    println!("hotkeys = {hotkeys:?}");

    api.invoke("SetUsername", &["demo".into()])?;

    println!("permissions now: {:?}", api.invoke("GetPermissionsStatus", &[])?);
    let on_result = HostFunction::new(|args: &[HostValue]| {
        println!("permission result: {:?}", args.first());
    });
    api.invoke("RequestPermissions", &[on_result.into()])?;
    if !host.run_until_idle(Duration::from_secs(5)) {
        println!("permission request did not finish");
    }

    match api.invoke("NoSuchMethod", &[]) {
        Err(e) => println!("NoSuchMethod -> {e}"),
        Ok(v) => println!("NoSuchMethod -> {v:?}"),
    }

    api.invoke("StopCrashHandler", &[])?;
    slot.disconnect();
    println!("after disconnect: {:?}", api.invoke("OBS_API_QueryHotkeys", &[])?);

    server.shutdown();
    for call in server.received() {
        println!("server saw {:?} {}.{}", call.kind, call.class, call.method);
    }
    Ok(())
}
