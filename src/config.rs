// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bridge configuration.

use std::time::Duration;

use crate::permissions::CapabilityBridge;

/// Endpoint class every control-API method lives under.
pub const API_CLASS: &str = "API";

/// Per-connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Give up on a synchronous call after this long. `None` waits until the
    /// reply arrives or the channel fails.
    pub reply_timeout: Option<Duration>,
    /// A synchronous call unanswered for this long reports a freeze to the
    /// registered freeze callback.
    pub freeze_threshold: Duration,
    /// How long the reply reader blocks on the transport before re-checking
    /// for shutdown.
    pub poll_interval: Duration,
    /// Send timeout for each frame.
    pub send_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reply_timeout: None,
            freeze_threshold: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
            send_timeout_ms: 1000,
        }
    }
}

impl ConnectionConfig {
    /// Defaults, overridden by environment variables when set:
    ///
    /// - `OBS_BRIDGE_REPLY_TIMEOUT_MS` (0 disables the timeout)
    /// - `OBS_BRIDGE_FREEZE_MS`
    /// - `OBS_BRIDGE_POLL_MS` (at least 1)
    ///
    /// Non-numeric values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading settings through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let ms = |key: &str| parse_ms(key, lookup(key)?);
        let mut cfg = Self::default();
        if let Some(ms) = ms("OBS_BRIDGE_REPLY_TIMEOUT_MS") {
            cfg.reply_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = ms("OBS_BRIDGE_FREEZE_MS") {
            cfg.freeze_threshold = Duration::from_millis(ms);
        }
        if let Some(ms) = ms("OBS_BRIDGE_POLL_MS") {
            cfg.poll_interval = Duration::from_millis(ms.max(1));
        }
        cfg
    }
}

fn parse_ms(key: &str, raw: String) -> Option<u64> {
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring non-numeric millisecond setting");
            None
        }
    }
}

/// Settings for the API surface.
#[derive(Clone)]
pub struct BridgeConfig {
    pub endpoint_class: String,
    /// Which permission backend `GetPermissionsStatus` / `RequestPermissions`
    /// talk to.
    pub capabilities: CapabilityBridge,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint_class: API_CLASS.to_owned(),
            capabilities: CapabilityBridge::Unsupported,
        }
    }
}

impl BridgeConfig {
    pub fn new(capabilities: CapabilityBridge) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }
}
