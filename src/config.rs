//! System configuration parameters
//!
//! All tunable parameters for the controller server.  Nothing is persisted:
//! the defaults below apply at every boot, optionally overridden by a JSON
//! document on the host build.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::control::pid::PidGains;
use crate::error::{Error, Result};
use crate::rpc::stream;

/// What the control path does while telemetry is not being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppedPolicy {
    /// Skip the PID update entirely; the integrator holds its value.
    #[default]
    Freeze,
    /// Keep integrating, only suppress the publish.
    Continue,
}

/// Address family of the command socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpFamily {
    /// `0.0.0.0`
    #[default]
    V4,
    /// `[::]`.  Dual-stack where the IP stack maps IPv4 onto it.
    V6,
}

impl IpFamily {
    /// Wildcard address for this family.
    pub fn unspecified(self) -> IpAddr {
        match self {
            Self::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Self::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Network ---
    /// UDP port the command server binds to
    pub udp_port: u16,
    /// Listen on `0.0.0.0` or `[::]`
    pub ip_family: IpFamily,
    /// WiFi station SSID
    pub wifi_ssid: heapless::String<32>,
    /// WiFi station password (empty for open networks)
    pub wifi_password: heapless::String<64>,

    // --- Timing ---
    /// Server (request path) tick period in milliseconds
    pub server_tick_ms: u32,
    /// Silence before the telemetry stream is stopped (seconds)
    pub no_msg_timeout_secs: f32,
    /// Control / telemetry period in milliseconds
    pub control_interval_ms: u32,
    /// Task watchdog timeout in milliseconds
    pub task_watchdog_timeout_ms: u32,

    // --- Controller ---
    pub stopped_policy: StoppedPolicy,
    pub initial_gains: PidGains,
    pub initial_setpoint: f32,

    // --- Measurement ---
    /// ADC1 channel sampled by the control loop
    pub adc_channel: u32,
    /// measurement = raw * scale + offset
    pub measurement_scale: f32,
    pub measurement_offset: f32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            udp_port: 1200,
            ip_family: IpFamily::V4,
            wifi_ssid: heapless::String::new(),
            wifi_password: heapless::String::new(),

            // Ticks shorter than 20 ms starve the IP stack on the ESP32.
            server_tick_ms: 20,
            no_msg_timeout_secs: 15.0,
            control_interval_ms: 20,
            task_watchdog_timeout_ms: 10_000,

            stopped_policy: StoppedPolicy::Freeze,
            initial_gains: PidGains::default(),
            initial_setpoint: 0.0,

            adc_channel: 0,
            measurement_scale: 1.0,
            measurement_offset: 0.0,
        }
    }
}

impl SystemConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|_| Error::Config("unparseable JSON"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_tick_ms == 0 {
            return Err(Error::Config("server_tick_ms must be > 0"));
        }
        if self.control_interval_ms == 0 {
            return Err(Error::Config("control_interval_ms must be > 0"));
        }
        if !(self.no_msg_timeout_secs > 0.0 && self.no_msg_timeout_secs.is_finite()) {
            return Err(Error::Config("no_msg_timeout_secs must be positive"));
        }
        if self.task_watchdog_timeout_ms <= self.server_tick_ms.max(self.control_interval_ms) {
            return Err(Error::Config("task watchdog must outlast a tick"));
        }
        if !self.measurement_scale.is_finite() || !self.measurement_offset.is_finite() {
            return Err(Error::Config("measurement scale/offset must be finite"));
        }
        let PidGains { kp, ki, kd } = self.initial_gains;
        if !(kp.is_finite() && ki.is_finite() && kd.is_finite() && self.initial_setpoint.is_finite())
        {
            return Err(Error::Config("initial gains/setpoint must be finite"));
        }
        Ok(())
    }

    /// Address the command socket binds to.
    pub fn listen_addr(&self) -> IpAddr {
        self.ip_family.unspecified()
    }

    /// Watchdog threshold in server ticks.
    pub fn timeout_ticks(&self) -> u32 {
        stream::timeout_ticks(self.no_msg_timeout_secs, self.server_tick_ms)
    }

    /// Integration step of the control loop in seconds.
    pub fn control_dt_secs(&self) -> f32 {
        self.control_interval_ms as f32 / 1000.0
    }
}
