//! PID Controller Server — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  UdpTransport   AdcSource        LogEventSink   WifiAdapter    │
//! │  (Transport)    (Measurement)    TelemetryQueue (Connectivity) │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────────────┐         ┌──────────────────────┐     │
//! │  │ ServerLoop (core 0)  │──lock──▶│    ControlHandle     │     │
//! │  │ requests + watchdog  │         │ PID · Stream · stats │     │
//! │  └──────────────────────┘         └──────────────────────┘     │
//! │             ▲ telemetry channel              ▲                 │
//! │  ┌──────────┴───────────┐                    │                 │
//! │  │ StreamLoop (core 1)  │───────lock─────────┘                 │
//! │  │ sample · PID · emit  │                                      │
//! │  └──────────────────────┘                                      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use std::sync::Arc;

use anyhow::{Context, Result};
use embedded_hal::delay::DelayNs;
use log::{info, warn};

use pidserver::adapters::adc::AdcSource;
use pidserver::adapters::log_sink::LogEventSink;
use pidserver::adapters::telemetry_sink::TelemetryQueueSink;
use pidserver::adapters::time::TaskDelay;
use pidserver::adapters::udp_transport::UdpTransport;
use pidserver::adapters::wifi::{ConnectivityPort, WifiAdapter, wait_until_ready};
use pidserver::app::cadence::{ServerLoop, StreamLoop};
use pidserver::app::service::{ControlHandle, ControlState};
use pidserver::config::SystemConfig;
use pidserver::drivers::task_pin::{Core, spawn_on_core};
use pidserver::rpc::channels::TelemetryChannel;
use pidserver::rpc::codec::PROTOCOL_VERSION;

// ── Task parameters ───────────────────────────────────────────
const SERVER_TASK_PRIORITY: u8 = 5;
const STREAM_TASK_PRIORITY: u8 = 4;
const TASK_STACK_KB: usize = 8;

/// How often the main thread polls WiFi and logs counters.
const SUPERVISOR_PERIOD_MS: u32 = 1_000;
const STATS_LOG_EVERY: u32 = 60;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Platform bootstrap + logging ───────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }
    #[cfg(not(target_os = "espidf"))]
    init_host_logging();

    info!("╔══════════════════════════════════════╗");
    info!("║  PID server v{} (protocol {})        ║", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION);
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config()?;
    info!(
        "Config: listen={}:{} tick={}ms control={}ms timeout={}s ({} ticks) policy={:?}",
        config.listen_addr(),
        config.udp_port,
        config.server_tick_ms,
        config.control_interval_ms,
        config.no_msg_timeout_secs,
        config.timeout_ticks(),
        config.stopped_policy
    );

    // ── 3. Network ────────────────────────────────────────────
    let mut delay = TaskDelay;
    let mut wifi = bring_up_wifi(&config, &mut delay)?;

    // ── 4. Shared state + adapters ────────────────────────────
    let handle = ControlHandle::new(ControlState::new(&config));
    let telemetry = Arc::new(TelemetryChannel::new());
    let transport = UdpTransport::bind_on(config.listen_addr(), config.udp_port)
        .context("binding UDP server socket")?;

    #[cfg(target_os = "espidf")]
    let adc = AdcSource::open(&config).context("opening ADC")?;
    #[cfg(not(target_os = "espidf"))]
    let (adc, _probe) = AdcSource::open(&config).context("opening ADC")?;

    // ── 5. Tasks ──────────────────────────────────────────────
    let server = ServerLoop::new(transport, handle.clone(), telemetry.clone(), LogEventSink::new());
    let server_config = config.clone();
    spawn_on_core(Core::Pro, SERVER_TASK_PRIORITY, TASK_STACK_KB, "server\0", move || {
        server.run(&mut TaskDelay, &server_config)
    })
    .context("spawning server task")?;

    let stream = StreamLoop::new(
        adc,
        handle.clone(),
        (TelemetryQueueSink::new(telemetry), LogEventSink::new()),
        config.control_dt_secs(),
    );
    let stream_config = config.clone();
    spawn_on_core(Core::App, STREAM_TASK_PRIORITY, TASK_STACK_KB, "stream\0", move || {
        stream.run(&mut TaskDelay, &stream_config)
    })
    .context("spawning stream task")?;

    info!("System ready.");

    // ── 6. Supervisor ─────────────────────────────────────────
    let mut seconds: u32 = 0;
    loop {
        if let Some(wifi) = wifi.as_mut() {
            wifi.poll();
        }
        seconds = seconds.wrapping_add(1);
        if seconds % STATS_LOG_EVERY == 0 {
            let snapshot = handle.snapshot();
            info!(
                "Stats: {} | running={} enabled={} policy={:?} steps={}",
                snapshot.stats().summary(),
                snapshot.stream().is_running(),
                snapshot.stream().is_enabled(),
                snapshot.policy(),
                snapshot.step_count()
            );
        }
        delay.delay_ms(SUPERVISOR_PERIOD_MS);
    }
}

// ── Helpers ───────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
fn init_host_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_names(true)
        .init();
}

/// Host: optional JSON file as the first argument.
#[cfg(not(target_os = "espidf"))]
fn load_config() -> Result<SystemConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            let config = SystemConfig::from_json(&text).with_context(|| format!("parsing {path}"))?;
            info!("Config loaded from {}", path);
            Ok(config)
        }
        None => {
            info!("No config file given, using defaults");
            Ok(SystemConfig::default())
        }
    }
}

/// Device: compiled-in defaults, credentials from the build environment.
#[cfg(target_os = "espidf")]
fn load_config() -> Result<SystemConfig> {
    let mut config = SystemConfig::default();
    if let Some(ssid) = option_env!("PIDSERVER_WIFI_SSID") {
        config
            .wifi_ssid
            .push_str(ssid)
            .map_err(|()| anyhow::anyhow!("PIDSERVER_WIFI_SSID longer than 32 bytes"))?;
    }
    if let Some(password) = option_env!("PIDSERVER_WIFI_PASSWORD") {
        config
            .wifi_password
            .push_str(password)
            .map_err(|()| anyhow::anyhow!("PIDSERVER_WIFI_PASSWORD longer than 64 bytes"))?;
    }
    config.validate()?;
    Ok(config)
}

/// Associate and wait for an IP before any loop starts.
#[cfg(target_os = "espidf")]
fn bring_up_wifi(config: &SystemConfig, delay: &mut TaskDelay) -> Result<Option<WifiAdapter>> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();

    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop, nvs)?;
    wifi.set_credentials(config.wifi_ssid.as_str(), config.wifi_password.as_str())?;
    if let Err(e) = wifi.connect() {
        warn!("WiFi: first attempt failed ({}), retrying with backoff", e);
    }
    wait_until_ready(&mut wifi, delay, 500, None);
    Ok(Some(wifi))
}

/// Host: the OS network is already up.  A configured SSID runs the
/// simulated adapter so the reconnect path is exercised.
#[cfg(not(target_os = "espidf"))]
fn bring_up_wifi(config: &SystemConfig, delay: &mut TaskDelay) -> Result<Option<WifiAdapter>> {
    if config.wifi_ssid.is_empty() {
        return Ok(None);
    }
    let mut wifi = WifiAdapter::new();
    wifi.set_credentials(config.wifi_ssid.as_str(), config.wifi_password.as_str())?;
    if let Err(e) = wifi.connect() {
        warn!("WiFi(sim): {}", e);
    }
    if !wait_until_ready(&mut wifi, delay, 100, Some(10_000)) {
        anyhow::bail!("WiFi(sim) not ready");
    }
    Ok(Some(wifi))
}
