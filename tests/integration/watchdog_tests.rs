//! Stream watchdog timing at the default configuration (15 s / 20 ms).

use std::sync::Arc;

use pidserver::app::cadence::{ServerLoop, TickOutcome};
use pidserver::app::service::{ControlHandle, ControlState};
use pidserver::config::{StoppedPolicy, SystemConfig};
use pidserver::control::pid::PidGains;
use pidserver::rpc::channels::TelemetryChannel;
use pidserver::rpc::codec::Opcode;

use crate::mock_hw::{MockTransport, RecordingSink};

fn server(config: &SystemConfig) -> (ServerLoop<MockTransport, RecordingSink>, ControlHandle) {
    let handle = ControlHandle::new(ControlState::new(config));
    let server = ServerLoop::new(
        MockTransport::new(),
        handle.clone(),
        Arc::new(TelemetryChannel::new()),
        RecordingSink::default(),
    );
    (server, handle)
}

fn idle(server: &mut ServerLoop<MockTransport, RecordingSink>, ticks: u32) {
    for _ in 0..ticks {
        assert_eq!(server.tick(), TickOutcome::Idle);
    }
}

#[test]
fn default_timeout_is_750_ticks() {
    let (mut server, handle) = server(&SystemConfig::default());

    idle(&mut server, 749);
    assert!(handle.snapshot().stream().is_running());
    assert_eq!(server.sink().stops(), 0);

    idle(&mut server, 1);
    assert!(!handle.snapshot().stream().is_running());
    assert_eq!(server.sink().stops(), 1);
}

#[test]
fn each_silence_episode_stops_once() {
    let (mut server, handle) = server(&SystemConfig::default());

    for episode in 1..=3 {
        idle(&mut server, 800);
        assert_eq!(server.sink().stops(), episode);
        server.transport_mut().push_command(Opcode::QueryStatus, 0.0, 0.0, 1);
        server.tick();
        assert_eq!(server.sink().resumes(), episode);
    }
    assert_eq!(handle.snapshot().stream().stop_count(), 3);
}

#[test]
fn activity_keeps_stream_alive_indefinitely() {
    let (mut server, handle) = server(&SystemConfig::default());
    for _ in 0..5 {
        idle(&mut server, 700);
        server.transport_mut().push_command(Opcode::QueryOutput, 0.0, 0.0, 1);
        server.tick();
    }
    assert!(handle.snapshot().stream().is_running());
    assert_eq!(server.sink().stops(), 0);
}

#[test]
fn query_status_reports_preceding_silence() {
    let (mut server, _) = server(&SystemConfig::default());
    idle(&mut server, 123);
    server.transport_mut().push_command(Opcode::QueryStatus, 0.0, 0.0, 1);
    server.tick();
    let status = server.transport().responses()[0];
    assert_eq!((status.arg0, status.arg1), (1.0, 123.0));
}

#[test]
fn continue_policy_integrates_through_silence() {
    let config = SystemConfig {
        no_msg_timeout_secs: 0.02,
        stopped_policy: StoppedPolicy::Continue,
        initial_gains: PidGains::new(0.0, 1.0, 0.0),
        initial_setpoint: 1.0,
        control_interval_ms: 1000,
        ..SystemConfig::default()
    };
    let (mut server, handle) = server(&config);
    idle(&mut server, 1);
    assert!(!handle.snapshot().stream().is_running());

    let dt = config.control_dt_secs();
    for _ in 0..3 {
        assert!(handle.with(|s| s.control_step(0.0, dt)).is_none());
    }
    assert_eq!(handle.snapshot().pid().integral(), 3.0);
}
