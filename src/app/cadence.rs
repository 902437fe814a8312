//! The two periodic loops.
//!
//! ```text
//!  ServerLoop (server_tick_ms)              StreamLoop (control_interval_ms)
//!  ─────────────────────────────            ───────────────────────────────
//!  1. flush queued telemetry → peer         1. sample measurement (no lock)
//!  2. poll transport                        2. lock → control_step → unlock
//!     frame  → lock, dispatch, unlock,      3. emit telemetry (no lock)
//!              reply                        4. sleep
//!     none   → lock, silent tick, unlock
//!  3. sleep unless a frame was handled
//! ```
//!
//! Each loop is a plain struct with a `tick()` that performs exactly one
//! iteration, so tests drive them step by step without threads or sleeps.
//! `run()` wraps `tick()` with the task-watchdog feed and the delay.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::drivers::watchdog::Watchdog;
use crate::rpc::channels::TelemetryChannel;
use crate::rpc::codec::FRAME_LEN;
use crate::rpc::engine;
use crate::rpc::stream::StreamTransition;
use crate::rpc::transport::Transport;

use super::events::{AppEvent, TelemetryData};
use super::ports::{EventSink, MeasurementPort};
use super::service::ControlHandle;

/// Receive buffer.  Larger than a frame so oversized datagrams are seen
/// at full length and rejected, not silently truncated to a valid frame.
const RECV_BUF_LEN: usize = 64;

// ───────────────────────────────────────────────────────────────
// Server loop
// ───────────────────────────────────────────────────────────────

/// What one server tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A well-formed frame was applied and answered.
    Handled,
    /// A datagram failed to decode and was dropped.
    Malformed,
    /// Nothing arrived; the watchdog counted a silent tick.
    Idle,
    /// The transport reported a receive error.
    TransportError,
}

pub struct ServerLoop<T: Transport, S: EventSink> {
    transport: T,
    handle: ControlHandle,
    telemetry: Arc<TelemetryChannel>,
    sink: S,
    /// Most recent sender of a well-formed frame; telemetry goes here.
    peer: Option<T::Peer>,
    buf: [u8; RECV_BUF_LEN],
}

impl<T: Transport, S: EventSink> ServerLoop<T, S> {
    pub fn new(transport: T, handle: ControlHandle, telemetry: Arc<TelemetryChannel>, sink: S) -> Self {
        Self {
            transport,
            handle,
            telemetry,
            sink,
            peer: None,
            buf: [0; RECV_BUF_LEN],
        }
    }

    pub fn peer(&self) -> Option<T::Peer> {
        self.peer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// One server iteration.
    pub fn tick(&mut self) -> TickOutcome {
        self.flush_telemetry();

        match self.transport.receive_if_available(&mut self.buf) {
            Ok(Some((len, peer))) => self.handle_datagram(len, peer),
            Ok(None) => {
                let (transition, silent_ticks) = self.handle.with(|s| {
                    let t = s.stream_mut().on_silent_tick();
                    (t, s.stream().ticks_since_last_message())
                });
                if transition == Some(StreamTransition::Stopped) {
                    self.sink.emit(&AppEvent::StreamStopped { silent_ticks });
                    info!("Stats: {}", self.handle.with(|s| s.stats().summary()));
                }
                TickOutcome::Idle
            }
            Err(e) => {
                warn!("Server: {}", e);
                self.handle.with(|s| s.stats_mut().record_receive_failure());
                TickOutcome::TransportError
            }
        }
    }

    fn handle_datagram(&mut self, len: usize, peer: T::Peer) -> TickOutcome {
        let bytes = &self.buf[..len];
        let dispatched = match self.handle.with(|s| engine::dispatch(bytes, s)) {
            Ok(d) => d,
            Err(e) => {
                self.sink.emit(&AppEvent::FrameDropped(e));
                return TickOutcome::Malformed;
            }
        };

        self.peer = Some(peer);
        if dispatched.transition == Some(StreamTransition::Resumed) {
            self.sink.emit(&AppEvent::StreamResumed);
        }
        if let (Some(reason), Some(opcode)) = (dispatched.rejection, dispatched.response.opcode()) {
            self.sink.emit(&AppEvent::CommandRejected { opcode, reason });
        }

        let frame = dispatched.response.encode();
        self.send(&frame, peer);
        TickOutcome::Handled
    }

    /// Forward queued telemetry to the current peer.  Without a peer the
    /// frames have nowhere to go and are discarded.
    fn flush_telemetry(&mut self) {
        while let Ok(frame) = self.telemetry.try_receive() {
            if let Some(peer) = self.peer {
                self.send(&frame, peer);
            }
        }
    }

    fn send(&mut self, frame: &[u8; FRAME_LEN], peer: T::Peer) {
        if let Err(e) = self.transport.reply(frame, peer) {
            debug!("Server: reply to {:?} failed: {}", peer, e);
            self.handle.with(|s| s.stats_mut().record_send_failure());
        }
    }

    /// Run forever on the calling thread.  The loop sleeps one server tick
    /// after every tick that did not handle a frame, so a burst of requests
    /// drains without delay.
    pub fn run(mut self, delay: &mut impl DelayNs, config: &SystemConfig) -> ! {
        let tick_ms = config.server_tick_ms;
        let watchdog = Watchdog::new(config.task_watchdog_timeout_ms);
        let timeout_ticks = self.handle.with(|s| s.stream().timeout_ticks());
        self.sink.emit(&AppEvent::Started { timeout_ticks });

        loop {
            let outcome = self.tick();
            watchdog.feed();
            if !matches!(outcome, TickOutcome::Handled | TickOutcome::Malformed) {
                delay.delay_ms(tick_ms);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Stream loop
// ───────────────────────────────────────────────────────────────

pub struct StreamLoop<M: MeasurementPort, S: EventSink> {
    measurement: M,
    handle: ControlHandle,
    sink: S,
    dt: f32,
}

impl<M: MeasurementPort, S: EventSink> StreamLoop<M, S> {
    pub fn new(measurement: M, handle: ControlHandle, sink: S, dt: f32) -> Self {
        Self {
            measurement,
            handle,
            sink,
            dt,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// One control iteration.  The sample is taken before the lock and the
    /// telemetry is emitted after it is released.
    pub fn tick(&mut self) -> Option<TelemetryData> {
        let sample = self.measurement.sample();
        let dt = self.dt;
        let telemetry = self.handle.with(|s| s.control_step(sample, dt));
        if let Some(t) = telemetry {
            self.sink.emit(&AppEvent::Telemetry(t));
        }
        telemetry
    }

    pub fn run(mut self, delay: &mut impl DelayNs, config: &SystemConfig) -> ! {
        let interval_ms = config.control_interval_ms;
        let watchdog = Watchdog::new(config.task_watchdog_timeout_ms);
        loop {
            self.tick();
            watchdog.feed();
            delay.delay_ms(interval_ms);
        }
    }
}
