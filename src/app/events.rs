//! Outbound application events.
//!
//! The cadence loops emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log to serial, or queue a telemetry frame
//! for the peer.

use crate::error::Error;
use crate::rpc::codec::Opcode;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The loops are running (carries the watchdog threshold in ticks).
    Started { timeout_ticks: u32 },

    /// One control-step result, emitted only while streaming.
    Telemetry(TelemetryData),

    /// The peer was silent for the whole timeout.
    StreamStopped { silent_ticks: u32 },

    /// A frame arrived after a silence timeout.
    StreamResumed,

    /// A well-formed command was refused; prior values stay in effect.
    CommandRejected { opcode: Opcode, reason: Error },

    /// A request datagram failed to decode.
    FrameDropped(Error),
}

/// A point-in-time control snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryData {
    /// Control step counter since startup.
    pub step: u64,
    pub measurement: f32,
    pub setpoint: f32,
    pub output: f32,
}
