//! Inter-task telemetry channel.
//!
//! Uses an `embassy-sync` bounded channel to hand encoded telemetry frames
//! from the stream loop to the server loop, which owns the socket and knows
//! the peer address.  No heap allocation per frame.
//!
//! ```text
//! ┌──────────────┐  [u8; 9] frames  ┌──────────────┐
//! │ Stream Loop  │────────────────▶│ Server Loop  │──▶ UDP peer
//! │ (control)    │                 │ (requests)   │
//! └──────────────┘                 └──────────────┘
//! ```
//!
//! The channel is owned by the runtime context rather than a `static`, so
//! tests can run several servers side by side.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use super::codec::FRAME_LEN;

/// Channel depth for outbound telemetry.  When full, the newest frame is
/// dropped (stale telemetry is worthless).
pub const TELEMETRY_DEPTH: usize = 8;

pub type TelemetryFrame = [u8; FRAME_LEN];

/// Outbound telemetry channel: stream loop → server loop.
pub type TelemetryChannel = Channel<CriticalSectionRawMutex, TelemetryFrame, TELEMETRY_DEPTH>;
