//! Telemetry queue sink.
//!
//! Implements [`EventSink`] for the stream loop: each
//! [`AppEvent::Telemetry`] becomes a 9-byte telemetry frame pushed onto the
//! [`TelemetryChannel`], where the server loop picks it up and sends it to
//! the peer.  Every other event is ignored.

use std::sync::Arc;

use log::warn;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::rpc::channels::TelemetryChannel;
use crate::rpc::codec::ResponseFrame;

pub struct TelemetryQueueSink {
    channel: Arc<TelemetryChannel>,
    dropped: u32,
}

impl TelemetryQueueSink {
    pub fn new(channel: Arc<TelemetryChannel>) -> Self {
        Self { channel, dropped: 0 }
    }

    /// Frames lost to a full queue.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl EventSink for TelemetryQueueSink {
    fn emit(&mut self, event: &AppEvent) {
        let AppEvent::Telemetry(t) = event else {
            return;
        };
        let frame = ResponseFrame::telemetry(t.measurement, t.output).encode();
        if self.channel.try_send(frame).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            if self.dropped.is_power_of_two() {
                warn!("Telemetry queue full, {} frames dropped", self.dropped);
            }
        }
    }
}
