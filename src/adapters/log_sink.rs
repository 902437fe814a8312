//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC on the device, stderr on the host).
//! Telemetry goes out at `debug` so a 50 Hz stream does not flood the
//! console at the default level.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

use super::time::Uptime;

/// Adapter that logs every [`AppEvent`] to the console.
pub struct LogEventSink {
    uptime: Uptime,
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self {
            uptime: Uptime::new(),
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let t = self.uptime.millis();
        match event {
            AppEvent::Telemetry(d) => {
                debug!(
                    "TELEM | t={}ms step={} | y={:.3} r={:.3} u={:.3}",
                    t, d.step, d.measurement, d.setpoint, d.output
                );
            }
            AppEvent::Started { timeout_ticks } => {
                info!("START | t={}ms | stream timeout {} ticks", t, timeout_ticks);
            }
            AppEvent::StreamStopped { silent_ticks } => {
                info!("STREAM | t={}ms | stopped after {} silent ticks", t, silent_ticks);
            }
            AppEvent::StreamResumed => {
                info!("STREAM | t={}ms | resumed", t);
            }
            AppEvent::CommandRejected { opcode, reason } => {
                warn!("CMD | t={}ms | {:?} rejected: {}", t, opcode, reason);
            }
            AppEvent::FrameDropped(reason) => {
                warn!("FRAME | t={}ms | dropped: {}", t, reason);
            }
        }
    }
}
