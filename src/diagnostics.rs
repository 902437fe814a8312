//! Runtime counters for the request path.
//!
//! Updated under the control lock by the dispatcher and the server loop,
//! read back over the wire with `QueryStats` and logged on demand.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    /// Well-formed frames that were applied (acked or rejected).
    pub frames_handled: u32,
    /// Frames dropped at decode (bad length or unknown opcode).
    pub malformed: u32,
    /// Well-formed frames whose command was rejected.
    pub rejected: u32,
    /// Replies or telemetry frames the transport failed to send.
    pub send_failures: u32,
    /// Transport receive failures.
    pub receive_failures: u32,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_handled(&mut self, rejected: bool) {
        self.frames_handled = self.frames_handled.wrapping_add(1);
        if rejected {
            self.rejected = self.rejected.wrapping_add(1);
        }
    }

    pub fn record_malformed(&mut self) {
        self.malformed = self.malformed.wrapping_add(1);
    }

    pub fn record_send_failure(&mut self) {
        self.send_failures = self.send_failures.wrapping_add(1);
    }

    pub fn record_receive_failure(&mut self) {
        self.receive_failures = self.receive_failures.wrapping_add(1);
    }

    /// One-line JSON summary for the log.
    pub fn summary(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
