//! Port traits — the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlState (domain)
//! ```
//!
//! The transport port lives in [`crate::rpc::transport`] and the
//! connectivity port in [`crate::adapters::wifi`], next to the code that
//! drives them.

// ───────────────────────────────────────────────────────────────
// Measurement port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Process-value source polled once per control tick.
///
/// No buffering or averaging happens in the core; an adapter that wants
/// filtering does it behind this call.
pub trait MeasurementPort {
    fn sample(&mut self) -> f32;
}

impl<F: FnMut() -> f32> MeasurementPort for F {
    fn sample(&mut self) -> f32 {
        self()
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s through
/// this port.  Adapters decide where they go (serial log, telemetry queue).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}
