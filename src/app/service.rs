//! Application service — the shared control state.
//!
//! [`ControlState`] bundles the PID engine, the stream watchdog and the
//! request counters.  Both cadence loops reach it only through a
//! [`ControlHandle`], which holds the whole bundle behind one mutex: a
//! command is applied, or a control step is computed, inside a single lock
//! acquisition, so the control path never sees a half-applied update.
//!
//! ```text
//!  server loop ──▶ ┌──────────────────────────────┐ ◀── stream loop
//!   (commands)     │  ControlHandle (one Mutex)    │    (control step)
//!                  │  PID · StreamController · stats│
//!                  └──────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use log::info;

use crate::config::{StoppedPolicy, SystemConfig};
use crate::control::pid::PidController;
use crate::diagnostics::FrameStats;
use crate::rpc::stream::StreamController;

use super::events::TelemetryData;

// ───────────────────────────────────────────────────────────────
// ControlState
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ControlState {
    pid: PidController,
    stream: StreamController,
    policy: StoppedPolicy,
    last_measurement: f32,
    step: u64,
    stats: FrameStats,
}

impl ControlState {
    pub fn new(config: &SystemConfig) -> Self {
        let pid = PidController::new(config.initial_gains, config.initial_setpoint);
        let stream = StreamController::new(config.timeout_ticks());
        info!(
            "Control state: policy={:?}, timeout={} ticks",
            config.stopped_policy,
            stream.timeout_ticks()
        );
        Self {
            pid,
            stream,
            policy: config.stopped_policy,
            last_measurement: 0.0,
            step: 0,
            stats: FrameStats::new(),
        }
    }

    /// Run one control step on a fresh sample.
    ///
    /// Returns the telemetry to publish, or `None` while the stream is not
    /// publishing.  Under [`StoppedPolicy::Freeze`] the PID update is skipped
    /// as well, so the integrator holds its value until the stream resumes.
    pub fn control_step(&mut self, measurement: f32, dt: f32) -> Option<TelemetryData> {
        self.last_measurement = measurement;
        let publishing = self.stream.is_publishing();
        if !publishing && self.policy == StoppedPolicy::Freeze {
            return None;
        }

        let output = self.pid.update(measurement, dt);
        self.step += 1;

        publishing.then(|| TelemetryData {
            step: self.step,
            measurement,
            setpoint: self.pid.setpoint(),
            output,
        })
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn pid_mut(&mut self) -> &mut PidController {
        &mut self.pid
    }

    pub fn stream(&self) -> &StreamController {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut StreamController {
        &mut self.stream
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut FrameStats {
        &mut self.stats
    }

    pub fn policy(&self) -> StoppedPolicy {
        self.policy
    }

    pub fn last_measurement(&self) -> f32 {
        self.last_measurement
    }

    /// Control steps executed since startup.
    pub fn step_count(&self) -> u64 {
        self.step
    }
}

// ───────────────────────────────────────────────────────────────
// ControlHandle
// ───────────────────────────────────────────────────────────────

/// Cloneable handle to the one shared [`ControlState`].
#[derive(Debug, Clone)]
pub struct ControlHandle {
    inner: Arc<Mutex<ControlState>>,
}

impl ControlHandle {
    pub fn new(state: ControlState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Run `f` with exclusive access.  Keep `f` short and free of I/O.
    ///
    /// A panic on another thread while holding the lock does not take the
    /// controller down: the state is plain data and every field stays
    /// individually valid, so the poisoned guard is recovered.
    pub fn with<R>(&self, f: impl FnOnce(&mut ControlState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Copy of the current state (for logging and tests).
    pub fn snapshot(&self) -> ControlState {
        self.with(|s| s.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::pid::PidGains;

    fn config(policy: StoppedPolicy) -> SystemConfig {
        SystemConfig {
            stopped_policy: policy,
            initial_gains: PidGains::new(0.0, 1.0, 0.0),
            initial_setpoint: 1.0,
            no_msg_timeout_secs: 0.04,
            ..SystemConfig::default()
        }
    }

    fn silence(state: &mut ControlState) {
        while state.stream().is_running() {
            state.stream_mut().on_silent_tick();
        }
    }

    #[test]
    fn publishes_while_streaming() {
        let mut s = ControlState::new(&config(StoppedPolicy::Freeze));
        let t = s.control_step(0.0, 1.0).unwrap();
        assert_eq!(t.step, 1);
        assert_eq!(t.output, 1.0);
        assert_eq!(t.setpoint, 1.0);
    }

    #[test]
    fn freeze_holds_integrator_while_stopped() {
        let mut s = ControlState::new(&config(StoppedPolicy::Freeze));
        s.control_step(0.0, 1.0);
        silence(&mut s);
        for _ in 0..5 {
            assert!(s.control_step(0.0, 1.0).is_none());
        }
        assert_eq!(s.pid().integral(), 1.0);
        assert_eq!(s.step_count(), 1);
        assert_eq!(s.last_measurement(), 0.0);
    }

    #[test]
    fn continue_integrates_without_publishing() {
        let mut s = ControlState::new(&config(StoppedPolicy::Continue));
        silence(&mut s);
        for _ in 0..5 {
            assert!(s.control_step(0.0, 1.0).is_none());
        }
        assert_eq!(s.pid().integral(), 5.0);
    }

    #[test]
    fn handle_shares_one_state() {
        let handle = ControlHandle::new(ControlState::new(&config(StoppedPolicy::Freeze)));
        let other = handle.clone();
        other.with(|s| s.pid_mut().set_setpoint(42.0));
        assert_eq!(handle.snapshot().pid().setpoint(), 42.0);
    }
}
