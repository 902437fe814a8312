//! PID controller engine
//!
//! Proportional-integral-derivative controller with three independent
//! clamps: the instantaneous error (used by P and D), the integral
//! accumulator (anti-windup) and the final output.
//!
//! Pure state and arithmetic.  `update` never allocates, never blocks and
//! runs in constant time, so it is safe on the highest-frequency path.

use crate::error::{Error, Result};

/// Closed interval used by every clamp in the controller.
///
/// Construction guarantees `min <= max` and no NaN bound, so
/// [`Limits::clamp`] can never panic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    min: f32,
    max: f32,
}

impl Limits {
    /// No clamping at all.
    pub const UNBOUNDED: Self = Self {
        min: f32::NEG_INFINITY,
        max: f32::INFINITY,
    };

    pub fn new(min: f32, max: f32) -> Result<Self> {
        // `!(min <= max)` also catches NaN on either side.
        if !(min <= max) {
            return Err(Error::InvalidLimits { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::UNBOUNDED
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Controller gains.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

/// PID controller
#[derive(Debug, Clone, Default)]
pub struct PidController {
    gains: PidGains,
    setpoint: f32,
    integral: f32,
    prev_error: f32,
    last_output: f32,
    error_limits: Limits,
    integral_limits: Limits,
    output_limits: Limits,
}

impl PidController {
    /// Create a controller with all limits unbounded.
    pub fn new(gains: PidGains, setpoint: f32) -> Self {
        Self {
            gains,
            setpoint,
            ..Self::default()
        }
    }

    /// Reset the dynamic state.  Gains, setpoint and limits are kept.
    pub fn init(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.last_output = 0.0;
    }

    // ── Configuration ─────────────────────────────────────────

    pub fn set_gains(&mut self, kp: f32, ki: f32, kd: f32) {
        self.gains = PidGains::new(kp, ki, kd);
    }

    /// Update the proportional and integral gains together.
    pub fn set_pi_gains(&mut self, kp: f32, ki: f32) {
        self.gains.kp = kp;
        self.gains.ki = ki;
    }

    pub fn set_kd(&mut self, kd: f32) {
        self.gains.kd = kd;
    }

    pub fn set_setpoint(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    /// Clamp applied to the instantaneous error before P and D.
    pub fn set_error_limits(&mut self, min: f32, max: f32) -> Result<()> {
        self.error_limits = Limits::new(min, max)?;
        Ok(())
    }

    /// Clamp applied to the integral accumulator.  The current accumulator
    /// is pulled into the new range immediately.
    pub fn set_integral_limits(&mut self, min: f32, max: f32) -> Result<()> {
        let limits = Limits::new(min, max)?;
        self.integral_limits = limits;
        self.integral = limits.clamp(self.integral);
        Ok(())
    }

    /// Clamp applied to the final output.
    pub fn set_output_limits(&mut self, min: f32, max: f32) -> Result<()> {
        self.output_limits = Limits::new(min, max)?;
        Ok(())
    }

    // ── Control law ───────────────────────────────────────────

    /// Compute the controller output for one sample.
    ///
    /// A non-finite measurement, a negative/non-finite `dt` or an error that
    /// overflows `f32` is ignored and the previous output is returned,
    /// leaving the state untouched.  Intermediate terms are kept finite so
    /// the accumulator can never turn into `inf` or NaN.
    pub fn update(&mut self, measurement: f32, dt: f32) -> f32 {
        if !measurement.is_finite() || !dt.is_finite() || dt < 0.0 {
            return self.last_output;
        }
        let raw_error = self.setpoint - measurement;
        if !raw_error.is_finite() {
            return self.last_output;
        }

        let error = self.error_limits.clamp(raw_error);

        // Integral (anti-windup: the accumulator itself is bounded)
        let integral = self.integral_limits.clamp(self.integral + error * dt);
        self.integral = integral.clamp(f32::MIN, f32::MAX);

        // Derivative
        let derivative = if dt > 0.0 {
            ((error - self.prev_error) / dt).clamp(f32::MIN, f32::MAX)
        } else {
            0.0
        };
        self.prev_error = error;

        let PidGains { kp, ki, kd } = self.gains;
        let sum = kp * error + ki * self.integral + kd * derivative;
        if sum.is_nan() {
            // inf - inf between the terms
            return self.last_output;
        }
        let output = self.output_limits.clamp(sum);

        self.last_output = output;
        output
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn prev_error(&self) -> f32 {
        self.prev_error
    }

    pub fn last_output(&self) -> f32 {
        self.last_output
    }

    pub fn error_limits(&self) -> Limits {
        self.error_limits
    }

    pub fn integral_limits(&self) -> Limits {
        self.integral_limits
    }

    pub fn output_limits(&self) -> Limits {
        self.output_limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p_only(setpoint: f32) -> PidController {
        PidController::new(PidGains::new(1.0, 0.0, 0.0), setpoint)
    }

    #[test]
    fn proportional_only_tracks_error() {
        let mut pid = p_only(100.0);
        for m in [-50.0, 0.0, 12.5, 99.0, 100.0, 250.0] {
            assert_eq!(pid.update(m, 0.02), 100.0 - m);
        }
    }

    #[test]
    fn integral_saturates_at_limit() {
        let mut pid = PidController::new(PidGains::new(0.0, 1.0, 0.0), 1.0);
        pid.set_integral_limits(0.0, 5.0).unwrap();
        for _ in 0..4 {
            pid.update(0.0, 1.0);
        }
        assert_eq!(pid.integral(), 4.0);
        for _ in 0..100 {
            let out = pid.update(0.0, 1.0);
            assert!(pid.integral() <= 5.0);
            assert_eq!(out, pid.integral());
        }
        assert_eq!(pid.integral(), 5.0);
    }

    #[test]
    fn error_clamp_feeds_p_and_d() {
        let mut pid = PidController::new(PidGains::new(1.0, 0.0, 1.0), 10.0);
        pid.set_error_limits(-2.0, 2.0).unwrap();
        // P = 2, D = (2 - 0) / 1 = 2
        assert_eq!(pid.update(0.0, 1.0), 4.0);
        assert_eq!(pid.prev_error(), 2.0);
        // Error unchanged, so D = 0
        assert_eq!(pid.update(0.0, 1.0), 2.0);
    }

    #[test]
    fn zero_dt_skips_derivative() {
        let mut pid = PidController::new(PidGains::new(0.0, 0.0, 1.0), 5.0);
        let out = pid.update(0.0, 0.0);
        assert_eq!(out, 0.0);
        assert!(out.is_finite());
    }

    #[test]
    fn output_is_clamped() {
        let mut pid = p_only(1000.0);
        pid.set_output_limits(-10.0, 10.0).unwrap();
        assert_eq!(pid.update(0.0, 0.02), 10.0);
        assert_eq!(pid.update(2000.0, 0.02), -10.0);
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let mut pid = p_only(0.0);
        pid.set_output_limits(-1.0, 1.0).unwrap();
        let err = pid.set_output_limits(3.0, -3.0).unwrap_err();
        assert_eq!(err, Error::InvalidLimits { min: 3.0, max: -3.0 });
        assert_eq!(pid.output_limits(), Limits::new(-1.0, 1.0).unwrap());

        assert!(pid.set_error_limits(f32::NAN, 1.0).is_err());
        assert!(pid.error_limits().is_unbounded());
    }

    #[test]
    fn narrowing_integral_limits_reclamps() {
        let mut pid = PidController::new(PidGains::new(0.0, 1.0, 0.0), 10.0);
        pid.update(0.0, 1.0);
        assert_eq!(pid.integral(), 10.0);
        pid.set_integral_limits(-3.0, 3.0).unwrap();
        assert_eq!(pid.integral(), 3.0);
    }

    #[test]
    fn bad_samples_are_ignored() {
        let mut pid = p_only(10.0);
        let out = pid.update(4.0, 0.02);
        assert_eq!(pid.update(f32::NAN, 0.02), out);
        assert_eq!(pid.update(1.0, -1.0), out);
        assert_eq!(pid.integral(), 6.0 * 0.02);
    }

    #[test]
    fn overflowing_error_is_ignored() {
        let mut pid = PidController::new(PidGains::new(0.0, 0.0, 0.0), f32::MAX);
        pid.set_output_limits(-1.0, 1.0).unwrap();
        assert_eq!(pid.update(-f32::MAX, 0.02), 0.0);
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.prev_error(), 0.0);

        pid.set_setpoint(0.0);
        assert_eq!(pid.update(0.0, 0.02), 0.0);
    }

    #[test]
    fn unbounded_integrator_saturates_at_f32_max() {
        let mut pid = PidController::new(PidGains::new(0.0, 1.0, 0.0), f32::MAX);
        pid.set_output_limits(-1.0, 1.0).unwrap();
        for _ in 0..100 {
            let out = pid.update(0.0, 10.0);
            assert!((-1.0..=1.0).contains(&out), "output {out} outside [-1, 1]");
            assert!(pid.integral().is_finite());
        }
        assert_eq!(pid.integral(), f32::MAX);

        // Recovers once the setpoint comes back
        pid.set_setpoint(0.0);
        pid.set_integral_limits(-1.0, 1.0).unwrap();
        let out = pid.update(0.5, 1.0);
        assert!(out.is_finite());
        assert_eq!(pid.integral(), 0.5);
    }

    #[test]
    fn opposing_infinite_terms_keep_previous_output() {
        let mut pid = PidController::new(PidGains::new(f32::MAX, -f32::MAX, 0.0), 1.0e30);
        let first = pid.update(0.0, 1.0e10);
        assert!(!first.is_nan());
        let second = pid.update(0.0, 1.0e10);
        assert!(!second.is_nan());
    }

    #[test]
    fn set_gains_replaces_all_three() {
        let mut pid = PidController::new(PidGains::new(1.0, 2.0, 3.0), 0.0);
        pid.update(-1.0, 1.0);
        pid.set_gains(4.0, 5.0, 6.0);
        assert_eq!(pid.gains(), PidGains::new(4.0, 5.0, 6.0));
        assert_eq!(pid.integral(), 1.0);
    }

    #[test]
    fn init_keeps_configuration() {
        let mut pid = PidController::new(PidGains::new(1.0, 1.0, 1.0), 3.0);
        pid.set_output_limits(0.0, 100.0).unwrap();
        pid.update(0.0, 0.5);
        pid.init();
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.prev_error(), 0.0);
        assert_eq!(pid.last_output(), 0.0);
        assert_eq!(pid.setpoint(), 3.0);
        assert_eq!(pid.gains(), PidGains::new(1.0, 1.0, 1.0));
        assert_eq!(pid.output_limits().max(), 100.0);
    }
}
