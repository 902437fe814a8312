//! RPC engine — applies decoded command frames to the shared control state.
//!
//! **Transport-decoupled**: the engine never touches a socket.  The server
//! loop feeds it raw datagram bytes via [`dispatch`] while holding the
//! control lock, and sends the returned [`ResponseFrame`] after releasing it.
//!
//! Every well-formed frame goes through the same pipeline:
//!
//! 1. **Watchdog reset** — any valid request proves the peer is alive, so
//!    the silence counter is cleared (and a stopped stream resumes) before
//!    the command runs, even if the command is then rejected.
//! 2. **Validation** — non-finite arguments and inverted limit pairs are
//!    refused; the reply carries [`REJECTED_FLAG`](super::codec::REJECTED_FLAG)
//!    and echoes the values still in effect.
//! 3. **Apply + echo** — the reply echoes the values now in effect.
//!
//! Malformed datagrams stop at decode: they are counted, produce no reply
//! and leave both the controller and the watchdog untouched.
//!
//! Nothing here logs.  The caller holds the control lock, so rejections and
//! dropped frames travel out in the return value and are reported by the
//! event sinks after the lock is released.

use crate::app::service::ControlState;
use crate::error::Error;

use super::codec::{self, CommandFrame, Opcode, PROTOCOL_VERSION, ResponseFrame};
use super::stream::StreamTransition;

/// Outcome of one applied command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dispatched {
    pub response: ResponseFrame,
    /// Set when this frame resumed a stopped stream.
    pub transition: Option<StreamTransition>,
    /// Why the command was refused, if it was.
    pub rejection: Option<Error>,
}

/// Decode `bytes` and apply the command.
///
/// A decode failure is counted in the stats and returned as
/// [`Error::MalformedFrame`]; nothing else changes.
pub fn dispatch(bytes: &[u8], state: &mut ControlState) -> Result<Dispatched, Error> {
    match codec::decode(bytes) {
        Ok(frame) => Ok(apply(&frame, state)),
        Err(e) => {
            state.stats_mut().record_malformed();
            Err(e.into())
        }
    }
}

/// Apply one well-formed command.
pub fn apply(frame: &CommandFrame, state: &mut ControlState) -> Dispatched {
    let silent_ticks = state.stream().ticks_since_last_message();
    let transition = state.stream_mut().on_message();

    let CommandFrame { opcode, arg0, arg1 } = *frame;
    let result = execute(opcode, arg0, arg1, silent_ticks, state);

    let (response, rejection) = match result {
        Ok((a, b)) => (ResponseFrame::ack(opcode, a, b), None),
        Err((reason, a, b)) => (ResponseFrame::rejected(opcode, a, b), Some(reason)),
    };
    state.stats_mut().record_handled(rejection.is_some());

    Dispatched {
        response,
        transition,
        rejection,
    }
}

/// Echoed argument pair, or the rejection reason plus the prior pair.
type Outcome = Result<(f32, f32), (Error, f32, f32)>;

fn execute(opcode: Opcode, arg0: f32, arg1: f32, silent_ticks: u32, state: &mut ControlState) -> Outcome {
    let pid = state.pid_mut();
    match opcode {
        Opcode::SetSetpoint => {
            if !arg0.is_finite() {
                return Err((Error::InvalidArgument("setpoint"), pid.setpoint(), 0.0));
            }
            pid.set_setpoint(arg0);
            Ok((pid.setpoint(), 0.0))
        }
        Opcode::SetGains => {
            let g = pid.gains();
            if !(arg0.is_finite() && arg1.is_finite()) {
                return Err((Error::InvalidArgument("gain"), g.kp, g.ki));
            }
            pid.set_pi_gains(arg0, arg1);
            let g = pid.gains();
            Ok((g.kp, g.ki))
        }
        Opcode::SetDerivativeGain => {
            if !arg0.is_finite() {
                return Err((Error::InvalidArgument("gain"), pid.gains().kd, 0.0));
            }
            pid.set_kd(arg0);
            Ok((pid.gains().kd, 0.0))
        }
        Opcode::SetErrorLimits => {
            let prior = pid.error_limits();
            match pid.set_error_limits(arg0, arg1) {
                Ok(()) => Ok((arg0, arg1)),
                Err(e) => Err((e, prior.min(), prior.max())),
            }
        }
        Opcode::SetIntegralLimits => {
            let prior = pid.integral_limits();
            match pid.set_integral_limits(arg0, arg1) {
                Ok(()) => Ok((arg0, arg1)),
                Err(e) => Err((e, prior.min(), prior.max())),
            }
        }
        Opcode::SetOutputLimits => {
            let prior = pid.output_limits();
            match pid.set_output_limits(arg0, arg1) {
                Ok(()) => Ok((arg0, arg1)),
                Err(e) => Err((e, prior.min(), prior.max())),
            }
        }
        Opcode::QueryOutput => {
            let output = pid.last_output();
            Ok((output, state.last_measurement()))
        }
        Opcode::QueryStatus => {
            let publishing = if state.stream().is_publishing() { 1.0 } else { 0.0 };
            Ok((publishing, silent_ticks as f32))
        }
        Opcode::ResetController => {
            pid.init();
            Ok((pid.integral(), pid.prev_error()))
        }
        Opcode::QueryStats => {
            let stats = state.stats();
            Ok((stats.frames_handled as f32, stats.malformed as f32))
        }
        Opcode::QueryVersion => Ok((
            f32::from(PROTOCOL_VERSION),
            state.stream().timeout_ticks() as f32,
        )),
        Opcode::StreamStart => {
            state.stream_mut().enable();
            Ok((1.0, 0.0))
        }
        Opcode::StreamStop => {
            state.stream_mut().disable();
            Ok((0.0, 0.0))
        }
    }
}
