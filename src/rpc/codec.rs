//! Fixed-width command frame codec.
//!
//! Wire format (protocol version 1), identical for requests and responses:
//! ```text
//! ┌────────────┬──────────────────┬──────────────────┐
//! │ Opcode (1B)│ arg0 (4B)        │ arg1 (4B)        │
//! │ u8         │ f32 LE (IEEE-754)│ f32 LE (IEEE-754)│
//! └────────────┴──────────────────┴──────────────────┘
//! ```
//!
//! Floats are little-endian (the ESP32's native order) on every target.
//!
//! A response echoes the request opcode; bit 7 of the code byte is set when
//! the command was rejected and the arguments carry the values still in
//! effect.

use crate::error::FrameError;

/// Frame width in bytes (1 opcode + 2 × f32).
pub const FRAME_LEN: usize = 1 + 4 + 4;

/// Version of the opcode table below.
pub const PROTOCOL_VERSION: u8 = 1;

/// Set in a response code when the command was rejected.
pub const REJECTED_FLAG: u8 = 0x80;

/// Code byte of server-pushed telemetry frames.  Never accepted as a request.
pub const TELEMETRY_CODE: u8 = 0x20;

/// Request opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// arg0 = setpoint.
    SetSetpoint = 0x01,
    /// arg0 = kp, arg1 = ki.
    SetGains = 0x02,
    /// arg0 = kd.
    SetDerivativeGain = 0x03,
    /// arg0 = min, arg1 = max.
    SetErrorLimits = 0x04,
    /// arg0 = min, arg1 = max.
    SetIntegralLimits = 0x05,
    /// arg0 = min, arg1 = max.
    SetOutputLimits = 0x06,
    /// Reply: last output, last measurement.
    QueryOutput = 0x07,
    /// Reply: publishing (1/0), ticks since last message.
    QueryStatus = 0x08,
    /// Zero the integrator and derivative memory.
    ResetController = 0x09,
    /// Reply: frames handled, malformed frames seen.
    QueryStats = 0x0A,
    /// Reply: protocol version, watchdog timeout in ticks.
    QueryVersion = 0x0B,
    StreamStart = 0x10,
    StreamStop = 0x11,
}

impl Opcode {
    pub const ALL: [Opcode; 13] = [
        Opcode::SetSetpoint,
        Opcode::SetGains,
        Opcode::SetDerivativeGain,
        Opcode::SetErrorLimits,
        Opcode::SetIntegralLimits,
        Opcode::SetOutputLimits,
        Opcode::QueryOutput,
        Opcode::QueryStatus,
        Opcode::ResetController,
        Opcode::QueryStats,
        Opcode::QueryVersion,
        Opcode::StreamStart,
        Opcode::StreamStop,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::SetSetpoint),
            0x02 => Some(Self::SetGains),
            0x03 => Some(Self::SetDerivativeGain),
            0x04 => Some(Self::SetErrorLimits),
            0x05 => Some(Self::SetIntegralLimits),
            0x06 => Some(Self::SetOutputLimits),
            0x07 => Some(Self::QueryOutput),
            0x08 => Some(Self::QueryStatus),
            0x09 => Some(Self::ResetController),
            0x0A => Some(Self::QueryStats),
            0x0B => Some(Self::QueryVersion),
            0x10 => Some(Self::StreamStart),
            0x11 => Some(Self::StreamStop),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// A decoded request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandFrame {
    pub opcode: Opcode,
    pub arg0: f32,
    pub arg1: f32,
}

impl CommandFrame {
    pub fn new(opcode: Opcode, arg0: f32, arg1: f32) -> Self {
        Self { opcode, arg0, arg1 }
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        encode_raw(self.opcode.code(), self.arg0, self.arg1)
    }
}

/// Parse a request datagram.  Never touches controller state.
pub fn decode(bytes: &[u8]) -> Result<CommandFrame, FrameError> {
    let (code, arg0, arg1) = decode_raw(bytes)?;
    let opcode = Opcode::from_u8(code).ok_or(FrameError::UnknownOpcode(code))?;
    Ok(CommandFrame { opcode, arg0, arg1 })
}

/// Outcome carried in a response code byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ack,
    Rejected,
}

/// A response (or telemetry) frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseFrame {
    pub code: u8,
    pub arg0: f32,
    pub arg1: f32,
}

impl ResponseFrame {
    pub fn ack(opcode: Opcode, arg0: f32, arg1: f32) -> Self {
        Self {
            code: opcode.code(),
            arg0,
            arg1,
        }
    }

    pub fn rejected(opcode: Opcode, arg0: f32, arg1: f32) -> Self {
        Self {
            code: opcode.code() | REJECTED_FLAG,
            arg0,
            arg1,
        }
    }

    pub fn telemetry(measurement: f32, output: f32) -> Self {
        Self {
            code: TELEMETRY_CODE,
            arg0: measurement,
            arg1: output,
        }
    }

    /// The echoed request opcode, if this is a response to one.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.code & !REJECTED_FLAG)
    }

    pub fn status(&self) -> ResponseStatus {
        if self.code & REJECTED_FLAG != 0 {
            ResponseStatus::Rejected
        } else {
            ResponseStatus::Ack
        }
    }

    pub fn is_telemetry(&self) -> bool {
        self.code == TELEMETRY_CODE
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        encode_raw(self.code, self.arg0, self.arg1)
    }

    /// Client-side parse.  Any code byte is accepted.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let (code, arg0, arg1) = decode_raw(bytes)?;
        Ok(Self { code, arg0, arg1 })
    }
}

fn encode_raw(code: u8, arg0: f32, arg1: f32) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];
    out[0] = code;
    out[1..5].copy_from_slice(&arg0.to_le_bytes());
    out[5..9].copy_from_slice(&arg1.to_le_bytes());
    out
}

fn decode_raw(bytes: &[u8]) -> Result<(u8, f32, f32), FrameError> {
    let frame: &[u8; FRAME_LEN] = bytes
        .try_into()
        .map_err(|_| FrameError::BadLength(bytes.len()))?;
    let arg0 = f32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
    let arg1 = f32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]);
    Ok((frame[0], arg0, arg1))
}
