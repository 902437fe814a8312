//! Unified error types for the PID controller server.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! loop-level handling uniform.  All variants are `Copy` so they can be
//! passed through the dispatcher and the cadence loops without allocation.
//!
//! None of these are fatal: a malformed frame costs one request, a rejected
//! limit keeps the previous limit, and a transport fault is left to the
//! transport adapter's own recovery.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Request frame had the wrong length or an unknown opcode.
    MalformedFrame(FrameError),
    /// A limits command supplied `min > max` (or a NaN bound).
    InvalidLimits { min: f32, max: f32 },
    /// A gain or setpoint command supplied a non-finite value.
    InvalidArgument(&'static str),
    /// Bind / receive / send failed at the transport boundary.
    Transport {
        op: TransportOp,
        kind: std::io::ErrorKind,
    },
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedFrame(e) => write!(f, "malformed frame: {e}"),
            Self::InvalidLimits { min, max } => {
                write!(f, "invalid limits: min {min} > max {max}")
            }
            Self::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Self::Transport { op, kind } => write!(f, "transport {op} failed: {kind}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Datagram length differs from the fixed frame width.
    BadLength(usize),
    /// Opcode byte is not in the protocol table.
    UnknownOpcode(u8),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength(len) => write!(f, "bad length {len}"),
            Self::UnknownOpcode(op) => write!(f, "unknown opcode 0x{op:02x}"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::MalformedFrame(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Bind,
    Receive,
    Send,
}

impl fmt::Display for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind => write!(f, "bind"),
            Self::Receive => write!(f, "receive"),
            Self::Send => write!(f, "send"),
        }
    }
}

impl Error {
    /// Wrap an I/O error raised by a transport operation.
    pub fn transport(op: TransportOp, err: &std::io::Error) -> Self {
        Self::Transport {
            op,
            kind: err.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_informative() {
        let e: Error = FrameError::UnknownOpcode(0x7f).into();
        assert_eq!(e.to_string(), "malformed frame: unknown opcode 0x7f");

        let e = Error::InvalidLimits { min: 2.0, max: 1.0 };
        assert_eq!(e.to_string(), "invalid limits: min 2 > max 1");
    }

    #[test]
    fn transport_keeps_io_kind() {
        let io = std::io::Error::from(std::io::ErrorKind::AddrInUse);
        let e = Error::transport(TransportOp::Bind, &io);
        assert_eq!(
            e,
            Error::Transport {
                op: TransportOp::Bind,
                kind: std::io::ErrorKind::AddrInUse
            }
        );
    }
}
