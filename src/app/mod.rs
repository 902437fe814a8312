//! Application core — the control state and the loops that drive it.
//!
//! All interaction with hardware and the network happens through **port
//! traits** defined in [`ports`] (plus [`Transport`](crate::rpc::transport::Transport)),
//! keeping this layer fully testable without real peripherals.

pub mod cadence;
pub mod events;
pub mod ports;
pub mod service;
