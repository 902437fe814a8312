//! PID controller server library.
//!
//! Exposes the control core, the request protocol and the adapters for
//! integration testing and the firmware binary. All ESP-IDF-specific code
//! is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod rpc;

pub use error::{Error, Result};
