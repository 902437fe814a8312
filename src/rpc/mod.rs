//! Transport-agnostic request/response subsystem.
//!
//! Fixed 9-byte datagrams: one code byte and two little-endian `f32`s.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      RPC Stack                             │
//! │                                                            │
//! │  ┌──────────┐   ┌──────────┐   ┌───────────────────────┐   │
//! │  │ Transport │──▶│  Codec   │──▶│  Engine (dispatcher)  │   │
//! │  │ (trait)   │   │ (9 bytes)│   │  → ControlState       │   │
//! │  └──────────┘   └──────────┘   └───────────────────────┘   │
//! │       ▲                                    │               │
//! │       │              ┌─────────────────────┘               │
//! │       │              ▼                                     │
//! │  ┌──────────┐   ┌──────────┐                               │
//! │  │ Transport │◀──│  Stream  │   (telemetry + watchdog)      │
//! │  │ (reply)   │   │ (push)   │                               │
//! │  └──────────┘   └──────────┘                               │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod codec;
pub mod engine;
pub mod stream;
pub mod transport;
