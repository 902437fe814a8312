//! Transport abstraction — any datagram-oriented channel.
//!
//! Concrete implementations:
//! - UDP socket over WiFi ([`crate::adapters::udp_transport`])
//! - scripted mock in the integration tests
//!
//! The server loop is generic over `Transport`, so adding a new transport
//! requires zero changes to the request path.

use crate::error::Result;

use super::codec::FRAME_LEN;

/// Non-blocking datagram channel.
pub trait Transport {
    /// Address a reply goes back to.
    type Peer: Copy + core::fmt::Debug;

    /// Poll for one datagram.
    ///
    /// Returns `Ok(None)` when nothing is pending.  A datagram longer than
    /// `buf` is truncated and reported as `buf.len()` bytes; with a buffer
    /// wider than a frame that length still fails decode as `BadLength`.
    fn receive_if_available(&mut self, buf: &mut [u8]) -> Result<Option<(usize, Self::Peer)>>;

    /// Send one frame to `peer`.
    fn reply(&mut self, frame: &[u8; FRAME_LEN], peer: Self::Peer) -> Result<()>;
}
