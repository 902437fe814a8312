//! Mock adapters for integration tests.
//!
//! A scripted datagram transport, a settable measurement source and a sink
//! that records every event, so tests can drive the cadence loops tick by
//! tick and assert on the full history without sockets or ADCs.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use pidserver::app::events::AppEvent;
use pidserver::app::ports::{EventSink, MeasurementPort};
use pidserver::error::{Error, Result, TransportOp};
use pidserver::rpc::codec::{CommandFrame, FRAME_LEN, Opcode, ResponseFrame};
use pidserver::rpc::transport::Transport;

// ── Transport ─────────────────────────────────────────────────

pub type PeerId = u8;

/// One scripted poll result.
pub enum Inbound {
    Datagram(Vec<u8>, PeerId),
    Fail(std::io::ErrorKind),
}

#[derive(Default)]
pub struct MockTransport {
    pub inbound: VecDeque<Inbound>,
    pub sent: Vec<([u8; FRAME_LEN], PeerId)>,
    pub fail_sends: bool,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_command(&mut self, opcode: Opcode, a: f32, b: f32, peer: PeerId) {
        self.inbound
            .push_back(Inbound::Datagram(CommandFrame::new(opcode, a, b).encode().to_vec(), peer));
    }

    pub fn push_raw(&mut self, bytes: &[u8], peer: PeerId) {
        self.inbound.push_back(Inbound::Datagram(bytes.to_vec(), peer));
    }

    pub fn push_failure(&mut self, kind: std::io::ErrorKind) {
        self.inbound.push_back(Inbound::Fail(kind));
    }

    /// Decoded frames sent so far, with their destination.
    pub fn sent_frames(&self) -> Vec<(ResponseFrame, PeerId)> {
        self.sent
            .iter()
            .map(|(bytes, peer)| (ResponseFrame::decode(bytes).unwrap(), *peer))
            .collect()
    }

    pub fn responses(&self) -> Vec<ResponseFrame> {
        self.sent_frames()
            .into_iter()
            .map(|(f, _)| f)
            .filter(|f| !f.is_telemetry())
            .collect()
    }

    pub fn telemetry(&self) -> Vec<(ResponseFrame, PeerId)> {
        self.sent_frames().into_iter().filter(|(f, _)| f.is_telemetry()).collect()
    }
}

impl Transport for MockTransport {
    type Peer = PeerId;

    fn receive_if_available(&mut self, buf: &mut [u8]) -> Result<Option<(usize, PeerId)>> {
        match self.inbound.pop_front() {
            None => Ok(None),
            Some(Inbound::Datagram(bytes, peer)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(Some((len, peer)))
            }
            Some(Inbound::Fail(kind)) => Err(Error::Transport {
                op: TransportOp::Receive,
                kind,
            }),
        }
    }

    fn reply(&mut self, frame: &[u8; FRAME_LEN], peer: PeerId) -> Result<()> {
        if self.fail_sends {
            return Err(Error::Transport {
                op: TransportOp::Send,
                kind: std::io::ErrorKind::ConnectionRefused,
            });
        }
        self.sent.push((*frame, peer));
        Ok(())
    }
}

// ── Measurement ───────────────────────────────────────────────

/// Measurement source whose value the test sets through a shared cell.
#[derive(Clone, Default)]
pub struct MockMeasurement {
    value: Rc<Cell<f32>>,
    pub samples: Rc<Cell<u32>>,
}

#[allow(dead_code)]
impl MockMeasurement {
    pub fn set(&self, v: f32) {
        self.value.set(v);
    }

    pub fn sample_count(&self) -> u32 {
        self.samples.get()
    }
}

impl MeasurementPort for MockMeasurement {
    fn sample(&mut self) -> f32 {
        self.samples.set(self.samples.get() + 1);
        self.value.get()
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn stops(&self) -> usize {
        self.count(|e| matches!(e, AppEvent::StreamStopped { .. }))
    }

    pub fn resumes(&self) -> usize {
        self.count(|e| matches!(e, AppEvent::StreamResumed))
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
