//! Telemetry stream control with a silence watchdog.
//!
//! The controlling peer proves it is alive by sending frames.  Every server
//! tick without a frame advances a counter; when the counter reaches the
//! configured timeout the stream stops, and it resumes on the next
//! well-formed frame of any kind.
//!
//! ```text
//!              silent tick, ticks >= timeout
//!  ┌───────────┐ ─────────────────────────▶ ┌─────────┐
//!  │ Streaming │                            │ Stopped │
//!  └───────────┘ ◀───────────────────────── └─────────┘
//!                   any well-formed frame
//! ```
//!
//! Independently of the watchdog the client can switch the stream off and
//! on with StreamStop / StreamStart.  Telemetry is published only while the
//! watchdog is `Streaming` *and* the client has the stream enabled.

/// Watchdog state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    Stopped,
}

/// Edge reported by the watchdog.  Each fires once per episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTransition {
    /// The peer went silent for the full timeout.
    Stopped,
    /// A frame arrived while stopped.
    Resumed,
}

/// Compute the watchdog threshold in ticks, e.g. 15 s at 20 ms → 750.
pub fn timeout_ticks(timeout_secs: f32, tick_ms: u32) -> u32 {
    if tick_ms == 0 {
        return 0;
    }
    let ticks = (f64::from(timeout_secs) * 1000.0 / f64::from(tick_ms)).round();
    if ticks <= 0.0 {
        0
    } else if ticks >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        ticks as u32
    }
}

/// Stream controller / liveness watchdog.
#[derive(Debug, Clone)]
pub struct StreamController {
    state: StreamState,
    enabled: bool,
    ticks_since_last_message: u32,
    timeout_ticks: u32,
    /// Number of silence timeouts since startup.
    stop_count: u32,
}

impl StreamController {
    pub fn new(timeout_ticks: u32) -> Self {
        Self {
            state: StreamState::Streaming,
            enabled: true,
            ticks_since_last_message: 0,
            timeout_ticks,
            stop_count: 0,
        }
    }

    /// A well-formed frame arrived.
    pub fn on_message(&mut self) -> Option<StreamTransition> {
        self.ticks_since_last_message = 0;
        match self.state {
            StreamState::Stopped => {
                self.state = StreamState::Streaming;
                Some(StreamTransition::Resumed)
            }
            StreamState::Streaming => None,
        }
    }

    /// A server tick passed without any frame.
    pub fn on_silent_tick(&mut self) -> Option<StreamTransition> {
        self.ticks_since_last_message = self.ticks_since_last_message.saturating_add(1);
        if self.state == StreamState::Streaming
            && self.ticks_since_last_message >= self.timeout_ticks
        {
            self.state = StreamState::Stopped;
            self.stop_count = self.stop_count.saturating_add(1);
            return Some(StreamTransition::Stopped);
        }
        None
    }

    /// Client request: StreamStart.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Client request: StreamStop.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Whether the watchdog currently allows streaming.
    pub fn is_running(&self) -> bool {
        self.state == StreamState::Streaming
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Telemetry should go out on this tick.
    pub fn is_publishing(&self) -> bool {
        self.is_running() && self.enabled
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn ticks_since_last_message(&self) -> u32 {
        self.ticks_since_last_message
    }

    pub fn timeout_ticks(&self) -> u32 {
        self.timeout_ticks
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count
    }
}
