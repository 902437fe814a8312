//! Fuzz target: request decoding and dispatch
//!
//! Drives arbitrary datagrams through `codec::decode` and the engine and
//! asserts that decoding never panics, only accepts exact-width frames,
//! and that a malformed datagram leaves the watchdog counter untouched.
//!
//! cargo fuzz run fuzz_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use pidserver::app::service::ControlState;
use pidserver::config::SystemConfig;
use pidserver::rpc::codec::{self, FRAME_LEN};
use pidserver::rpc::engine;

fuzz_target!(|data: &[u8]| {
    let decoded = codec::decode(data);
    if decoded.is_ok() {
        assert_eq!(data.len(), FRAME_LEN, "decoder accepted a short or long frame");
    }

    let mut state = ControlState::new(&SystemConfig::default());
    state.stream_mut().on_silent_tick();
    match engine::dispatch(data, &mut state) {
        Ok(d) => {
            assert_eq!(state.stream().ticks_since_last_message(), 0);
            assert_eq!(d.response.encode().len(), FRAME_LEN);
        }
        Err(_) => {
            assert!(decoded.is_err());
            assert_eq!(state.stream().ticks_since_last_message(), 1);
            assert_eq!(state.stats().malformed, 1);
        }
    }
});
