//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises a subsystem against mock
//! adapters.  All tests run on the host with no sockets or hardware.

mod mock_hw;
mod server_loop_tests;
mod watchdog_tests;
