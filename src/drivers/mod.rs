//! Platform drivers: task watchdog and core-pinned task spawning.

pub mod task_pin;
pub mod watchdog;
