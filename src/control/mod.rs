//! Control-law implementations.

pub mod pid;
