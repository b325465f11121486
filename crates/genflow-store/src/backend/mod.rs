//! Prompt store backends

pub mod file;
pub mod memory;
pub mod simulated;
