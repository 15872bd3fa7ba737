//! Per-execution workflow state.

pub mod state;
