//! Roomforge Core: shared pipeline vocabulary.
//!
//! This crate defines the stage model, configuration, log and notification
//! shapes, the error taxonomy, and the collaborator traits that the rest of
//! the workspace depends on. It contains no infrastructure code.

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod log;
pub mod room;
pub mod stage;
