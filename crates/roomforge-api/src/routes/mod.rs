//! Route modules.

pub mod health;
pub mod rooms;
pub mod stages;
pub mod ws;
