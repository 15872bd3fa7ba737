//! Roomforge Realtime: everything pushed to live viewers.
//!
//! [`broker::LogBroker`] is the in-process pub/sub transport behind the
//! `room:<id>:logs` channels. [`hub::NotificationHub`] tracks which live
//! connections have joined which rooms and fans room-scoped events out to
//! them. Both are at-most-once: nothing is queued for absent subscribers.

pub mod broker;
pub mod events;
pub mod hub;
