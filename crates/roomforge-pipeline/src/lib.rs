//! Roomforge Pipeline: the orchestration engine.
//!
//! Drives the story, asset, code and deploy stages for a room in strict
//! sequence. Each stage call is bounded by a timeout, retried with capped
//! exponential backoff, and reported on the room's log channel. The first
//! stage to exhaust its retries stops the workflow.

pub mod application;
pub mod domain;
