//! Pipeline services, leaf to root: emitter, invoker, retry coordinator,
//! engine.

pub mod emitter;
pub mod engine;
pub mod invoker;
pub mod retry;
