//! Roomforge Gateway: outbound HTTP adapters for the collaborator traits.
//!
//! Each adapter wraps a shared [`reqwest::Client`]. Stage calls carry no
//! client-side timeout; the pipeline's invoker owns the deadline.

pub mod reward;
pub mod room_status;
pub mod stage_client;

pub use reward::{HttpRewardService, TracingRewardService};
pub use room_status::{HttpRoomStatusUpdater, TracingRoomStatusUpdater};
pub use stage_client::HttpStageClient;

/// Joins `base` and `path` with exactly one slash between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
