//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use roomforge_core::config::PipelineConfig;
use roomforge_pipeline::application::engine::{EngineCollaborators, WorkflowEngine};
use roomforge_realtime::broker::LogBroker;
use roomforge_realtime::hub::NotificationHub;
use roomforge_test_support::{
    FixedClock, RecordingRewardService, RecordingRoomStatus, ScriptedStageClient,
};
use tower::ServiceExt;

use roomforge_api::app;
use roomforge_api::state::AppState;

/// Handles on the collaborators behind a test app.
pub struct TestApp {
    pub router: Router,
    pub hub: Arc<NotificationHub>,
    pub broker: Arc<LogBroker>,
    pub stage_client: Arc<ScriptedStageClient>,
    pub room_status: Arc<RecordingRoomStatus>,
    pub rewards: Arc<RecordingRewardService>,
}

/// Build the full app router over deterministic collaborators. Uses the
/// same route structure as `main.rs`.
pub fn build_test_app() -> TestApp {
    build_test_app_with(ScriptedStageClient::new())
}

/// Build the full app router with a custom scripted stage client.
pub fn build_test_app_with(stage_client: ScriptedStageClient) -> TestApp {
    let config = Arc::new(PipelineConfig::from_lookup(|_| None).unwrap());
    let clock = Arc::new(FixedClock::at_reference_time());
    let broker = Arc::new(LogBroker::new());
    let stage_client = Arc::new(stage_client);
    let room_status = Arc::new(RecordingRoomStatus::new());
    let rewards = Arc::new(RecordingRewardService::new());

    let engine = Arc::new(WorkflowEngine::new(
        Arc::clone(&config),
        EngineCollaborators {
            stage_client: stage_client.clone(),
            log_publisher: broker.clone(),
            room_status: room_status.clone(),
            rewards: rewards.clone(),
            clock: clock.clone(),
        },
    ));
    let hub = Arc::new(NotificationHub::new(broker.clone(), clock));

    TestApp {
        router: app(AppState::new(config, engine, Arc::clone(&hub))),
        hub,
        broker,
        stage_client,
        room_status,
        rewards,
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
