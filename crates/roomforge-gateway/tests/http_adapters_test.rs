//! Integration tests for the HTTP adapters against a local stand-in server.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::{Json, Router};
use roomforge_core::collaborators::{RewardService, RoomStatusUpdater, StageClient};
use roomforge_core::error::PipelineError;
use roomforge_core::room::{RoomId, RoomStatus};
use roomforge_core::stage::{Stage, StageDescriptor};
use roomforge_gateway::{HttpRewardService, HttpRoomStatusUpdater, HttpStageClient};
use serde_json::{Value, json};

type Seen = Arc<Mutex<Vec<(String, Value)>>>;

/// Serves `router` on an ephemeral port and returns its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn recording_app(seen: Seen) -> Router {
    Router::new()
        .route(
            "/generate",
            post(|State(seen): State<Seen>, Json(body): Json<Value>| async move {
                seen.lock().unwrap().push(("generate".into(), body.clone()));
                Json(json!({ "echo": body }))
            }),
        )
        .route(
            "/broken",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        )
        .route(
            "/garbled",
            post(|| async { (StatusCode::OK, "not json") }),
        )
        .route(
            "/rooms/{room_id}",
            patch(
                |State(seen): State<Seen>, Path(room_id): Path<String>, Json(body): Json<Value>| async move {
                    seen.lock().unwrap().push((format!("rooms/{room_id}"), body));
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .route(
            "/rewards",
            post(|State(seen): State<Seen>, Json(body): Json<Value>| async move {
                seen.lock().unwrap().push(("rewards".into(), body));
                StatusCode::OK
            }),
        )
        .with_state(seen)
}

fn descriptor(endpoint: String) -> StageDescriptor {
    StageDescriptor {
        stage: Stage::Story,
        timeout_ms: 5_000,
        endpoint,
    }
}

#[tokio::test]
async fn test_stage_client_posts_body_and_returns_json() {
    // Arrange
    let seen = Seen::default();
    let base = serve(recording_app(seen.clone())).await;
    let client = HttpStageClient::new(reqwest::Client::new());
    let body = json!({ "roomId": "r1", "input": { "theme": "attic" } });

    // Act
    let payload = client
        .call(&descriptor(format!("{base}/generate")), body.clone())
        .await
        .unwrap();

    // Assert
    assert_eq!(payload, json!({ "echo": body }));
    assert_eq!(seen.lock().unwrap()[0], ("generate".to_owned(), body));
}

#[tokio::test]
async fn test_stage_client_maps_error_status_to_transport() {
    let base = serve(recording_app(Seen::default())).await;
    let client = HttpStageClient::new(reqwest::Client::new());

    let result = client
        .call(&descriptor(format!("{base}/broken")), json!({}))
        .await;

    match result {
        Err(PipelineError::Transport { stage, message }) => {
            assert_eq!(stage, Stage::Story);
            assert!(message.contains("502"));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stage_client_maps_unparsable_body_to_transport() {
    let base = serve(recording_app(Seen::default())).await;
    let client = HttpStageClient::new(reqwest::Client::new());

    let result = client
        .call(&descriptor(format!("{base}/garbled")), json!({}))
        .await;

    assert!(matches!(result, Err(PipelineError::Transport { .. })));
}

#[tokio::test]
async fn test_stage_client_unreachable_endpoint_is_retryable() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = HttpStageClient::new(reqwest::Client::new());

    let err = client
        .call(&descriptor(format!("http://{addr}/generate")), json!({}))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_room_status_updater_patches_room() {
    // Arrange
    let seen = Seen::default();
    let base = serve(recording_app(seen.clone())).await;
    let updater = HttpRoomStatusUpdater::new(reqwest::Client::new(), format!("{base}/"));

    // Act
    updater
        .update_room_status(&RoomId::from("r1"), RoomStatus::Done)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        seen.lock().unwrap()[0],
        ("rooms/r1".to_owned(), json!({ "status": "done" }))
    );
}

#[tokio::test]
async fn test_room_status_updater_reports_rejection_as_collaborator_error() {
    let base = serve(recording_app(Seen::default())).await;
    let updater = HttpRoomStatusUpdater::new(reqwest::Client::new(), format!("{base}/missing"));

    let result = updater
        .update_room_status(&RoomId::from("r1"), RoomStatus::Running)
        .await;

    assert!(matches!(result, Err(PipelineError::Collaborator(_))));
}

#[tokio::test]
async fn test_reward_service_posts_room_and_amount() {
    // Arrange
    let seen = Seen::default();
    let base = serve(recording_app(seen.clone())).await;
    let rewards = HttpRewardService::new(reqwest::Client::new(), format!("{base}/rewards"));

    // Act
    rewards.reward_user(&RoomId::from("r1"), 100).await.unwrap();

    // Assert
    assert_eq!(
        seen.lock().unwrap()[0],
        ("rewards".to_owned(), json!({ "roomId": "r1", "amount": 100 }))
    );
}
