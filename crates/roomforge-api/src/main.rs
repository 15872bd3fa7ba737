//! Roomforge API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use roomforge_api::error::AppError;
use roomforge_api::state::AppState;
use roomforge_api::{app, telemetry};
use roomforge_core::clock::{Clock, SystemClock};
use roomforge_core::collaborators::{RewardService, RoomStatusUpdater};
use roomforge_core::config::PipelineConfig;
use roomforge_gateway::{
    HttpRewardService, HttpRoomStatusUpdater, HttpStageClient, TracingRewardService,
    TracingRoomStatusUpdater,
};
use roomforge_pipeline::application::engine::{EngineCollaborators, WorkflowEngine};
use roomforge_realtime::broker::LogBroker;
use roomforge_realtime::hub::NotificationHub;

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let telemetry = telemetry::init(env_var("OTEL_EXPORTER_OTLP_ENDPOINT").as_deref())?;

    tracing::info!("Starting Roomforge orchestrator");

    // Read configuration from environment.
    let config = Arc::new(PipelineConfig::from_env()?);
    let host = env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
    let port: u16 = env_var("PORT")
        .unwrap_or_else(|| "3000".to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?;

    let http = reqwest::Client::new();
    let room_status: Arc<dyn RoomStatusUpdater> = match env_var("ROOM_STATUS_URL") {
        Some(url) => Arc::new(HttpRoomStatusUpdater::new(http.clone(), url)),
        None => Arc::new(TracingRoomStatusUpdater),
    };
    let rewards: Arc<dyn RewardService> = match env_var("REWARD_URL") {
        Some(url) => Arc::new(HttpRewardService::new(http.clone(), url)),
        None => Arc::new(TracingRewardService),
    };

    // Build application state.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let broker = Arc::new(LogBroker::new());
    let engine = Arc::new(WorkflowEngine::new(
        Arc::clone(&config),
        EngineCollaborators {
            stage_client: Arc::new(HttpStageClient::new(http)),
            log_publisher: broker.clone(),
            room_status,
            rewards,
            clock: Arc::clone(&clock),
        },
    ));
    let hub = Arc::new(NotificationHub::new(broker, clock));
    let app_state = AppState::new(config, engine, hub);

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await?;

    telemetry.shutdown();
    Ok(())
}
