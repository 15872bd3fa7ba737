//! Roomforge: API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roomforge_core::error::PipelineError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The tracing pipeline could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        Self::Config(err.to_string())
    }
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer error that implements `IntoResponse`.
#[derive(Debug)]
pub enum ApiError {
    /// The request was well-formed JSON but semantically invalid.
    Validation(String),
    /// A pipeline operation failed.
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, "validation_error", message),
            Self::Pipeline(err) => {
                let (status, code) = match &err {
                    PipelineError::UnknownStage(_) => (StatusCode::BAD_REQUEST, "unknown_stage"),
                    PipelineError::Configuration(_) => {
                        (StatusCode::BAD_REQUEST, "configuration_error")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "pipeline_error"),
                };
                (status, code, err.to_string())
            }
        };

        let body = ErrorBody {
            error: error_code,
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomforge_core::stage::Stage;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_validation_maps_to_400() {
        assert_eq!(
            status_of(ApiError::Validation("bad input".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unknown_stage_maps_to_400() {
        assert_eq!(
            status_of(PipelineError::UnknownStage("polish".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_configuration_maps_to_400() {
        assert_eq!(
            status_of(PipelineError::Configuration("RETRY_MAX_ATTEMPTS".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_transport_maps_to_500() {
        assert_eq!(
            status_of(
                PipelineError::Transport {
                    stage: Stage::Code,
                    message: "connection refused".into(),
                }
                .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_pipeline_error_converts_to_config_app_error() {
        let err = AppError::from(PipelineError::Configuration("PORT".into()));

        assert!(matches!(err, AppError::Config(_)));
    }
}
