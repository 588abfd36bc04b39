use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use cadence_engine::EngineError;
use cadence_state::StateError;

/// Errors that can occur when running the Cadence server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An engine-level error surfaced through the API.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A store-level error surfaced through the API.
    #[error("state error: {0}")]
    State(#[from] StateError),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Engine(EngineError::MalformedWebhook(_)) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::SignatureRejected) => StatusCode::UNAUTHORIZED,
            Self::Engine(
                EngineError::UnknownProvider(_)
                | EngineError::WorkflowNotFound(_)
                | EngineError::EnrollmentNotFound(_),
            ) => StatusCode::NOT_FOUND,
            Self::Engine(EngineError::State(e)) | Self::State(e) => state_status(e),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn state_status(error: &StateError) -> StatusCode {
    match error {
        StateError::AlreadyExists(_) => StatusCode::CONFLICT,
        StateError::NotFound(_) => StatusCode::NOT_FOUND,
        StateError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
