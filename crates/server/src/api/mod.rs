pub mod attendance;
pub mod dispatch;
pub mod enrollments;
pub mod health;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

use cadence_engine::{EngineMetrics, FunnelOrchestrator, MessageDispatcher, WebhookReconciler};
use cadence_state::CampaignStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CampaignStore>,
    pub orchestrator: Arc<FunnelOrchestrator>,
    pub dispatcher: Arc<MessageDispatcher>,
    pub reconciler: Arc<WebhookReconciler>,
    pub metrics: Arc<EngineMetrics>,
}

/// Build the Axum router with all API routes and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health & metrics
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        // Enrollment lifecycle
        .route("/v1/enrollments", post(enrollments::create))
        .route("/v1/enrollments/{id}", delete(enrollments::cancel))
        .route("/v1/attendance", post(attendance::record))
        // Provider callbacks
        .route("/v1/webhooks/{provider}", post(webhooks::ingest))
        // One-off sends and inspection
        .route("/v1/dispatch", post(dispatch::manual))
        .route("/v1/workflows/{id}", get(dispatch::get_workflow))
        .route("/v1/workflows/{id}/audit", get(dispatch::get_audit))
        .route("/v1/events/unresolved", get(webhooks::unresolved))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
