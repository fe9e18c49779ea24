use axum::{http::StatusCode, response::IntoResponse, routing::get, routing::post, Router};
use reaper::orchestrator::CleanupOrchestrator;
use std::sync::Arc;

pub mod endpoints;

/// Shared state accessed by route handlers.
#[derive(Clone)]
pub struct RouterState {
    orchestrator: Arc<CleanupOrchestrator>,
}

impl std::fmt::Debug for RouterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterState")
            .field("orchestrator", &"CleanupOrchestrator")
            .finish()
    }
}

impl RouterState {
    pub fn new(orchestrator: Arc<CleanupOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<CleanupOrchestrator> {
        &self.orchestrator
    }
}

/// Create a new router instance with all routes configured.
///
/// Authorization for the admin routes is a deployment concern (reverse
/// proxy or sidecar); the handlers themselves are unauthenticated.
pub fn create_router(state: RouterState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/admin/cleanup/stats", get(endpoints::cleanup::get_stats))
        .route(
            "/admin/cleanup/trigger",
            post(endpoints::cleanup::trigger_cleanup),
        )
        .with_state(state)
}

/// Public health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
