//! Cleanup stats and manual-trigger endpoints.

use crate::RouterState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use reaper::orchestrator::TriggerOutcome;
use serde_json::json;

/// Read-only statistics for the reconciliation loop: enabled flag, last run,
/// removal counts, the bounded recent-error list and the effective
/// (post-clamping) configuration.
pub async fn get_stats(State(state): State<RouterState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.orchestrator().stats_snapshot()))
}

/// Run one reconciliation cycle through the orchestrator's state machine.
///
/// The outcome mirrors the trigger contract: `ran` with the cycle report,
/// `skipped:in-progress` when another cycle holds the guard, or `disabled`.
pub async fn trigger_cleanup(State(state): State<RouterState>) -> impl IntoResponse {
    let outcome = state.orchestrator().trigger().await;

    tracing::info!(outcome = outcome.as_str(), "Manual cleanup trigger handled");

    let body = match &outcome {
        TriggerOutcome::Ran { report } => json!({
            "outcome": outcome.as_str(),
            "report": report,
        }),
        _ => json!({ "outcome": outcome.as_str() }),
    };

    let status = match outcome {
        // A second trigger during an in-flight cycle is rejected, not queued.
        TriggerOutcome::SkippedInProgress => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };

    (status, Json(body))
}
