//! Job status and manual triggers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use worker::{JobStatus, TriggerResult};

use crate::response::{ApiError, TriggerResponse};
use crate::state::AppState;

/// GET /jobs - Status of every registered job.
pub async fn list_handler(State(state): State<AppState>) -> Json<Vec<JobStatus>> {
    Json(state.scheduler.statuses())
}

/// POST /jobs/{name}/run - Run a job now, unless it is already running.
///
/// 202 when accepted, 409 when the trigger was skipped.
pub async fn trigger_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    let result = state.scheduler.trigger(&name)?;
    info!(job = %name, ?result, "Manual job trigger");

    let status = match result {
        TriggerResult::Accepted => StatusCode::ACCEPTED,
        TriggerResult::AlreadyRunning => StatusCode::CONFLICT,
    };
    Ok((status, Json(TriggerResponse { job: name, result })))
}
