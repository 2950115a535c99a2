use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::authorize_bearer;
use crate::{
    config::config_model::DotEnvyConfig,
    usecases::membership_sweep::{MembershipSweepParams, MembershipSweepUseCase},
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/sweep/membership" \
//     -H "Authorization: Bearer $INTERNAL_SWEEP_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"today":"2024-01-05","dry_run":true}'

#[derive(Clone)]
pub struct MembershipSweepRouteState {
    config: Arc<DotEnvyConfig>,
    usecase: Arc<MembershipSweepUseCase>,
}

pub fn routes(config: Arc<DotEnvyConfig>, usecase: Arc<MembershipSweepUseCase>) -> Router {
    Router::new()
        .route("/membership", post(run_membership_sweep))
        .with_state(MembershipSweepRouteState { config, usecase })
}

#[derive(Debug, Deserialize)]
pub struct MembershipSweepRequest {
    pub today: Option<NaiveDate>,
    pub batch_size: Option<i64>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MembershipSweepResponse {
    pub scanned: usize,
    pub reminders_sent: usize,
    pub reminder_failures: usize,
    pub evictions: usize,
    pub revoke_failures: usize,
    pub notice_failures: usize,
    pub exempt_owners: usize,
    pub already_absent: usize,
    pub role_check_failures: usize,
    pub dry_run: bool,
    pub reminder_candidate_ids: Vec<i64>,
    pub eviction_candidate_ids: Vec<i64>,
}

pub async fn run_membership_sweep(
    State(state): State<MembershipSweepRouteState>,
    headers: HeaderMap,
    Json(payload): Json<MembershipSweepRequest>,
) -> Response {
    let expected_token = match state.config.sweep.internal_token.as_deref() {
        Some(token) => token,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "sweep token is not configured",
            )
                .into_response();
        }
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (status, "unauthorized").into_response();
    }

    let today = payload.today.unwrap_or_else(|| {
        Utc::now()
            .with_timezone(&state.config.sweep.offset)
            .date_naive()
    });
    let params = MembershipSweepParams {
        today,
        batch_size: payload.batch_size.unwrap_or(state.config.sweep.batch_size),
        dry_run: payload.dry_run.unwrap_or(false),
    };

    match state.usecase.run(params.clone()).await {
        Ok(report) => Json(MembershipSweepResponse {
            scanned: report.scanned,
            reminders_sent: report.reminders_sent,
            reminder_failures: report.reminder_failures,
            evictions: report.evictions,
            revoke_failures: report.revoke_failures,
            notice_failures: report.notice_failures,
            exempt_owners: report.exempt_owners,
            already_absent: report.already_absent,
            role_check_failures: report.role_check_failures,
            dry_run: params.dry_run,
            reminder_candidate_ids: report.reminder_candidate_ids,
            eviction_candidate_ids: report.eviction_candidate_ids,
        })
        .into_response(),
        Err(err) => {
            error!(error = ?err, "sweep: manual membership sweep failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "membership sweep failed").into_response()
        }
    }
}
