use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::authorize_bearer;
use crate::{
    config::config_model::DotEnvyConfig,
    usecases::history_retention::{HistoryRetentionParams, HistoryRetentionUseCase},
};

#[derive(Clone)]
pub struct HistoryRetentionRouteState {
    config: Arc<DotEnvyConfig>,
    usecase: Arc<HistoryRetentionUseCase>,
}

pub fn routes(config: Arc<DotEnvyConfig>, usecase: Arc<HistoryRetentionUseCase>) -> Router {
    Router::new()
        .route("/chat-history", post(run_history_retention))
        .with_state(HistoryRetentionRouteState { config, usecase })
}

#[derive(Debug, Deserialize)]
pub struct HistoryRetentionRequest {
    pub max_entries: Option<i64>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct HistoryRetentionResponse {
    pub conversations_scanned: usize,
    pub conversations_trimmed: usize,
    pub messages_deleted: u64,
    pub trim_failures: usize,
    pub dry_run: bool,
    pub overflowing_chat_ids: Vec<i64>,
}

pub async fn run_history_retention(
    State(state): State<HistoryRetentionRouteState>,
    headers: HeaderMap,
    Json(payload): Json<HistoryRetentionRequest>,
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

    let params = HistoryRetentionParams {
        max_entries: payload.max_entries.unwrap_or(state.config.history.max_entries),
        dry_run: payload.dry_run.unwrap_or(false),
    };

    match state.usecase.run(params.clone()).await {
        Ok(report) => Json(HistoryRetentionResponse {
            conversations_scanned: report.conversations_scanned,
            conversations_trimmed: report.conversations_trimmed,
            messages_deleted: report.messages_deleted,
            trim_failures: report.trim_failures,
            dry_run: params.dry_run,
            overflowing_chat_ids: report.overflowing_chat_ids,
        })
        .into_response(),
        Err(err) => {
            error!(error = ?err, "history: manual retention pass failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "history trim failed").into_response()
        }
    }
}
