use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{auth::require_admin, error::MonitorError, AppState};

// GET /api/monitor/alerts
pub async fn get_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    (
        StatusCode::OK,
        Json(json!({
            "message": "Alert monitor status",
            "status": state.monitor.status(),
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct MonitorAction {
    #[serde(default)]
    pub action: String,
}

// POST /api/monitor/alerts {action: start|stop|check}
pub async fn post_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MonitorAction>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    match body.action.trim() {
        "start" => {
            let started = state.monitor.start();
            let message = if started {
                "Alert monitor started"
            } else {
                "Alert monitor is already running"
            };
            (StatusCode::OK, Json(json!({ "message": message, "started": started }))).into_response()
        }
        "stop" => {
            let stopped = state.monitor.stop();
            let message = if stopped {
                "Alert monitor stopped"
            } else {
                "Alert monitor was not running"
            };
            (StatusCode::OK, Json(json!({ "message": message, "stopped": stopped }))).into_response()
        }
        "check" => match state.monitor.run_cycle().await {
            Ok(report) => (
                StatusCode::OK,
                Json(json!({ "message": "Manual check completed", "report": report })),
            )
                .into_response(),
            Err(MonitorError::CycleInProgress) => (
                StatusCode::CONFLICT,
                Json(json!({ "error": MonitorError::CycleInProgress.to_string() })),
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "manual alert check failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        },
        other => {
            tracing::debug!(action = other, "unknown monitor action");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid action" }))).into_response()
        }
    }
}
