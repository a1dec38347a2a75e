use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{require_admin, tokens_match},
    services::{
        alerts_service,
        telegram::{self, Command, Update},
        user_service,
    },
    AppState,
};

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

fn secret_matches(state: &AppState, headers: &HeaderMap) -> bool {
    let expected = state.settings.telegram_webhook_secret.as_str();
    if expected.is_empty() {
        return true;
    }
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| tokens_match(v, expected))
}

async fn status_reply(state: &AppState, chat_id: &str) -> String {
    let user = match user_service::find_by_telegram_id(state, chat_id).await {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(chat_id, error = %e, "status lookup failed");
            None
        }
    };

    match user {
        Some(u) => {
            let active = alerts_service::count_active_alerts(state, u.id)
                .await
                .unwrap_or(0);
            telegram::status_message(Some((&u.email, active)))
        }
        None => telegram::status_message(None),
    }
}

// POST /api/telegram/webhook
pub async fn post_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Response {
    if !secret_matches(&state, &headers) {
        tracing::warn!("telegram webhook called with a bad secret token");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response();
    }

    let Some(message) = update.message else {
        return (StatusCode::OK, Json(json!({ "ok": true }))).into_response();
    };

    let chat_id = message.chat.id.to_string();
    let text = message.text.unwrap_or_default();
    let command = Command::parse(&text);

    tracing::debug!(update_id = update.update_id, chat_id = %chat_id, ?command, "telegram update");

    let reply = match command {
        Command::Start => telegram::welcome_message(&chat_id),
        Command::Help => telegram::help_message(),
        Command::Status => status_reply(&state, &chat_id).await,
        Command::Other => telegram::fallback_message(),
    };

    // Telegram retries non-2xx deliveries; a failed reply is only logged.
    if let Err(e) = state.telegram.send_message(&chat_id, &reply).await {
        tracing::warn!(chat_id = %chat_id, error = %e, "telegram reply failed");
    }

    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

#[derive(Deserialize)]
pub struct SetWebhookBody {
    #[serde(default, rename = "webhookUrl")]
    pub webhook_url: String,
}

// POST /api/admin/set-webhook {webhookUrl}
pub async fn post_set_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SetWebhookBody>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    let url = body.webhook_url.trim();
    if !url.starts_with("https://") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "webhookUrl must be an https URL" })),
        )
            .into_response();
    }

    let secret = Some(state.settings.telegram_webhook_secret.as_str());
    match state.telegram.set_webhook(url, secret).await {
        Ok(result) => {
            tracing::info!(url, "telegram webhook set");
            (
                StatusCode::OK,
                Json(json!({ "message": "Webhook set successfully", "result": result })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "setting telegram webhook failed");
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

// GET /api/admin/status
pub async fn get_bot_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    if !state.telegram.is_configured() {
        return (
            StatusCode::OK,
            Json(json!({ "configured": false, "monitor": state.monitor.status() })),
        )
            .into_response();
    }

    let bot = state.telegram.get_me().await;
    let webhook = state.telegram.get_webhook_info().await;

    let to_json = |r: Result<serde_json::Value, crate::error::TelegramError>| match r {
        Ok(v) => v,
        Err(e) => json!({ "error": e.to_string() }),
    };

    (
        StatusCode::OK,
        Json(json!({
            "configured": true,
            "bot": to_json(bot),
            "webhook": to_json(webhook),
            "monitor": state.monitor.status(),
        })),
    )
        .into_response()
}
