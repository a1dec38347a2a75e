use axum::{
    extract::{Extension, Form, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use chrono::DateTime;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::json;

use crate::{
    models::{Alert, CurrentUser},
    render,
    services::alerts_service::{self, NewAlertInput},
    AppState,
};

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn hx_trigger_value(events: &[&str]) -> HeaderValue {
    if events.len() == 1 {
        return HeaderValue::from_str(events[0]).unwrap_or_else(|_| HeaderValue::from_static(""));
    }

    let mut map = serde_json::Map::new();
    for &e in events {
        map.insert(e.to_string(), serde_json::Value::Bool(true));
    }

    let json = serde_json::Value::Object(map).to_string();
    HeaderValue::from_str(&json).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn unauthorized_snippet() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Html(r#"<div class="text-danger">Unauthorized</div>"#.to_string()),
    )
        .into_response()
}

fn render_page(state: &AppState, tpl: &str, ctx: &serde_json::Value) -> String {
    state
        .hbs
        .render(tpl, ctx)
        .unwrap_or_else(|e| format!("template error: {e}"))
}

fn fmt_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default()
}

fn alert_row(a: &Alert) -> serde_json::Value {
    json!({
        "id": a.id.to_hex(),
        "coin_id": a.coin_id,
        "coin_name": a.coin_name,
        "coin_symbol": a.coin_symbol.to_uppercase(),
        "condition": a.condition().map(|c| c.to_string()).unwrap_or_else(|| "Invalid condition".to_string()),
        "is_active": a.is_active,
        "triggered": a.triggered,
        "triggered_at": a.triggered_at.map(fmt_ts),
        "created_at": fmt_ts(a.created_at),
    })
}

/// Re-renders the user's alert list, optionally with a status line on top.
async fn alerts_list_response(
    state: &AppState,
    user_id: ObjectId,
    message: Option<(bool, String)>,
) -> Response {
    let alerts = match alerts_service::list_user_alerts(state, user_id).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "listing alerts failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(r#"<div class="text-danger">Could not load alerts.</div>"#.to_string()),
            )
                .into_response();
        }
    };

    let rows: Vec<_> = alerts.iter().map(alert_row).collect();
    let (ok, text) = message.unwrap_or((true, String::new()));
    let ctx = json!({
        "alerts": if rows.is_empty() { serde_json::Value::Null } else { rows.into() },
        "message": if text.is_empty() { serde_json::Value::Null } else { json!(text) },
        "message_ok": ok,
    });

    (StatusCode::OK, Html(render_page(state, "partials/alerts_list", &ctx))).into_response()
}

// ---------------- Pages ----------------

// GET /alerts
pub async fn get_alerts_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let user_ref = user.as_ref().map(|Extension(u)| u);
    let verified = user_ref.is_some_and(|u| u.telegram_verified);
    let body = render_page(&state, "pages/alerts", &json!({ "telegram_verified": verified }));

    if is_htmx(&headers) {
        return (StatusCode::OK, Html(body)).into_response();
    }

    match render::render_full(&state, "Alerts", body, user_ref) {
        Ok(page) => (StatusCode::OK, Html(page)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Html(e)).into_response(),
    }
}

#[derive(Deserialize, Default)]
pub struct NewAlertQuery {
    pub coin: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

// GET /alerts/new?coin=&name=&symbol=
pub async fn get_new_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<NewAlertQuery>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let user_ref = user.as_ref().map(|Extension(u)| u);

    let mut errors = serde_json::Map::new();
    if !user_ref.is_some_and(|u| u.telegram_verified) {
        errors.insert(
            "_form".into(),
            json!("Link and verify your Telegram account on the profile page before creating alerts."),
        );
    }

    let ctx = json!({
        "values": {
            "coinId": q.coin.unwrap_or_default(),
            "coinName": q.name.unwrap_or_default(),
            "coinSymbol": q.symbol.unwrap_or_default(),
        },
        "errors": errors,
    });
    let body = render_page(&state, "pages/alert_new", &ctx);

    if is_htmx(&headers) {
        return (StatusCode::OK, Html(body)).into_response();
    }

    match render::render_full(&state, "New alert", body, user_ref) {
        Ok(page) => (StatusCode::OK, Html(page)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Html(e)).into_response(),
    }
}

// ---------------- Partials / actions ----------------

// GET /alerts/list
pub async fn get_alerts_list(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized_snippet();
    };
    alerts_list_response(&state, u.id, None).await
}

#[derive(Deserialize, Default)]
pub struct CreateAlertForm {
    #[serde(default, rename = "coinId")]
    pub coin_id: String,
    #[serde(default, rename = "coinName")]
    pub coin_name: String,
    #[serde(default, rename = "coinSymbol")]
    pub coin_symbol: String,
    #[serde(default, rename = "alertType")]
    pub alert_type: String,
    #[serde(default)]
    pub comparison: String,
    #[serde(default)]
    pub target: String,
}

// POST /alerts
pub async fn post_create_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: Option<Extension<CurrentUser>>,
    Form(form): Form<CreateAlertForm>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized_snippet();
    };

    let input = NewAlertInput {
        coin_id: form.coin_id,
        coin_name: form.coin_name,
        coin_symbol: form.coin_symbol,
        alert_type: form.alert_type,
        comparison: form.comparison,
        target: form.target,
    };

    if let Err(errs) = alerts_service::create_alert(&state, &u, &input).await {
        let ctx = json!({
            "values": {
                "coinId": input.coin_id,
                "coinName": input.coin_name,
                "coinSymbol": input.coin_symbol,
                "target": input.target,
            },
            "errors": errs,
        });
        return (StatusCode::OK, Html(render_page(&state, "pages/alert_new", &ctx))).into_response();
    }

    if is_htmx(&headers) {
        let mut h = HeaderMap::new();
        h.insert("HX-Redirect", HeaderValue::from_static("/alerts"));
        h.insert("HX-Trigger", hx_trigger_value(&["alertsUpdated"]));
        return (StatusCode::OK, h, Html("".to_string())).into_response();
    }

    (StatusCode::SEE_OTHER, [("Location", "/alerts")], Html("".to_string())).into_response()
}

// POST /alerts/:id/toggle
pub async fn post_toggle_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized_snippet();
    };

    let oid = match ObjectId::parse_str(&id) {
        Ok(x) => x,
        Err(_) => return (StatusCode::BAD_REQUEST, Html("bad id".to_string())).into_response(),
    };

    let message = match alerts_service::toggle_alert(&state, u.id, oid).await {
        Ok(a) if a.is_active => (true, "Alert resumed.".to_string()),
        Ok(_) => (true, "Alert paused.".to_string()),
        Err(msg) => (false, msg),
    };

    alerts_list_response(&state, u.id, Some(message)).await
}

// POST /alerts/:id/delete
pub async fn post_delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized_snippet();
    };

    let oid = match ObjectId::parse_str(&id) {
        Ok(x) => x,
        Err(_) => return (StatusCode::BAD_REQUEST, Html("bad id".to_string())).into_response(),
    };

    let message = match alerts_service::delete_alert(&state, u.id, oid).await {
        Ok(true) => (true, "Alert deleted.".to_string()),
        Ok(false) => (false, "Alert not found.".to_string()),
        Err(e) => {
            tracing::error!(alert_id = %oid, error = %e, "deleting alert failed");
            (false, "Could not delete the alert.".to_string())
        }
    };

    alerts_list_response(&state, u.id, Some(message)).await
}
