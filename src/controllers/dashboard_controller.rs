use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{models::CurrentUser, render, services::crypto_service, AppState};

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn render_page(state: &AppState, tpl: &str, ctx: &serde_json::Value) -> String {
    state
        .hbs
        .render(tpl, ctx)
        .unwrap_or_else(|e| format!("template error: {e}"))
}

fn full_or_partial(
    state: &AppState,
    headers: &HeaderMap,
    user: Option<&CurrentUser>,
    title: &str,
    body: String,
) -> Response {
    if is_htmx(headers) {
        return (StatusCode::OK, Html(body)).into_response();
    }

    match render::render_full(state, title, body, user) {
        Ok(page) => (StatusCode::OK, Html(page)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Html(e)).into_response(),
    }
}

#[derive(Deserialize)]
pub struct PagingQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

// GET /dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let body = render_page(&state, "pages/dashboard", &json!({}));
    let user_ref = user.as_ref().map(|Extension(u)| u);
    full_or_partial(&state, &headers, user_ref, "Dashboard", body)
}

// GET /coins?page=&limit=  (partial)
pub async fn get_coins(
    State(state): State<AppState>,
    Query(q): Query<PagingQuery>,
) -> Response {
    let (page, limit) = match crypto_service::parse_paging(q.page.as_deref(), q.limit.as_deref()) {
        Ok(p) => p,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                Html(format!(r#"<div class="text-danger">{msg}</div>"#)),
            )
                .into_response()
        }
    };

    let ctx = crypto_service::coins_table_ctx(&state, page, limit).await;
    (StatusCode::OK, Html(render_page(&state, "partials/coins_table", &ctx))).into_response()
}

// GET /coins/:id
pub async fn get_coin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let user_ref = user.as_ref().map(|Extension(u)| u);
    let coin_id = id.trim().to_lowercase();

    let Some(ctx) = crypto_service::coin_details_ctx(&state, &coin_id).await else {
        let body = render_page(&state, "pages/not_found", &json!({}));
        if is_htmx(&headers) {
            return (StatusCode::NOT_FOUND, Html(body)).into_response();
        }
        return match render::render_full(&state, "404", body, user_ref) {
            Ok(page) => (StatusCode::NOT_FOUND, Html(page)).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Html(e)).into_response(),
        };
    };

    let title = ctx["coin"]["name"].as_str().unwrap_or("Coin").to_string();
    let body = render_page(&state, "pages/coin", &ctx);
    full_or_partial(&state, &headers, user_ref, &title, body)
}

// GET /search?q=  (partial)
pub async fn get_search_results(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let q = query.q.unwrap_or_default();
    let ctx = crypto_service::search_results_ctx(&state, &q).await;
    (StatusCode::OK, Html(render_page(&state, "partials/search_results", &ctx))).into_response()
}

// GET /api/crypto/coins?page=&limit=
pub async fn api_coins(
    State(state): State<AppState>,
    Query(q): Query<PagingQuery>,
) -> Response {
    let (page, limit) = match crypto_service::parse_paging(q.page.as_deref(), q.limit.as_deref()) {
        Ok(p) => p,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid page or limit parameters" })),
            )
                .into_response()
        }
    };

    match state.coingecko.top_coins(limit, page).await {
        Ok(coins) => (StatusCode::OK, Json(json!({ "coins": coins }))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "api coins fetch failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Failed to fetch cryptocurrency data" })),
            )
                .into_response()
        }
    }
}
