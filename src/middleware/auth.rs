use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{models::{CurrentUser, User}, AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    // user id as hex string
    pub sub: String,
    // expiry (unix timestamp seconds)
    pub exp: usize,
}

fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;

    for part in raw.split(';') {
        let part = part.trim();
        let mut it = part.splitn(2, '=');
        let k = it.next()?.trim();
        let v = it.next()?.trim();
        if k == name {
            return Some(v.to_string());
        }
    }
    None
}

fn get_bearer(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Session token from the auth cookie, falling back to `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    get_cookie(headers, cookie_name)
        .filter(|t| !t.is_empty())
        .or_else(|| get_bearer(headers))
}

/// Validates signature and expiry; returns the user id.
pub fn verify_token(token: &str, secret: &str) -> Option<ObjectId> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()?;

    ObjectId::parse_str(&data.claims.sub).ok()
}

pub async fn inject_current_user(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let cookie_name = state.settings.jwt_cookie_name.as_str();

    if let Some(user_id) = session_token(req.headers(), cookie_name)
        .and_then(|t| verify_token(&t, &state.settings.jwt_secret))
    {
        let users = state.db.collection::<User>("users");

        match users.find_one(doc! { "_id": user_id }, None).await {
            // Store user in request extensions so handlers can access it
            Ok(Some(user)) => {
                req.extensions_mut().insert(CurrentUser::from(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "session user lookup failed"),
        }
    }

    next.run(req).await
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Pages and endpoints reachable without a session. The webhook and admin
/// endpoints carry their own credentials.
pub fn is_public_path(path: &str) -> bool {
    path == "/"
        || path == "/login"
        || path == "/register"
        || path == "/logout"
        || path == "/favicon.ico"
        || path == "/health"
        || path == "/health/db"
        || path.starts_with("/static/")
        || path == "/api/crypto/coins"
        || path == "/api/telegram/webhook"
        || path.starts_with("/api/monitor/")
        || path.starts_with("/api/admin/")
}

/// Compares shared secrets without an early exit on the first differing byte.
pub fn tokens_match(given: &str, expected: &str) -> bool {
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Admin endpoints authenticate with the `x-admin-token` header. With no
/// `ADMIN_TOKEN` configured they are closed.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let expected = state.settings.admin_token.as_str();
    let given = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if expected.is_empty() {
        tracing::warn!("admin endpoint called but ADMIN_TOKEN is not configured");
        return Err((
            StatusCode::FORBIDDEN,
            axum::Json(serde_json::json!({ "error": "Admin API is disabled" })),
        )
            .into_response());
    }

    if !tokens_match(given, expected) {
        return Err((
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response());
    }

    Ok(())
}

pub async fn require_auth(
    State(_state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path();

    if is_public_path(path) {
        return next.run(req).await;
    }

    // If inject_current_user already put CurrentUser in extensions => authenticated
    if req.extensions().get::<CurrentUser>().is_some() {
        return next.run(req).await;
    }

    // Not logged in:
    // - JSON API: 401
    // - HTMX: force full redirect to /login
    // - Normal: redirect to /login
    if path.starts_with("/api/") {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response();
    }

    if is_htmx(req.headers()) {
        let mut headers = HeaderMap::new();
        headers.insert("HX-Redirect", HeaderValue::from_static("/login"));
        return (StatusCode::OK, headers, Html("".to_string())).into_response();
    }

    Redirect::to("/login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_wins_over_bearer() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("a=1; auth=cookie-token"));
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        assert_eq!(session_token(&h, "auth").as_deref(), Some("cookie-token"));

        h.remove(header::COOKIE);
        assert_eq!(session_token(&h, "auth").as_deref(), Some("header-token"));

        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(session_token(&h, "auth"), None);
    }

    #[test]
    fn shared_secrets_compare_exactly() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cret", "s3creT"));
        assert!(!tokens_match("s3cre", "s3cret"));
        assert!(!tokens_match("", "s3cret"));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert_eq!(verify_token("not.a.jwt", "secret"), None);
    }

    #[test]
    fn public_paths() {
        assert!(is_public_path("/"));
        assert!(is_public_path("/static/css/app.css"));
        assert!(is_public_path("/api/telegram/webhook"));
        assert!(is_public_path("/api/monitor/alerts"));
        assert!(!is_public_path("/dashboard"));
        assert!(!is_public_path("/alerts"));
        assert!(is_public_path("/api/crypto/coins"));
        assert!(!is_public_path("/api/me"));
        assert!(!is_public_path("/api/auth/refresh"));
        assert!(!is_public_path("/profile/email"));
    }
}
