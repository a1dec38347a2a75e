use axum::{
    extract::{Extension, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::{
    models::CurrentUser,
    render,
    services::auth_service::{self, FieldErrors},
    AppState,
};

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn htmx_redirect(path: &'static str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("HX-Redirect", HeaderValue::from_static(path));
    (StatusCode::OK, headers, Html("".to_string())).into_response()
}

fn see_other(path: &'static str) -> Response {
    (StatusCode::SEE_OTHER, [("Location", path)], Html("".to_string())).into_response()
}

fn render_form(state: &AppState, tpl: &str, values: serde_json::Value, errors: serde_json::Map<String, serde_json::Value>) -> Response {
    let html = state
        .hbs
        .render(tpl, &json!({ "values": values, "errors": errors }))
        .unwrap_or_else(|e| format!("template error: {e}"));
    (StatusCode::OK, Html(html)).into_response()
}

fn merge(errors: &mut serde_json::Map<String, serde_json::Value>, errs: FieldErrors) {
    for (k, v) in errs {
        errors.insert(k, json!(v));
    }
}

fn page(state: &AppState, headers: &HeaderMap, tpl: &str, title: &str) -> Response {
    let body = match state.hbs.render(tpl, &json!({})) {
        Ok(s) => s,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("template error: {e}")),
            )
                .into_response()
        }
    };

    if is_htmx(headers) {
        return (StatusCode::OK, Html(body)).into_response();
    }

    match render::render_full(state, title, body, None) {
        Ok(page) => (StatusCode::OK, Html(page)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Html(e)).into_response(),
    }
}

/// Sets the session cookie and sends the browser to the dashboard.
fn sign_in(state: &AppState, headers: &HeaderMap, jar: CookieJar, token: String) -> Response {
    let jar = jar.add(auth_service::auth_cookie(state, token));

    if is_htmx(headers) {
        return (jar, htmx_redirect("/dashboard")).into_response();
    }

    (jar, see_other("/dashboard")).into_response()
}

// ---------------- LOGIN ----------------

pub async fn get_login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page(&state, &headers, "pages/login", "Login")
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn post_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = form.email.trim().to_string();
    let password = form.password;

    let mut errors = serde_json::Map::new();

    if email.is_empty() {
        errors.insert("email".into(), json!("Email is required."));
    } else if !auth_service::is_valid_email(&email) {
        errors.insert("email".into(), json!("Invalid email."));
    }

    if password.is_empty() {
        errors.insert("password".into(), json!("Password is required."));
    }

    let values = json!({ "email": email });

    if !errors.is_empty() {
        return render_form(&state, "pages/login", values, errors);
    }

    let user = match auth_service::login_user(&state, &email, &password).await {
        Ok(u) => u,
        Err(errs) => {
            merge(&mut errors, errs);
            return render_form(&state, "pages/login", values, errors);
        }
    };

    match auth_service::make_jwt_with_days(&state, &user.id, auth_service::SESSION_DAYS) {
        Ok(token) => sign_in(&state, &headers, jar, token),
        Err(e) => {
            errors.insert("_form".into(), json!(format!("Auth error: {e}")));
            render_form(&state, "pages/login", values, errors)
        }
    }
}

// ---------------- REGISTER ----------------

pub async fn get_register(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page(&state, &headers, "pages/register", "Register")
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "confirmPassword")]
    pub confirm_password: String,
}

pub async fn post_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    let email = form.email.trim().to_string();
    let password = form.password;
    let confirm = form.confirm_password;

    let mut errors = serde_json::Map::new();

    if email.is_empty() {
        errors.insert("email".into(), json!("Email is required."));
    } else if !auth_service::is_valid_email(&email) {
        errors.insert("email".into(), json!("Invalid email."));
    }

    if let Some(msg) = auth_service::password_problem(&password) {
        errors.insert("password".into(), json!(msg));
    }

    if confirm.is_empty() {
        errors.insert("confirmPassword".into(), json!("Please confirm your password."));
    } else if password != confirm {
        errors.insert("confirmPassword".into(), json!("Passwords do not match."));
    }

    let values = json!({ "email": email });

    if !errors.is_empty() {
        return render_form(&state, "pages/register", values, errors);
    }

    let user_id = match auth_service::register_user(&state, &email, &password).await {
        Ok(id) => id,
        Err(errs) => {
            merge(&mut errors, errs);
            return render_form(&state, "pages/register", values, errors);
        }
    };

    match auth_service::make_jwt_with_days(&state, &user_id, auth_service::SESSION_DAYS) {
        Ok(token) => sign_in(&state, &headers, jar, token),
        Err(e) => {
            errors.insert("_form".into(), json!(format!("Auth error: {e}")));
            render_form(&state, "pages/register", values, errors)
        }
    }
}

// ---------------- LOGOUT ----------------

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(auth_service::clear_auth_cookie(&state));
    (jar, (StatusCode::SEE_OTHER, [("Location", "/")]))
}

// ---------------- REFRESH ----------------

// POST /api/auth/refresh
// Re-issues the session with a fresh expiry, both as cookie and in the body
// for Bearer clients.
pub async fn post_refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response();
    };

    match auth_service::make_jwt_with_days(&state, &u.id, auth_service::SESSION_DAYS) {
        Ok(token) => {
            tracing::debug!(user_id = %u.id, "session refreshed");
            let jar = jar.add(auth_service::auth_cookie(&state, token.clone()));
            (
                jar,
                Json(json!({ "message": "Token refreshed successfully", "token": token })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(user_id = %u.id, error = %e, "session refresh failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to refresh token" })),
            )
                .into_response()
        }
    }
}
