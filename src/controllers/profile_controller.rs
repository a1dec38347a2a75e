use axum::{
    extract::{Extension, Form, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::json;

use crate::{
    models::CurrentUser,
    render,
    services::{auth_service, user_service},
    AppState,
};

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
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

fn user_ctx(u: &CurrentUser) -> serde_json::Value {
    json!({
        "email": u.email,
        "telegram_id": u.telegram_id,
        "telegram_verified": u.telegram_verified,
    })
}

pub async fn me(user: Option<Extension<CurrentUser>>) -> impl IntoResponse {
    match user {
        Some(Extension(u)) => (StatusCode::OK, axum::Json(u)).into_response(),
        None => (StatusCode::UNAUTHORIZED, Html("not logged in".to_string())).into_response(),
    }
}

// GET /profile
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized_snippet();
    };

    let created_at = match user_service::find_by_id(&state, u.id).await {
        Ok(Some(db_user)) => DateTime::from_timestamp(db_user.created_at, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };

    let body = render_page(
        &state,
        "pages/profile",
        &json!({ "user": user_ctx(&u), "created_at": created_at }),
    );

    if is_htmx(&headers) {
        return (StatusCode::OK, Html(body)).into_response();
    }

    match render::render_full(&state, "Profile", body, Some(&u)) {
        Ok(page) => (StatusCode::OK, Html(page)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Html(e)).into_response(),
    }
}

#[derive(Deserialize)]
pub struct TelegramForm {
    #[serde(default, rename = "telegramId")]
    pub telegram_id: String,
}

// POST /profile/telegram
pub async fn post_link_telegram(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Form(form): Form<TelegramForm>,
) -> Response {
    let Some(Extension(mut u)) = user else {
        return unauthorized_snippet();
    };

    let ctx = match user_service::link_telegram(&state, u.id, &form.telegram_id).await {
        Ok(verified) => {
            u.telegram_id = user_service::normalize_chat_id(&form.telegram_id);
            u.telegram_verified = verified;
            let message = if verified {
                "Telegram linked. You will receive alerts in this chat."
            } else {
                "Could not reach that chat. Send /start to the bot first, then try again."
            };
            json!({ "user": user_ctx(&u), "message": message, "message_ok": verified })
        }
        Err(errs) => json!({
            "user": user_ctx(&u),
            "values": { "telegramId": form.telegram_id },
            "errors": errs,
        }),
    };

    (StatusCode::OK, Html(render_page(&state, "partials/telegram_panel", &ctx))).into_response()
}

// POST /profile/telegram/unlink
pub async fn post_unlink_telegram(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(mut u)) = user else {
        return unauthorized_snippet();
    };

    let ctx = match user_service::unlink_telegram(&state, u.id).await {
        Ok(()) => {
            u.telegram_id = None;
            u.telegram_verified = false;
            json!({ "user": user_ctx(&u), "message": "Telegram unlinked.", "message_ok": true })
        }
        Err(e) => {
            tracing::error!(user_id = %u.id, error = %e, "unlinking telegram failed");
            json!({ "user": user_ctx(&u), "errors": { "_form": "Could not unlink Telegram." } })
        }
    };

    (StatusCode::OK, Html(render_page(&state, "partials/telegram_panel", &ctx))).into_response()
}

#[derive(Deserialize)]
pub struct EmailForm {
    #[serde(default)]
    pub email: String,
}

// POST /profile/email
pub async fn post_update_email(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Form(form): Form<EmailForm>,
) -> Response {
    let Some(Extension(mut u)) = user else {
        return unauthorized_snippet();
    };

    let ctx = match user_service::update_email(&state, u.id, &form.email).await {
        Ok(email) => {
            u.email = email;
            json!({ "user": user_ctx(&u), "succ": "Email updated." })
        }
        Err(errs) => json!({
            "user": user_ctx(&u),
            "values": { "email": form.email.trim() },
            "errors": errs,
        }),
    };

    (StatusCode::OK, Html(render_page(&state, "partials/email_form", &ctx))).into_response()
}

#[derive(Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default, rename = "currentPassword")]
    pub current_password: String,
    #[serde(default, rename = "newPassword")]
    pub new_password: String,
    #[serde(default, rename = "confirmPassword")]
    pub confirm_password: String,
}

// POST /profile/password
pub async fn post_change_password(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Form(form): Form<ChangePasswordForm>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized_snippet();
    };

    let mut errors = serde_json::Map::new();

    if form.current_password.is_empty() {
        errors.insert("currentPassword".into(), json!("Current password is required."));
    }
    if let Some(msg) = auth_service::password_problem(&form.new_password) {
        errors.insert("newPassword".into(), json!(msg));
    }
    if form.new_password != form.confirm_password {
        errors.insert("confirmPassword".into(), json!("Passwords do not match."));
    }

    let ctx = if !errors.is_empty() {
        json!({ "errors": errors })
    } else {
        match user_service::change_password(&state, u.id, &form.current_password, &form.new_password)
            .await
        {
            Ok(()) => json!({ "succ": "Password updated." }),
            Err(errs) => json!({ "errors": errs }),
        }
    };

    (StatusCode::OK, Html(render_page(&state, "partials/password_form", &ctx))).into_response()
}

// POST /profile/delete
pub async fn post_delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized_snippet();
    };

    if let Err(e) = user_service::delete_account(&state, u.id).await {
        tracing::error!(user_id = %u.id, error = %e, "deleting account failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(r#"<div class="text-danger">Could not delete your account.</div>"#.to_string()),
        )
            .into_response();
    }

    let jar = jar.add(auth_service::clear_auth_cookie(&state));

    if is_htmx(&headers) {
        let mut h = HeaderMap::new();
        h.insert("HX-Redirect", HeaderValue::from_static("/"));
        return (jar, (StatusCode::OK, h, Html("".to_string()))).into_response();
    }

    (jar, (StatusCode::SEE_OTHER, [("Location", "/")])).into_response()
}
