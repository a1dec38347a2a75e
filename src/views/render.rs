use serde_json::json;

use crate::{models::CurrentUser, AppState};

fn user_json(user: Option<&CurrentUser>) -> (bool, serde_json::Value) {
    match user {
        Some(u) => (
            true,
            json!({
                "id": u.id.to_hex(),
                "email": u.email,
                "telegram_id": u.telegram_id,
                "telegram_verified": u.telegram_verified,
            }),
        ),
        None => (false, serde_json::Value::Null),
    }
}

/// Wraps a rendered page body in the base layout (navbar, htmx, SSE hookup).
pub fn render_full(
    state: &AppState,
    title: &str,
    body_html: String,
    user: Option<&CurrentUser>,
) -> Result<String, String> {
    let (is_logged_in, user_json) = user_json(user);

    let ctx = json!({
        "title": title,
        "body": body_html,
        "is_logged_in": is_logged_in,
        "user": user_json,
    });

    state
        .hbs
        .render("layouts/base", &ctx)
        .map_err(|e| e.to_string())
}
