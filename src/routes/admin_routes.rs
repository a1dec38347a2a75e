use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::{monitor_controller, telegram_controller}};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/api/monitor/alerts",
            get(monitor_controller::get_status).post(monitor_controller::post_action),
        )
        .route("/api/telegram/webhook", post(telegram_controller::post_webhook))
        .route("/api/admin/set-webhook", post(telegram_controller::post_set_webhook))
        .route("/api/admin/status", get(telegram_controller::get_bot_status))
}
