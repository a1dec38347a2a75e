use axum::{Router, routing::get};
use crate::{AppState, controllers::dashboard_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/dashboard", get(dashboard_controller::get_dashboard))
        .route("/coins", get(dashboard_controller::get_coins))
        .route("/coins/:id", get(dashboard_controller::get_coin))
        .route("/search", get(dashboard_controller::get_search_results))
        .route("/api/crypto/coins", get(dashboard_controller::api_coins))
}
