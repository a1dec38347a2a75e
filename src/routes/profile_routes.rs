use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::profile_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/profile", get(profile_controller::get_profile))
        .route("/profile/telegram", post(profile_controller::post_link_telegram))
        .route("/profile/telegram/unlink", post(profile_controller::post_unlink_telegram))
        .route("/profile/email", post(profile_controller::post_update_email))
        .route("/profile/password", post(profile_controller::post_change_password))
        .route("/profile/delete", post(profile_controller::post_delete_account))
}
