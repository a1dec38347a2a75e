use axum::{
    http::{header, Request, StatusCode},
    routing::post,
    Extension, Router,
};
use http_body_util::BodyExt;
use mongodb::{bson::oid::ObjectId, Client};
use cryptowatch::{controllers::alerts_controller, config, models::CurrentUser, AppState};
use tower::ServiceExt;

async fn test_state() -> AppState {
    let mut settings = config::load();
    settings.telegram_bot_token = String::new();
    settings.alert_monitor_autostart = false;

    let client = Client::with_uri_str(&settings.mongodb_uri)
        .await
        .expect("mongodb client");
    let db = client.database(&settings.mongodb_db);

    AppState::build(settings, db).expect("app state")
}

async fn response_body_string(res: axum::response::Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

fn user(verified: bool) -> CurrentUser {
    CurrentUser {
        id: ObjectId::new(),
        email: "trader@example.com".to_string(),
        telegram_id: verified.then(|| "123456789".to_string()),
        telegram_verified: verified,
    }
}

fn form_request(uri: &str, body: &'static str) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(axum::body::Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn create_alert_without_user_returns_401() {
    let state = test_state().await;
    let app = Router::new()
        .route("/alerts", post(alerts_controller::post_create_alert))
        .with_state(state);

    let res = app
        .oneshot(form_request(
            "/alerts",
            "coinId=bitcoin&coinName=Bitcoin&coinSymbol=btc&alertType=price&comparison=above&target=100000",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = response_body_string(res).await;
    assert!(body.to_lowercase().contains("unauthorized"));
}

#[tokio::test]
async fn create_alert_requires_verified_telegram() {
    let state = test_state().await;
    let app = Router::new()
        .route("/alerts", post(alerts_controller::post_create_alert))
        .layer(Extension(user(false)))
        .with_state(state);

    let res = app
        .oneshot(form_request(
            "/alerts",
            "coinId=bitcoin&coinName=Bitcoin&coinSymbol=btc&alertType=price&comparison=above&target=100000",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = response_body_string(res).await;
    assert!(body.contains("Link and verify your Telegram account"));
}

#[tokio::test]
async fn create_alert_invalid_target_renders_error() {
    let state = test_state().await;
    let app = Router::new()
        .route("/alerts", post(alerts_controller::post_create_alert))
        .layer(Extension(user(true)))
        .with_state(state);

    let res = app
        .oneshot(form_request(
            "/alerts",
            "coinId=bitcoin&coinName=Bitcoin&coinSymbol=btc&alertType=price&comparison=above&target=-5",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = response_body_string(res).await;
    assert!(body.contains("Please enter a positive number."));
}

#[tokio::test]
async fn create_alert_missing_coin_renders_error() {
    let state = test_state().await;
    let app = Router::new()
        .route("/alerts", post(alerts_controller::post_create_alert))
        .layer(Extension(user(true)))
        .with_state(state);

    let res = app
        .oneshot(form_request(
            "/alerts",
            "coinId=&alertType=percentage&comparison=increase&target=5",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = response_body_string(res).await;
    assert!(body.contains("Please choose a coin."));
}

#[tokio::test]
async fn toggle_alert_bad_id_returns_400() {
    let state = test_state().await;
    let app = Router::new()
        .route("/alerts/:id/toggle", post(alerts_controller::post_toggle_alert))
        .layer(Extension(user(true)))
        .with_state(state);

    let res = app.oneshot(form_request("/alerts/not-an-id/toggle", "")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_alert_bad_id_returns_400() {
    let state = test_state().await;
    let app = Router::new()
        .route("/alerts/:id/delete", post(alerts_controller::post_delete_alert))
        .layer(Extension(user(true)))
        .with_state(state);

    let res = app.oneshot(form_request("/alerts/xyz/delete", "")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_alert_without_user_returns_401() {
    let state = test_state().await;
    let app = Router::new()
        .route("/alerts/:id/delete", post(alerts_controller::post_delete_alert))
        .with_state(state);

    let res = app
        .oneshot(form_request("/alerts/65f000000000000000000000/delete", ""))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
