use axum::{
    http::{header, Request, StatusCode},
    routing::post,
    Extension, Router,
};
use http_body_util::BodyExt;
use mongodb::{bson::oid::ObjectId, Client};
use cryptowatch::{
    auth::verify_token,
    config,
    controllers::{auth_controller, profile_controller},
    models::CurrentUser,
    AppState,
};
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

fn user() -> CurrentUser {
    CurrentUser {
        id: ObjectId::new(),
        email: "holder@example.com".to_string(),
        telegram_id: None,
        telegram_verified: false,
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
async fn refresh_without_session_returns_401() {
    let state = test_state().await;
    let app = Router::new()
        .route("/api/auth/refresh", post(auth_controller::post_refresh))
        .with_state(state);

    let res = app.oneshot(form_request("/api/auth/refresh", "")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_issues_a_new_token_and_cookie() {
    let state = test_state().await;
    let secret = state.settings.jwt_secret.clone();
    let cookie_name = state.settings.jwt_cookie_name.clone();
    let u = user();
    let user_id = u.id;

    let app = Router::new()
        .route("/api/auth/refresh", post(auth_controller::post_refresh))
        .layer(Extension(u))
        .with_state(state);

    let res = app.oneshot(form_request("/api/auth/refresh", "")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let set_cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with(&format!("{cookie_name}=")));
    assert!(set_cookie.contains("HttpOnly"));

    let body: serde_json::Value = serde_json::from_str(&response_body_string(res).await).unwrap();
    assert_eq!(body["message"], "Token refreshed successfully");
    let token = body["token"].as_str().unwrap();
    assert_eq!(verify_token(token, &secret), Some(user_id));
}

#[tokio::test]
async fn update_email_without_user_returns_401() {
    let state = test_state().await;
    let app = Router::new()
        .route("/profile/email", post(profile_controller::post_update_email))
        .with_state(state);

    let res = app
        .oneshot(form_request("/profile/email", "email=new%40example.com"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_email_rejects_malformed_address() {
    let state = test_state().await;
    let app = Router::new()
        .route("/profile/email", post(profile_controller::post_update_email))
        .layer(Extension(user()))
        .with_state(state);

    let res = app
        .oneshot(form_request("/profile/email", "email=not-an-email"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = response_body_string(res).await;
    assert!(body.contains("Invalid email."));
    assert!(body.contains(r#"value="not-an-email""#));
    assert!(body.contains(r#"id="email-form""#));
}

#[tokio::test]
async fn update_email_requires_a_value() {
    let state = test_state().await;
    let app = Router::new()
        .route("/profile/email", post(profile_controller::post_update_email))
        .layer(Extension(user()))
        .with_state(state);

    let res = app.oneshot(form_request("/profile/email", "email=")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = response_body_string(res).await;
    assert!(body.contains("Email is required."));
}
