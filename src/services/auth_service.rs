use std::collections::HashMap;

use axum_extra::extract::cookie::{Cookie, SameSite};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use mongodb::{
    bson::{doc, oid::ObjectId},
    error::{ErrorKind, WriteFailure},
};
use regex::Regex;

use crate::{models::User, AppState};

pub type FieldErrors = HashMap<String, String>;

pub const SESSION_DAYS: i64 = 7;

#[derive(serde::Serialize)]
struct Claims {
    sub: String,
    exp: usize,
}

pub fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

/// At least 8 characters with a lowercase letter, an uppercase letter and a digit.
/// Returns the message to show next to the field.
pub fn password_problem(password: &str) -> Option<&'static str> {
    if password.is_empty() {
        Some("Password is required.")
    } else if password.chars().count() < 8 {
        Some("Password must be at least 8 characters.")
    } else if !password.chars().any(|c| c.is_ascii_lowercase())
        || !password.chars().any(|c| c.is_ascii_uppercase())
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        Some("Password must contain a lowercase letter, an uppercase letter and a number.")
    } else {
        None
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `users.email` carries a unique index; a losing writer gets error 11000.
pub fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == 11000,
        _ => e.to_string().contains("E11000"),
    }
}

pub fn make_jwt_with_days(state: &AppState, user_id: &ObjectId, days: i64) -> Result<String, String> {
    let exp = (Utc::now() + Duration::days(days)).timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_hex(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.settings.jwt_secret.as_bytes()),
    )
    .map_err(|e| e.to_string())
}

pub fn auth_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(state.settings.jwt_cookie_name.clone(), token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    if state.settings.cookie_secure {
        cookie.set_secure(true);
    }
    cookie
}

pub fn clear_auth_cookie(state: &AppState) -> Cookie<'static> {
    let mut cookie = Cookie::new(state.settings.jwt_cookie_name.clone(), "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.make_removal();
    cookie
}

pub async fn login_user(state: &AppState, email: &str, password: &str) -> Result<User, FieldErrors> {
    let mut errs: FieldErrors = HashMap::new();

    let users = state.db.collection::<User>("users");

    let user = match users.find_one(doc! { "email": normalize_email(email) }, None).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            errs.insert("_form".into(), "Invalid email or password.".into());
            return Err(errs);
        }
        Err(e) => {
            tracing::error!(error = %e, "login lookup failed");
            errs.insert("_form".into(), "Server error. Please try again.".into());
            return Err(errs);
        }
    };

    if !verify(password, &user.password_hash).unwrap_or(false) {
        errs.insert("_form".into(), "Invalid email or password.".into());
        return Err(errs);
    }

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(user)
}

pub async fn register_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<ObjectId, FieldErrors> {
    let mut errs: FieldErrors = HashMap::new();
    let email = normalize_email(email);

    let users = state.db.collection::<User>("users");

    // unique email
    match users.find_one(doc! { "email": &email }, None).await {
        Ok(Some(_)) => {
            errs.insert("email".into(), "An account with this email already exists.".into());
            return Err(errs);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "register lookup failed");
            errs.insert("_form".into(), "There is a problem registering this user!".into());
            return Err(errs);
        }
    }

    let pw_hash = match hash(password, DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => {
            errs.insert("_form".into(), "There is a problem registering this user!".into());
            return Err(errs);
        }
    };

    let now = Utc::now().timestamp();
    let user = User {
        id: ObjectId::new(),
        email,
        password_hash: pw_hash,
        telegram_id: None,
        telegram_verified: false,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = users.insert_one(&user, None).await {
        // unique index race
        if is_duplicate_key(&e) {
            errs.insert("email".into(), "An account with this email already exists.".into());
        } else {
            tracing::error!(error = %e, "register insert failed");
            errs.insert("_form".into(), "There is a problem registering this user!".into());
        }
        return Err(errs);
    }

    tracing::info!(user_id = %user.id, "user registered");
    Ok(user.id)
}
