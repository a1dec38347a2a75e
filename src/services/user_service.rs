use bcrypt::verify;
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, Bson};

use crate::{
    models::{Alert, User},
    services::auth_service::{
        is_duplicate_key, is_valid_email, normalize_email, password_problem, FieldErrors,
    },
    AppState,
};

/// Telegram chat ids are integers (groups are negative).
pub fn normalize_chat_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    let digits = id.strip_prefix('-').unwrap_or(id);
    if digits.is_empty() || digits.len() > 20 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(id.to_string())
}

fn form_error(msg: impl Into<String>) -> FieldErrors {
    let mut errs = FieldErrors::new();
    errs.insert("_form".into(), msg.into());
    errs
}

pub async fn find_by_id(state: &AppState, user_id: ObjectId) -> Result<Option<User>, String> {
    state
        .db
        .collection::<User>("users")
        .find_one(doc! { "_id": user_id }, None)
        .await
        .map_err(|e| e.to_string())
}

pub async fn find_by_telegram_id(state: &AppState, chat_id: &str) -> Result<Option<User>, String> {
    state
        .db
        .collection::<User>("users")
        .find_one(doc! { "telegram_id": chat_id }, None)
        .await
        .map_err(|e| e.to_string())
}

/// Stores the chat id and marks it verified once the bot managed to message it.
/// An unreachable chat is still stored, unverified, so the user can retry.
pub async fn link_telegram(
    state: &AppState,
    user_id: ObjectId,
    raw_chat_id: &str,
) -> Result<bool, FieldErrors> {
    let Some(chat_id) = normalize_chat_id(raw_chat_id) else {
        let mut errs = FieldErrors::new();
        errs.insert("telegramId".into(), "Enter the numeric chat id the bot sent you.".into());
        return Err(errs);
    };

    if !state.telegram.is_configured() {
        return Err(form_error("Telegram bot is not configured on this server."));
    }

    let verified = state.telegram.verify_chat(&chat_id).await;

    let users = state.db.collection::<User>("users");
    if let Err(e) = users
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": {
                "telegram_id": &chat_id,
                "telegram_verified": verified,
                "updated_at": Utc::now().timestamp(),
            } },
            None,
        )
        .await
    {
        tracing::error!(user_id = %user_id, error = %e, "saving telegram link failed");
        return Err(form_error("Could not save your Telegram link. Please try again."));
    }

    tracing::info!(user_id = %user_id, chat_id = %chat_id, verified, "telegram chat linked");
    Ok(verified)
}

pub async fn unlink_telegram(state: &AppState, user_id: ObjectId) -> Result<(), String> {
    state
        .db
        .collection::<User>("users")
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": {
                "telegram_id": Bson::Null,
                "telegram_verified": false,
                "updated_at": Utc::now().timestamp(),
            } },
            None,
        )
        .await
        .map_err(|e| e.to_string())?;

    tracing::info!(user_id = %user_id, "telegram chat unlinked");
    Ok(())
}

fn email_taken() -> FieldErrors {
    let mut errs = FieldErrors::new();
    errs.insert("email".into(), "Email is already taken.".into());
    errs
}

/// Checks the shape of a new email; returns it normalized.
pub fn validate_email_change(raw: &str) -> Result<String, FieldErrors> {
    let email = raw.trim();
    let mut errs = FieldErrors::new();
    if email.is_empty() {
        errs.insert("email".into(), "Email is required.".into());
        return Err(errs);
    }
    if !is_valid_email(email) {
        errs.insert("email".into(), "Invalid email.".into());
        return Err(errs);
    }
    Ok(normalize_email(email))
}

/// Moves the account to a new email. Another account holding the address,
/// found up front or by the unique index, is a field error.
pub async fn update_email(
    state: &AppState,
    user_id: ObjectId,
    raw_email: &str,
) -> Result<String, FieldErrors> {
    let email = validate_email_change(raw_email)?;
    let users = state.db.collection::<User>("users");

    match users
        .find_one(doc! { "email": &email, "_id": { "$ne": user_id } }, None)
        .await
    {
        Ok(Some(_)) => return Err(email_taken()),
        Ok(None) => {}
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "email lookup failed");
            return Err(form_error("Could not update your email. Please try again."));
        }
    }

    match users
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "email": &email, "updated_at": Utc::now().timestamp() } },
            None,
        )
        .await
    {
        Ok(res) if res.matched_count == 0 => Err(form_error("User not found.")),
        Ok(_) => {
            tracing::info!(user_id = %user_id, "account email updated");
            Ok(email)
        }
        Err(e) if is_duplicate_key(&e) => Err(email_taken()),
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "email update failed");
            Err(form_error("Could not update your email. Please try again."))
        }
    }
}

pub async fn change_password(
    state: &AppState,
    user_id: ObjectId,
    current_password: &str,
    new_password: &str,
) -> Result<(), FieldErrors> {
    let mut errs = FieldErrors::new();

    if let Some(msg) = password_problem(new_password) {
        errs.insert("newPassword".into(), msg.into());
        return Err(errs);
    }

    let users = state.db.collection::<User>("users");

    let db_user = match users.find_one(doc! { "_id": user_id }, None).await {
        Ok(Some(u)) => u,
        _ => return Err(form_error("User not found.")),
    };

    if !verify(current_password, &db_user.password_hash).unwrap_or(false) {
        errs.insert("currentPassword".into(), "Current password is incorrect.".into());
        return Err(errs);
    }

    if current_password == new_password {
        errs.insert(
            "newPassword".into(),
            "New password must be different from your current password.".into(),
        );
        return Err(errs);
    }

    let pw_hash = match bcrypt::hash(new_password, bcrypt::DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => return Err(form_error("Failed to hash password.")),
    };

    if let Err(e) = users
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "password_hash": pw_hash, "updated_at": Utc::now().timestamp() } },
            None,
        )
        .await
    {
        return Err(form_error(format!("db error: {e}")));
    }

    Ok(())
}

/// Removes the user's alerts first so none can fire for a deleted account.
pub async fn delete_account(state: &AppState, user_id: ObjectId) -> Result<(), String> {
    let removed = state
        .db
        .collection::<Alert>("alerts")
        .delete_many(doc! { "user_id": user_id }, None)
        .await
        .map_err(|e| e.to_string())?;

    state
        .db
        .collection::<User>("users")
        .delete_one(doc! { "_id": user_id }, None)
        .await
        .map_err(|e| e.to_string())?;

    tracing::info!(user_id = %user_id, alerts = removed.deleted_count, "account deleted");
    let _ = state.events_tx.send("alertsUpdated".to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_ids_must_be_numeric() {
        assert_eq!(normalize_chat_id(" 123456 "), Some("123456".into()));
        assert_eq!(normalize_chat_id("-100200300"), Some("-100200300".into()));
        assert_eq!(normalize_chat_id(""), None);
        assert_eq!(normalize_chat_id("-"), None);
        assert_eq!(normalize_chat_id("@someone"), None);
        assert_eq!(normalize_chat_id("12 34"), None);
    }

    #[test]
    fn email_change_is_validated_and_normalized() {
        assert_eq!(validate_email_change("  New@Mail.IO "), Ok("new@mail.io".to_string()));
        assert_eq!(
            validate_email_change("   ").unwrap_err()["email"],
            "Email is required."
        );
        assert_eq!(
            validate_email_change("nobody@home").unwrap_err()["email"],
            "Invalid email."
        );
    }
}
