use chrono::Utc;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};

use crate::{
    models::{Alert, AlertCondition, AlertType, AlertUpdate, Comparison, CurrentUser},
    services::{alert_store::update_doc, auth_service::FieldErrors},
    AppState,
};

/// Raw create-alert input as it comes off the form.
#[derive(Debug, Clone, Default)]
pub struct NewAlertInput {
    pub coin_id: String,
    pub coin_name: String,
    pub coin_symbol: String,
    pub alert_type: String,
    pub comparison: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidAlert {
    pub coin_id: String,
    pub coin_name: String,
    pub coin_symbol: String,
    pub condition: AlertCondition,
}

pub fn validate_new_alert(input: &NewAlertInput) -> Result<ValidAlert, FieldErrors> {
    let mut errs = FieldErrors::new();

    let coin_id = input.coin_id.trim();
    let coin_name = input.coin_name.trim();
    let coin_symbol = input.coin_symbol.trim();

    if coin_id.is_empty() || coin_name.is_empty() || coin_symbol.is_empty() {
        errs.insert("coin".into(), "Please choose a coin.".into());
    }

    let kind = input.alert_type.parse::<AlertType>();
    if kind.is_err() {
        errs.insert("alertType".into(), "Please choose an alert type.".into());
    }

    let comparison = input.comparison.parse::<Comparison>();
    if comparison.is_err() {
        errs.insert("comparison".into(), "Please choose a condition.".into());
    }

    let target = input.target.trim().parse::<f64>().ok();
    if !matches!(target, Some(t) if t.is_finite() && t > 0.0) {
        errs.insert("target".into(), "Please enter a positive number.".into());
    }

    if !errs.is_empty() {
        return Err(errs);
    }

    let (Ok(kind), Ok(comparison), Some(target)) = (kind, comparison, target) else {
        return Err(errs);
    };

    let condition = match AlertCondition::new(kind, comparison, target) {
        Ok(c) => c,
        Err(msg) => {
            errs.insert("comparison".into(), msg);
            return Err(errs);
        }
    };

    Ok(ValidAlert {
        coin_id: coin_id.to_string(),
        coin_name: coin_name.to_string(),
        coin_symbol: coin_symbol.to_string(),
        condition,
    })
}

pub async fn list_user_alerts(state: &AppState, user_id: ObjectId) -> Result<Vec<Alert>, String> {
    let alerts = state.db.collection::<Alert>("alerts");
    let find_opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

    let mut cursor = alerts
        .find(doc! { "user_id": user_id }, find_opts)
        .await
        .map_err(|e| e.to_string())?;

    let mut items: Vec<Alert> = Vec::new();
    while let Some(res) = cursor.next().await {
        items.push(res.map_err(|e| e.to_string())?);
    }

    Ok(items)
}

pub async fn count_active_alerts(state: &AppState, user_id: ObjectId) -> Result<u64, String> {
    state
        .db
        .collection::<Alert>("alerts")
        .count_documents(
            doc! { "user_id": user_id, "is_active": true, "triggered": false },
            None,
        )
        .await
        .map_err(|e| e.to_string())
}

/// Alerts can only be created by users whose Telegram chat is linked and verified.
pub async fn create_alert(
    state: &AppState,
    user: &CurrentUser,
    input: &NewAlertInput,
) -> Result<Alert, FieldErrors> {
    if !user.telegram_verified {
        let mut errs = FieldErrors::new();
        errs.insert(
            "_form".into(),
            "Link and verify your Telegram account on the profile page before creating alerts."
                .into(),
        );
        return Err(errs);
    }

    let valid = validate_new_alert(input)?;

    let alert = Alert::new(
        user.id,
        &valid.coin_id,
        &valid.coin_name,
        &valid.coin_symbol,
        valid.condition,
        Utc::now().timestamp(),
    );

    if let Err(e) = state.db.collection::<Alert>("alerts").insert_one(&alert, None).await {
        tracing::error!(error = %e, "alert insert failed");
        let mut errs = FieldErrors::new();
        errs.insert("_form".into(), "Could not save the alert. Please try again.".into());
        return Err(errs);
    }

    tracing::info!(
        alert_id = %alert.id,
        user_id = %user.id,
        coin_id = %alert.coin_id,
        condition = %valid.condition,
        "alert created"
    );

    let _ = state.events_tx.send("alertsUpdated".to_string());

    Ok(alert)
}

/// Flips `is_active`. Triggered alerts stay retired.
pub async fn toggle_alert(
    state: &AppState,
    user_id: ObjectId,
    alert_id: ObjectId,
) -> Result<Alert, String> {
    let alerts = state.db.collection::<Alert>("alerts");

    let current = alerts
        .find_one(doc! { "_id": alert_id, "user_id": user_id }, None)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "Alert not found.".to_string())?;

    if current.triggered {
        return Err("Triggered alerts cannot be re-activated.".to_string());
    }

    let opts = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let updated = alerts
        .find_one_and_update(
            doc! { "_id": alert_id, "user_id": user_id, "triggered": false },
            update_doc(
                AlertUpdate::set_active(!current.is_active),
                Utc::now().timestamp(),
            ),
            opts,
        )
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "Triggered alerts cannot be re-activated.".to_string())?;

    let _ = state.events_tx.send("alertsUpdated".to_string());

    Ok(updated)
}

/// Returns false if nothing matched (not found or not owned).
pub async fn delete_alert(
    state: &AppState,
    user_id: ObjectId,
    alert_id: ObjectId,
) -> Result<bool, String> {
    let res = state
        .db
        .collection::<Alert>("alerts")
        .delete_one(doc! { "_id": alert_id, "user_id": user_id }, None)
        .await
        .map_err(|e| e.to_string())?;

    let _ = state.events_tx.send("alertsUpdated".to_string());

    Ok(res.deleted_count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(kind: &str, cmp: &str, target: &str) -> NewAlertInput {
        NewAlertInput {
            coin_id: "bitcoin".into(),
            coin_name: "Bitcoin".into(),
            coin_symbol: "btc".into(),
            alert_type: kind.into(),
            comparison: cmp.into(),
            target: target.into(),
        }
    }

    #[test]
    fn valid_price_alert() {
        let v = validate_new_alert(&input("price", "above", "50000")).unwrap();
        assert_eq!(v.condition, AlertCondition::PriceAbove(50_000.0));
        assert_eq!(v.coin_id, "bitcoin");
    }

    #[test]
    fn valid_percentage_alert() {
        let v = validate_new_alert(&input("percentage", "decrease", " 7.5 ")).unwrap();
        assert_eq!(v.condition, AlertCondition::PercentDecrease(7.5));
    }

    #[test]
    fn mismatched_pair_is_rejected() {
        let errs = validate_new_alert(&input("price", "increase", "10")).unwrap_err();
        assert!(errs["comparison"].contains("not valid for price alerts"));
    }

    #[test]
    fn bad_target_and_missing_coin_are_reported_together() {
        let mut i = input("price", "below", "-5");
        i.coin_id.clear();
        let errs = validate_new_alert(&i).unwrap_err();
        assert!(errs.contains_key("coin"));
        assert!(errs.contains_key("target"));

        let errs = validate_new_alert(&input("price", "below", "abc")).unwrap_err();
        assert!(errs.contains_key("target"));
        let errs = validate_new_alert(&input("price", "below", "NaN")).unwrap_err();
        assert!(errs.contains_key("target"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let errs = validate_new_alert(&input("volume", "above", "1")).unwrap_err();
        assert!(errs.contains_key("alertType"));
    }
}
