use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Database,
};

use crate::{
    error::StoreError,
    models::{ActiveAlert, Alert, AlertOwner, AlertUpdate, User},
    services::alert_monitor::AlertStore,
};

/// MongoDB-backed alert store used by the monitor.
#[derive(Clone)]
pub struct MongoAlertStore {
    db: Database,
}

impl MongoAlertStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

pub(crate) fn update_doc(update: AlertUpdate, now: i64) -> Document {
    let mut set = doc! { "updated_at": now };
    if let Some(active) = update.is_active {
        set.insert("is_active", active);
    }
    if let Some(triggered) = update.triggered {
        set.insert("triggered", triggered);
        if triggered {
            set.insert("triggered_at", now);
        }
    }
    doc! { "$set": set }
}

#[async_trait]
impl AlertStore for MongoAlertStore {
    async fn load_active(&self) -> Result<Vec<ActiveAlert>, StoreError> {
        let alerts_col = self.db.collection::<Alert>("alerts");

        let mut cursor = alerts_col
            .find(doc! { "is_active": true, "triggered": false }, None)
            .await?;

        let mut alerts: Vec<Alert> = Vec::new();
        while let Some(res) = cursor.next().await {
            match res {
                Ok(a) => alerts.push(a),
                // one malformed document must not hide the others
                Err(e) => tracing::warn!(error = %e, "skipping unreadable alert document"),
            }
        }

        if alerts.is_empty() {
            return Ok(Vec::new());
        }

        let mut owner_ids: Vec<ObjectId> = alerts.iter().map(|a| a.user_id).collect();
        owner_ids.sort();
        owner_ids.dedup();

        let users_col = self.db.collection::<User>("users");
        let mut cursor = users_col
            .find(
                doc! { "_id": { "$in": owner_ids }, "telegram_verified": true },
                None,
            )
            .await?;

        let mut owners: HashMap<ObjectId, AlertOwner> = HashMap::new();
        while let Some(res) = cursor.next().await {
            let u = res?;
            owners.insert(
                u.id,
                AlertOwner {
                    telegram_id: u.telegram_id,
                    telegram_verified: u.telegram_verified,
                },
            );
        }

        Ok(alerts
            .into_iter()
            .filter_map(|alert| {
                let owner = owners.get(&alert.user_id)?.clone();
                Some(ActiveAlert { alert, owner })
            })
            .collect())
    }

    async fn update(&self, alert_id: ObjectId, update: AlertUpdate) -> Result<Alert, StoreError> {
        let alerts_col = self.db.collection::<Alert>("alerts");
        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        alerts_col
            .find_one_and_update(
                doc! { "_id": alert_id },
                update_doc(update, Utc::now().timestamp()),
                opts,
            )
            .await?
            .ok_or_else(|| StoreError::NotFound(alert_id.to_hex()))
    }
}
