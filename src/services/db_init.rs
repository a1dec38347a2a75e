use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Database, IndexModel,
};

pub async fn ensure_indexes(db: &Database) -> Result<(), String> {
    // users: unique email
    {
        let col = db.collection::<Document>("users");
        let model = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        col.create_index(model, None)
            .await
            .map_err(|e| e.to_string())?;
    }

    // users: webhook /status looks users up by chat id
    {
        let col = db.collection::<Document>("users");
        let model = IndexModel::builder()
            .keys(doc! { "telegram_id": 1 })
            .options(IndexOptions::builder().sparse(true).build())
            .build();

        col.create_index(model, None)
            .await
            .map_err(|e| e.to_string())?;
    }

    // alerts: per-user listing, newest first
    {
        let col = db.collection::<Document>("alerts");
        let model = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1 })
            .build();

        col.create_index(model, None)
            .await
            .map_err(|e| e.to_string())?;
    }

    // alerts: monitor scan
    {
        let col = db.collection::<Document>("alerts");
        let model = IndexModel::builder()
            .keys(doc! { "is_active": 1, "triggered": 1 })
            .build();

        if let Err(e) = col.create_index(model, None).await {
            tracing::warn!(error = %e, "could not create alerts monitor index");
        }
    }

    Ok(())
}
