//! Library entrypoint for CryptoWatch.
//!
//! The binary in `main.rs` is only the composition root; everything else lives
//! here so integration tests under `tests/` can build routers and state.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod format;
pub mod models;

// Kept at crate root: referenced as `crate::auth`, `crate::render`, `crate::templates`.
#[path = "middleware/auth.rs"]
pub mod auth;

pub mod services;

#[path = "views/render.rs"]
pub mod render;
#[path = "views/templates.rs"]
pub mod templates;

pub mod controllers;
pub mod routes;

use services::{
    alert_monitor::{AlertMonitor, MonitorConfig},
    alert_store::MongoAlertStore,
    coingecko::CoinGeckoClient,
    telegram::TelegramClient,
};

#[derive(Clone)]
pub struct AppState {
    pub hbs: templates::Hbs,
    pub db: mongodb::Database,
    pub settings: config::Settings,
    pub coingecko: CoinGeckoClient,
    pub telegram: TelegramClient,
    pub monitor: Arc<AlertMonitor>,
    pub events_tx: tokio::sync::broadcast::Sender<String>,
}

impl AppState {
    /// Wires clients, the alert store and the (not yet started) monitor.
    pub fn build(
        settings: config::Settings,
        db: mongodb::Database,
    ) -> Result<Self, handlebars::TemplateError> {
        let hbs = templates::build_handlebars()?;
        let (events_tx, _events_rx) = tokio::sync::broadcast::channel::<String>(64);

        let coingecko = CoinGeckoClient::new(
            settings.coingecko_api_url.clone(),
            settings.coingecko_api_key.clone(),
            settings.http_timeout,
        );
        let telegram = TelegramClient::new(
            settings.telegram_api_url.clone(),
            settings.telegram_bot_token.clone(),
            settings.http_timeout,
        );

        let monitor = AlertMonitor::new(
            Arc::new(coingecko.clone()),
            Arc::new(MongoAlertStore::new(db.clone())),
            Arc::new(telegram.clone()),
            MonitorConfig::from_settings(&settings),
        )
        .with_events(events_tx.clone());

        Ok(Self {
            hbs,
            db,
            settings,
            coingecko,
            telegram,
            monitor: Arc::new(monitor),
            events_tx,
        })
    }
}
