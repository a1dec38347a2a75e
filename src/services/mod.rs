pub mod coingecko;
pub mod telegram;
pub mod db_init;
pub mod alert_monitor;
pub mod alert_store;

pub mod auth_service;
pub mod alerts_service;
pub mod user_service;
pub mod crypto_service;
