use std::{env, time::Duration};

use crate::services::alert_monitor::NotifyFailurePolicy;

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub host: String,
    pub port: u16,

    pub jwt_secret: String,
    pub jwt_cookie_name: String,
    pub cookie_secure: bool,

    pub coingecko_api_url: String,
    // optional demo/pro key, sent as a header when present
    pub coingecko_api_key: String,

    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub telegram_webhook_secret: String,

    // empty => admin endpoints are refused
    pub admin_token: String,

    pub alert_check_interval: Duration,
    pub http_timeout: Duration,
    pub alert_monitor_autostart: bool,
    pub notify_failure_policy: NotifyFailurePolicy,
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    from_lookup(|key| env::var(key).ok())
}

/// Builds settings from any key lookup. `load()` feeds it the process env.
pub fn from_lookup<F>(lookup: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let string_or = |key: &str, default: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let flag_or = |key: &str, default: bool| {
        lookup(key)
            .and_then(|v| parse_flag(&v))
            .unwrap_or(default)
    };

    let secs_or = |key: &str, default: u64| {
        let secs = lookup(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(default);
        Duration::from_secs(secs)
    };

    let port = lookup("PORT")
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or(3000);

    let notify_failure_policy = lookup("ALERT_NOTIFY_FAILURE")
        .and_then(|v| v.parse::<NotifyFailurePolicy>().ok())
        .unwrap_or_default();

    Settings {
        mongodb_uri: string_or("MONGODB_URI", "mongodb://localhost:27017"),
        mongodb_db: string_or("MONGODB_DB", "cryptowatch"),
        host: string_or("HOST", "127.0.0.1"),
        port,
        jwt_secret: string_or("JWT_SECRET", "change-me-dev-secret"),
        jwt_cookie_name: string_or("JWT_COOKIE_NAME", "auth"),
        cookie_secure: flag_or("COOKIE_SECURE", false),
        coingecko_api_url: string_or("COINGECKO_API_URL", "https://api.coingecko.com/api/v3"),
        coingecko_api_key: string_or("COINGECKO_API_KEY", ""),
        telegram_bot_token: string_or("TELEGRAM_BOT_TOKEN", ""),
        telegram_api_url: string_or("TELEGRAM_API_URL", "https://api.telegram.org"),
        telegram_webhook_secret: string_or("TELEGRAM_WEBHOOK_SECRET", ""),
        admin_token: string_or("ADMIN_TOKEN", ""),
        alert_check_interval: secs_or("ALERT_CHECK_INTERVAL_SECS", 60),
        http_timeout: secs_or("HTTP_TIMEOUT_SECS", 10),
        alert_monitor_autostart: flag_or("ALERT_MONITOR_AUTOSTART", true),
        notify_failure_policy,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
