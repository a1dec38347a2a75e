use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::{
    error::{NotifyError, TelegramError},
    format,
    models::{Alert, AlertType},
    services::alert_monitor::Notifier,
};

/// Thin Bot API client: sendMessage, webhook management, getMe.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(api_url: String, token: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.trim().is_empty()
    }

    fn method_url(&self, method: &str) -> Result<String, TelegramError> {
        if !self.is_configured() {
            return Err(TelegramError::MissingToken);
        }
        Ok(format!("{}/bot{}/{}", self.api_url, self.token.trim(), method))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, TelegramError> {
        let url = self.method_url(method)?;

        let req = match body {
            Some(b) => self.http.post(&url).json(&b),
            None => self.http.get(&url),
        };

        let res = req.send().await?;
        let status = res.status();
        let parsed: ApiResponse<T> = res.json().await?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TelegramError::Api {
                status: status.as_u16(),
                description: description.unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TelegramError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let _: serde_json::Value = self.call("sendMessage", Some(body)).await?;
        tracing::debug!(chat_id, "telegram message sent");
        Ok(())
    }

    pub async fn send_welcome_message(&self, chat_id: &str) -> Result<(), TelegramError> {
        self.send_message(chat_id, &welcome_message(chat_id)).await
    }

    /// Sends a short confirmation; `false` means the user has not started the bot
    /// (or the id is wrong).
    pub async fn verify_chat(&self, chat_id: &str) -> bool {
        match self
            .send_message(chat_id, "✅ <b>CryptoWatch</b> bot verification successful!")
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "telegram chat verification failed");
                false
            }
        }
    }

    pub async fn set_webhook(
        &self,
        url: &str,
        secret: Option<&str>,
    ) -> Result<serde_json::Value, TelegramError> {
        let mut body = json!({ "url": url, "allowed_updates": ["message"] });
        if let Some(s) = secret.filter(|s| !s.is_empty()) {
            body["secret_token"] = json!(s);
        }
        self.call("setWebhook", Some(body)).await
    }

    pub async fn get_me(&self) -> Result<serde_json::Value, TelegramError> {
        self.call("getMe", None).await
    }

    pub async fn get_webhook_info(&self) -> Result<serde_json::Value, TelegramError> {
        self.call("getWebhookInfo", None).await
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_alert_message(
        &self,
        chat_id: &str,
        alert: &Alert,
        current_price: f64,
    ) -> Result<(), NotifyError> {
        let text = alert_message(alert, current_price, Utc::now());
        self.send_message(chat_id, &text).await?;
        Ok(())
    }
}

pub fn alert_message(alert: &Alert, current_price: f64, at: DateTime<Utc>) -> String {
    let emoji = match alert.alert_type {
        AlertType::Price => "💰",
        AlertType::Percentage => "📊",
    };
    let name = format::escape_html(&alert.coin_name);
    let symbol = format::escape_html(&alert.coin_symbol.to_uppercase());

    let mut msg = format!("{emoji} <b>Price Alert Triggered!</b>\n\n");
    msg += &format!("🪙 <b>Coin:</b> {name} ({symbol})\n");
    msg += &format!("💵 <b>Current Price:</b> {}\n", format::usd(current_price));

    match alert.alert_type {
        AlertType::Price => {
            if let Some(t) = alert.target_price {
                msg += &format!("🎯 <b>Target Price:</b> {}\n", format::usd(t));
            }
        }
        AlertType::Percentage => {
            if let Some(p) = alert.percentage_change {
                msg += &format!("🎯 <b>Target Change:</b> {}%\n", p.abs());
            }
        }
    }

    if let Some(cond) = alert.condition() {
        msg += &format!("📈 <b>Condition:</b> {cond}\n");
    }

    msg += &format!("\n⏰ <b>Time:</b> {}\n", at.format("%Y-%m-%d %H:%M:%S UTC"));
    msg += "\n💡 <i>Manage your alerts on the CryptoWatch dashboard</i>";
    msg
}

pub fn welcome_message(chat_id: &str) -> String {
    format!(
        "🎉 <b>Welcome to CryptoWatch Bot!</b>\n\n\
         🆔 Your chat id is <code>{chat_id}</code>. Paste it on your CryptoWatch profile page to connect this chat.\n\n\
         📱 You will receive price alerts here when your conditions are met.\n\n\
         Send /help to see what I can do."
    )
}

pub fn help_message() -> String {
    "🤖 <b>CryptoWatch Bot</b>\n\n\
     /start - show your chat id and connect instructions\n\
     /help - show this help\n\
     /status - linked account and active alerts"
        .to_string()
}

/// Reply to `/status`; `account` is the linked email and active alert count.
pub fn status_message(account: Option<(&str, u64)>) -> String {
    match account {
        Some((email, active)) => format!(
            "📋 <b>Account status</b>\n\n\
             👤 Linked account: {}\n\
             🔔 Active alerts: {active}",
            format::escape_html(email)
        ),
        None => "❓ This chat is not linked to a CryptoWatch account yet.\n\n\
                 Send /start to get your chat id and paste it on your profile page."
            .to_string(),
    }
}

pub fn fallback_message() -> String {
    "🤔 I only understand commands. Send /help to see the list.".to_string()
}

// ---------------- Webhook payloads ----------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TgUser>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
}

/// Bot commands understood by the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    Other,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        // "/start@SomeBot payload" => "/start"
        let head = text
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("");

        match head {
            "/start" => Command::Start,
            "/help" => Command::Help,
            "/status" => Command::Status,
            _ => Command::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use mongodb::bson::oid::ObjectId;

    use super::*;
    use crate::models::AlertCondition;

    fn alert(condition: AlertCondition) -> Alert {
        Alert::new(ObjectId::new(), "bitcoin", "Bitcoin <Core>", "btc", condition, 0)
    }

    #[test]
    fn price_alert_message_contains_coin_price_condition_and_time() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let msg = alert_message(&alert(AlertCondition::PriceAbove(50_000.0)), 50_500.0, at);

        assert!(msg.contains("Bitcoin &lt;Core&gt; (BTC)"));
        assert!(msg.contains("$50,500.00"));
        assert!(msg.contains("<b>Target Price:</b> $50,000.00"));
        assert!(msg.contains("Price above $50,000.00"));
        assert!(msg.contains("2026-01-02 03:04:05 UTC"));
        assert!(msg.starts_with("💰"));
    }

    #[test]
    fn percentage_alert_message_mentions_change() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let msg = alert_message(&alert(AlertCondition::PercentDecrease(10.0)), 85.0, at);

        assert!(msg.starts_with("📊"));
        assert!(msg.contains("<b>Target Change:</b> 10%"));
        assert!(msg.contains("Decrease of 10%"));
    }

    #[test]
    fn commands_are_parsed_with_bot_suffix_and_payload() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("/start@CryptoWatchBot abc"), Command::Start);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/status now"), Command::Status);
        assert_eq!(Command::parse("hello"), Command::Other);
        assert_eq!(Command::parse(""), Command::Other);
    }

    #[test]
    fn status_message_for_linked_and_unknown_chats() {
        let linked = status_message(Some(("a&b@c.io", 3)));
        assert!(linked.contains("a&amp;b@c.io"));
        assert!(linked.contains("Active alerts: 3"));

        assert!(status_message(None).contains("not linked"));
    }

    #[test]
    fn unconfigured_client_refuses_calls() {
        let client = TelegramClient::new(
            "https://api.telegram.org".into(),
            String::new(),
            Duration::from_secs(1),
        );
        assert!(!client.is_configured());
        assert!(matches!(
            client.method_url("getMe"),
            Err(TelegramError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn transport_errors_do_not_expose_the_bot_token() {
        // nothing listens on the discard port, so the request fails to connect
        let client = TelegramClient::new(
            "http://127.0.0.1:9".into(),
            "123456:SECRET_BOT_TOKEN".into(),
            Duration::from_secs(2),
        );

        let err = client.send_message("42", "hi").await.unwrap_err();
        assert!(matches!(err, TelegramError::Transport(_)));
        assert!(!err.to_string().contains("SECRET_BOT_TOKEN"));
        assert!(!format!("{err:?}").contains("SECRET_BOT_TOKEN"));

        let notify = NotifyError::from(err);
        assert!(!notify.to_string().contains("SECRET_BOT_TOKEN"));
    }

    #[test]
    fn update_payload_parses() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":1,"message":{"message_id":2,"from":{"id":7,"is_bot":false,"first_name":"Ann"},"chat":{"id":7,"type":"private"},"date":0,"text":"/start"}}"#,
        )
        .unwrap();
        let msg = update.message.unwrap();
        assert_eq!(msg.chat.id, 7);
        assert_eq!(msg.text.as_deref(), Some("/start"));
    }
}
