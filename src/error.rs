use thiserror::Error;

/// Failure of a batched quote request. Missing coins are not an error.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Transport(String),

    #[error("quote source returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed quote response: {0}")]
    Decode(String),

    #[error("quote request timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no verified chat id for user {0}")]
    NoChat(String),

    #[error("telegram: {0}")]
    Telegram(#[from] TelegramError),

    #[error("notification timed out")]
    Timeout,
}

impl NotifyError {
    pub fn is_permanent(&self) -> bool {
        match self {
            NotifyError::Telegram(e) => e.is_permanent(),
            NotifyError::NoChat(_) | NotifyError::Timeout => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alert {0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("TELEGRAM_BOT_TOKEN is not configured")]
    MissingToken,

    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("bot api error {status}: {description}")]
    Api { status: u16, description: String },
}

// Bot API urls embed the token; it must never reach a log line or a response.
impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        TelegramError::Transport(e.without_url())
    }
}

impl TelegramError {
    /// Rejections that will not go away by retrying: the chat is gone, the
    /// bot was blocked, or the request itself is bad.
    pub fn is_permanent(&self) -> bool {
        matches!(self, TelegramError::Api { status: 400 | 403, .. })
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("an alert check is already in progress")]
    CycleInProgress,

    #[error("loading active alerts failed: {0}")]
    Store(#[from] StoreError),

    #[error("fetching quotes failed: {0}")]
    Quotes(#[from] QuoteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> NotifyError {
        NotifyError::Telegram(TelegramError::Api {
            status,
            description: "x".into(),
        })
    }

    #[test]
    fn only_client_side_bot_rejections_are_permanent() {
        assert!(api(403).is_permanent());
        assert!(api(400).is_permanent());
        assert!(!api(429).is_permanent());
        assert!(!api(502).is_permanent());
        assert!(!NotifyError::Timeout.is_permanent());
        assert!(!NotifyError::NoChat("u".into()).is_permanent());
    }
}
