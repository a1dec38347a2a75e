use std::{fmt, str::FromStr};

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::format;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Price,
    Percentage,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::Price => "price",
            AlertType::Percentage => "percentage",
        }
    }
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price" => Ok(AlertType::Price),
            "percentage" => Ok(AlertType::Percentage),
            other => Err(format!("unknown alert type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Above,
    Below,
    Increase,
    Decrease,
}

impl Comparison {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Above => "above",
            Comparison::Below => "below",
            Comparison::Increase => "increase",
            Comparison::Decrease => "decrease",
        }
    }

    pub fn valid_for(self, kind: AlertType) -> bool {
        matches!(
            (kind, self),
            (AlertType::Price, Comparison::Above | Comparison::Below)
                | (AlertType::Percentage, Comparison::Increase | Comparison::Decrease)
        )
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "above" => Ok(Comparison::Above),
            "below" => Ok(Comparison::Below),
            "increase" => Ok(Comparison::Increase),
            "decrease" => Ok(Comparison::Decrease),
            other => Err(format!("unknown comparison: {other}")),
        }
    }
}

/// Stored alert document. The (type, comparison, target) triple is kept flat
/// for storage; use [`Alert::condition`] to get the checked form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: ObjectId,

    pub coin_id: String,
    pub coin_name: String,
    pub coin_symbol: String,

    pub alert_type: AlertType,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub percentage_change: Option<f64>,
    pub comparison: Comparison,

    pub is_active: bool,
    pub triggered: bool,
    #[serde(default)]
    pub triggered_at: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Alert {
    pub fn new(
        user_id: ObjectId,
        coin_id: &str,
        coin_name: &str,
        coin_symbol: &str,
        condition: AlertCondition,
        now: i64,
    ) -> Self {
        let (alert_type, comparison) = condition.kind();
        let (target_price, percentage_change) = match alert_type {
            AlertType::Price => (Some(condition.target()), None),
            AlertType::Percentage => (None, Some(condition.target())),
        };

        Self {
            id: ObjectId::new(),
            user_id,
            coin_id: coin_id.trim().to_lowercase(),
            coin_name: coin_name.trim().to_string(),
            coin_symbol: coin_symbol.trim().to_lowercase(),
            alert_type,
            target_price,
            percentage_change,
            comparison,
            is_active: true,
            triggered: false,
            triggered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `None` when the stored record breaks the one-target-per-kind rule.
    pub fn condition(&self) -> Option<AlertCondition> {
        let target = match (self.alert_type, self.target_price, self.percentage_change) {
            (AlertType::Price, Some(t), None) => t,
            (AlertType::Percentage, None, Some(t)) => t,
            _ => return None,
        };
        AlertCondition::new(self.alert_type, self.comparison, target).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertCondition {
    PriceAbove(f64),
    PriceBelow(f64),
    PercentIncrease(f64),
    PercentDecrease(f64),
}

impl AlertCondition {
    pub fn new(kind: AlertType, comparison: Comparison, target: f64) -> Result<Self, String> {
        if !target.is_finite() || target <= 0.0 {
            return Err("Target must be a positive number.".to_string());
        }

        match (kind, comparison) {
            (AlertType::Price, Comparison::Above) => Ok(AlertCondition::PriceAbove(target)),
            (AlertType::Price, Comparison::Below) => Ok(AlertCondition::PriceBelow(target)),
            (AlertType::Percentage, Comparison::Increase) => {
                Ok(AlertCondition::PercentIncrease(target))
            }
            (AlertType::Percentage, Comparison::Decrease) => {
                Ok(AlertCondition::PercentDecrease(target))
            }
            (kind, cmp) => Err(format!(
                "Condition \"{}\" is not valid for {} alerts.",
                cmp.as_str(),
                kind.as_str()
            )),
        }
    }

    pub fn kind(&self) -> (AlertType, Comparison) {
        match self {
            AlertCondition::PriceAbove(_) => (AlertType::Price, Comparison::Above),
            AlertCondition::PriceBelow(_) => (AlertType::Price, Comparison::Below),
            AlertCondition::PercentIncrease(_) => (AlertType::Percentage, Comparison::Increase),
            AlertCondition::PercentDecrease(_) => (AlertType::Percentage, Comparison::Decrease),
        }
    }

    pub fn target(&self) -> f64 {
        match *self {
            AlertCondition::PriceAbove(t)
            | AlertCondition::PriceBelow(t)
            | AlertCondition::PercentIncrease(t)
            | AlertCondition::PercentDecrease(t) => t,
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AlertCondition::PriceAbove(t) => write!(f, "Price above {}", format::usd(t)),
            AlertCondition::PriceBelow(t) => write!(f, "Price below {}", format::usd(t)),
            AlertCondition::PercentIncrease(t) => write!(f, "Increase of {t}%"),
            AlertCondition::PercentDecrease(t) => write!(f, "Decrease of {t}%"),
        }
    }
}

/// Notification details of an alert's owner, joined in by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertOwner {
    pub telegram_id: Option<String>,
    pub telegram_verified: bool,
}

impl AlertOwner {
    pub fn chat_id(&self) -> Option<&str> {
        match self.telegram_id.as_deref().map(str::trim) {
            Some(id) if self.telegram_verified && !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActiveAlert {
    pub alert: Alert,
    pub owner: AlertOwner,
}

/// Partial update applied by the store. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertUpdate {
    pub is_active: Option<bool>,
    pub triggered: Option<bool>,
}

impl AlertUpdate {
    /// Fired alerts are retired: triggered and no longer active.
    pub fn retire() -> Self {
        Self {
            is_active: Some(false),
            triggered: Some(true),
        }
    }

    pub fn set_active(active: bool) -> Self {
        Self {
            is_active: Some(active),
            triggered: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_rejects_mismatched_comparison() {
        assert!(AlertCondition::new(AlertType::Price, Comparison::Increase, 5.0).is_err());
        assert!(AlertCondition::new(AlertType::Percentage, Comparison::Above, 5.0).is_err());
    }

    #[test]
    fn condition_rejects_non_positive_targets() {
        assert!(AlertCondition::new(AlertType::Price, Comparison::Above, 0.0).is_err());
        assert!(AlertCondition::new(AlertType::Price, Comparison::Above, -3.0).is_err());
        assert!(AlertCondition::new(AlertType::Price, Comparison::Above, f64::NAN).is_err());
    }

    #[test]
    fn new_alert_populates_exactly_one_target() {
        let price = Alert::new(
            ObjectId::new(),
            "bitcoin",
            "Bitcoin",
            "BTC",
            AlertCondition::PriceAbove(50_000.0),
            1,
        );
        assert_eq!(price.target_price, Some(50_000.0));
        assert_eq!(price.percentage_change, None);
        assert_eq!(price.coin_symbol, "btc");
        assert!(price.is_active && !price.triggered);

        let pct = Alert::new(
            ObjectId::new(),
            "ethereum",
            "Ethereum",
            "eth",
            AlertCondition::PercentDecrease(7.5),
            1,
        );
        assert_eq!(pct.target_price, None);
        assert_eq!(pct.percentage_change, Some(7.5));
        assert_eq!(pct.condition(), Some(AlertCondition::PercentDecrease(7.5)));
    }

    #[test]
    fn broken_record_has_no_condition() {
        let mut a = Alert::new(
            ObjectId::new(),
            "bitcoin",
            "Bitcoin",
            "btc",
            AlertCondition::PriceBelow(10.0),
            1,
        );
        a.percentage_change = Some(3.0);
        assert_eq!(a.condition(), None);

        a.percentage_change = None;
        a.comparison = Comparison::Increase;
        assert_eq!(a.condition(), None);
    }

    #[test]
    fn comparison_round_trips_through_strings() {
        for c in [
            Comparison::Above,
            Comparison::Below,
            Comparison::Increase,
            Comparison::Decrease,
        ] {
            assert_eq!(c.as_str().parse::<Comparison>(), Ok(c));
        }
        assert!("sideways".parse::<Comparison>().is_err());
    }

    #[test]
    fn condition_display() {
        assert_eq!(
            AlertCondition::PriceAbove(50_000.0).to_string(),
            "Price above $50,000.00"
        );
        assert_eq!(AlertCondition::PercentIncrease(10.0).to_string(), "Increase of 10%");
    }
}
