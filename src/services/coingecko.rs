use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{error::QuoteError, services::alert_monitor::QuoteProvider};

#[derive(Clone)]
pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let req = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");

        if self.api_key.trim().is_empty() {
            req
        } else {
            req.header("x-cg-demo-api-key", self.api_key.trim())
        }
    }

    async fn read_json<T: DeserializeOwned>(res: Response, what: &str) -> Result<T, String> {
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("CoinGecko {what} failed: {status} {body}"));
        }

        res.json::<T>().await.map_err(|e| e.to_string())
    }

    /// Top coins by market cap.
    pub async fn top_coins(&self, limit: u32, page: u32) -> Result<Vec<MarketCoin>, String> {
        let per_page = limit.to_string();
        let page = page.to_string();

        let res = self
            .get("/coins/markets")
            .query(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Self::read_json(res, "markets").await
    }

    pub async fn coin_by_id(&self, coin_id: &str) -> Result<Option<MarketCoin>, String> {
        let res = self
            .get("/coins/markets")
            .query(&[
                ("vs_currency", "usd"),
                ("ids", coin_id),
                ("per_page", "1"),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let coins: Vec<MarketCoin> = Self::read_json(res, "coin").await?;
        Ok(coins.into_iter().next())
    }

    pub async fn price_history(&self, coin_id: &str, days: u32) -> Result<MarketChart, String> {
        let days = days.to_string();

        let res = self
            .get(&format!("/coins/{coin_id}/market_chart"))
            .query(&[("vs_currency", "usd"), ("days", days.as_str())])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Self::read_json(res, "market chart").await
    }

    pub async fn search(&self, q: &str) -> Result<Vec<SearchCoin>, String> {
        let res = self
            .get("/search")
            .query(&[("query", q)])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let body: SearchResponse = Self::read_json(res, "search").await?;
        Ok(body.coins)
    }

    /// `/simple/price` for many ids at once. Unknown ids are simply absent.
    pub async fn simple_prices(&self, ids: &[String]) -> Result<HashMap<String, f64>, QuoteError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let joined = ids.join(",");
        let res = self
            .get("/simple/price")
            .query(&[("ids", joined.as_str()), ("vs_currencies", "usd")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuoteError::Timeout
                } else {
                    QuoteError::Transport(e.to_string())
                }
            })?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(QuoteError::Status { status, body });
        }

        let body: HashMap<String, SimplePrice> = res
            .json()
            .await
            .map_err(|e| QuoteError::Decode(e.to_string()))?;

        Ok(usable_prices(body))
    }
}

#[async_trait]
impl QuoteProvider for CoinGeckoClient {
    async fn batch_get(&self, ids: &[String]) -> Result<HashMap<String, f64>, QuoteError> {
        self.simple_prices(ids).await
    }
}

fn usable_prices(body: HashMap<String, SimplePrice>) -> HashMap<String, f64> {
    body.into_iter()
        .filter_map(|(id, p)| match p.usd {
            Some(usd) if usd.is_finite() && usd > 0.0 => Some((id, usd)),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct SimplePrice {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub circulating_supply: Option<f64>,
    #[serde(default)]
    pub total_supply: Option<f64>,
    #[serde(default)]
    pub max_supply: Option<f64>,
    #[serde(default)]
    pub ath: Option<f64>,
    #[serde(default)]
    pub atl: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketChart {
    // [timestamp_ms, value]
    #[serde(default)]
    pub prices: Vec<[f64; 2]>,
    #[serde(default)]
    pub market_caps: Vec<[f64; 2]>,
    #[serde(default)]
    pub total_volumes: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub thumb: Option<String>,
}
