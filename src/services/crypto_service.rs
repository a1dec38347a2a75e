use serde_json::json;

use crate::{
    format,
    services::coingecko::{MarketChart, MarketCoin},
    AppState,
};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 250;

/// `page >= 1`, `1 <= limit <= 250`. Missing values take defaults.
pub fn parse_paging(page: Option<&str>, limit: Option<&str>) -> Result<(u32, u32), String> {
    let page = match page.map(str::trim).filter(|s| !s.is_empty()) {
        None => 1,
        Some(p) => p
            .parse::<u32>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| "page must be a positive integer".to_string())?,
    };

    let limit = match limit.map(str::trim).filter(|s| !s.is_empty()) {
        None => DEFAULT_LIMIT,
        Some(l) => l
            .parse::<u32>()
            .ok()
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .ok_or_else(|| format!("limit must be between 1 and {MAX_LIMIT}"))?,
    };

    Ok((page, limit))
}

fn opt_usd(v: Option<f64>) -> String {
    v.map(format::usd).unwrap_or_else(|| "—".to_string())
}

/// Template row for one market coin.
pub fn coin_row(c: &MarketCoin) -> serde_json::Value {
    let change = c.price_change_percentage_24h.unwrap_or(0.0);
    json!({
        "id": c.id,
        "name": c.name,
        "symbol": c.symbol.to_uppercase(),
        "symbol_raw": c.symbol,
        "image": c.image,
        "rank": c.market_cap_rank,
        "price": opt_usd(c.current_price),
        "price_raw": c.current_price,
        "change_24h": format::percentage(change),
        "is_up": change >= 0.0,
        "market_cap": c.market_cap.map(format::market_cap).unwrap_or_else(|| "—".to_string()),
        "volume": c.total_volume.map(format::market_cap).unwrap_or_else(|| "—".to_string()),
        "high_24h": opt_usd(c.high_24h),
        "low_24h": opt_usd(c.low_24h),
        "ath": opt_usd(c.ath),
        "atl": opt_usd(c.atl),
        "circulating_supply": c.circulating_supply.map(|s| format!("{s:.0}")),
        "max_supply": c.max_supply.map(|s| format!("{s:.0}")),
    })
}

/// Low / high / first / last over the chart's price series.
pub fn history_summary(chart: &MarketChart) -> Option<serde_json::Value> {
    let prices: Vec<f64> = chart
        .prices
        .iter()
        .map(|[_, p]| *p)
        .filter(|p| p.is_finite())
        .collect();

    let (&first, &last) = (prices.first()?, prices.last()?);
    let low = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let high = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let change = if first > 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };

    Some(json!({
        "low": format::usd(low),
        "high": format::usd(high),
        "open": format::usd(first),
        "close": format::usd(last),
        "change": format::percentage(change),
        "is_up": change >= 0.0,
        "points": prices.len(),
    }))
}

pub async fn coins_table_ctx(state: &AppState, page: u32, limit: u32) -> serde_json::Value {
    match state.coingecko.top_coins(limit, page).await {
        Ok(coins) => {
            let rows: Vec<_> = coins.iter().map(coin_row).collect();
            json!({
                "coins": if rows.is_empty() { serde_json::Value::Null } else { rows.into() },
                "page": page,
                "limit": limit,
                "prev_page": if page > 1 { json!(page - 1) } else { serde_json::Value::Null },
                "next_page": page + 1,
                "error": serde_json::Value::Null,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "loading top coins failed");
            json!({
                "coins": serde_json::Value::Null,
                "page": page,
                "limit": limit,
                "error": "Market data is unavailable right now.",
            })
        }
    }
}

pub async fn coin_details_ctx(state: &AppState, coin_id: &str) -> Option<serde_json::Value> {
    let coin = match state.coingecko.coin_by_id(coin_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(coin_id, error = %e, "loading coin failed");
            return Some(json!({
                "coin": serde_json::Value::Null,
                "error": "Market data is unavailable right now.",
            }));
        }
    };

    let history = match state.coingecko.price_history(&coin.id, 7).await {
        Ok(chart) => history_summary(&chart),
        Err(e) => {
            tracing::debug!(coin_id, error = %e, "price history unavailable");
            None
        }
    };

    Some(json!({
        "coin": coin_row(&coin),
        "history": history,
        "error": serde_json::Value::Null,
    }))
}

/// Context for the `partials/search_results` template.
pub async fn search_results_ctx(state: &AppState, query: &str) -> serde_json::Value {
    let q = query.trim().to_string();

    if q.is_empty() {
        return json!({
            "query": "",
            "results": serde_json::Value::Null,
            "error": serde_json::Value::Null
        });
    }

    match state.coingecko.search(&q).await {
        Ok(coins) => {
            let results: Vec<_> = coins
                .into_iter()
                .take(10)
                .map(|c| {
                    json!({
                        "id": c.id,
                        "name": c.name,
                        "symbol": c.symbol.to_uppercase(),
                        "symbol_raw": c.symbol,
                        "rank": c.market_cap_rank,
                        "thumb": c.thumb,
                    })
                })
                .collect();

            json!({
                "query": q,
                "results": if results.is_empty() { serde_json::Value::Null } else { results.into() },
                "error": serde_json::Value::Null
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "coin search failed");
            json!({
                "query": q,
                "results": serde_json::Value::Null,
                "error": "Search unavailable right now."
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_bounds() {
        assert_eq!(parse_paging(None, None), Ok((1, DEFAULT_LIMIT)));
        assert_eq!(parse_paging(Some("3"), Some("250")), Ok((3, 250)));
        assert!(parse_paging(Some("0"), None).is_err());
        assert!(parse_paging(None, Some("0")).is_err());
        assert!(parse_paging(None, Some("251")).is_err());
        assert!(parse_paging(Some("x"), None).is_err());
    }

    #[test]
    fn summary_of_price_series() {
        let chart = MarketChart {
            prices: vec![[0.0, 100.0], [1.0, 90.0], [2.0, 130.0], [3.0, 110.0]],
            market_caps: vec![],
            total_volumes: vec![],
        };
        let s = history_summary(&chart).unwrap();
        assert_eq!(s["low"], "$90.00");
        assert_eq!(s["high"], "$130.00");
        assert_eq!(s["change"], "+10.00%");
        assert_eq!(s["points"], 4);

        let empty = MarketChart {
            prices: vec![],
            market_caps: vec![],
            total_volumes: vec![],
        };
        assert!(history_summary(&empty).is_none());
    }

    #[test]
    fn row_formats_missing_values() {
        let coin: MarketCoin =
            serde_json::from_str(r#"{"id":"x","symbol":"xx","name":"X","current_price":null}"#)
                .unwrap();
        let row = coin_row(&coin);
        assert_eq!(row["symbol"], "XX");
        assert_eq!(row["price"], "—");
        assert_eq!(row["is_up"], true);
    }
}
