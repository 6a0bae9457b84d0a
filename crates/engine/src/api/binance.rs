//! Binance USD-M futures public API client (no authentication required)

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::types::Kline;

use super::MarketData;

const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";
const MAX_KLINES_PER_REQUEST: u32 = 1000;

/// Binance futures market data client
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    base_url: String,
}

/// Raw kline data from the Binance API (array of arrays)
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    u64,    // 8: Number of trades
    String, // 9: Taker buy base
    String, // 10: Taker buy quote
    String, // 11: Ignore
);

/// Binance ticker price response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct TickerPrice {
    symbol: String,
    price: String,
}

impl Default for BinanceFuturesClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceFuturesClient {
    /// Create a new client against the public futures endpoint
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the base URL (test servers)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MarketData for BinanceFuturesClient {
    async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let limit = limit.min(MAX_KLINES_PER_REQUEST);
        let url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        debug!(symbol, interval, limit, "Fetching klines from Binance");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let raw_klines: Vec<RawKline> = response.json().await?;

        let klines: Vec<Kline> = raw_klines
            .into_iter()
            .filter_map(|raw| {
                Some(Kline {
                    open_time: raw.0,
                    open: raw.1.parse().ok()?,
                    high: raw.2.parse().ok()?,
                    low: raw.3.parse().ok()?,
                    close: raw.4.parse().ok()?,
                    volume: raw.5.parse().ok()?,
                    close_time: raw.6,
                })
            })
            .collect();

        debug!(count = klines.len(), "Fetched klines");
        Ok(klines)
    }

    async fn get_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/fapi/v1/ticker/price?symbol={}", self.base_url, symbol);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let ticker: TickerPrice = response.json().await?;
        Ok(ticker.price.parse()?)
    }
}
