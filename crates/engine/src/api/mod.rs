//! Market data access
//!
//! The arena consumes market data through the [`MarketData`] trait so the
//! signal pool can run against the live Binance futures API or against
//! canned candles in tests.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Kline;

pub mod binance;

pub use binance::BinanceFuturesClient;

/// Read-only market data source
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch the most recent `limit` klines for a symbol/interval
    async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>>;

    /// Latest traded price for a symbol
    async fn get_price(&self, symbol: &str) -> Result<f64>;
}

#[cfg(test)]
pub mod mock {
    //! Canned market data for engine tests

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;

    use crate::types::Kline;

    use super::MarketData;

    /// Serves pre-loaded windows keyed by `symbol_interval`; counts fetches
    /// so cache behavior can be asserted.
    #[derive(Default)]
    pub struct FixedMarket {
        windows: Mutex<HashMap<String, Vec<Kline>>>,
        pub fetches: AtomicU32,
    }

    impl FixedMarket {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_window(&self, symbol: &str, interval: &str, klines: Vec<Kline>) {
            self.windows
                .lock()
                .unwrap()
                .insert(format!("{}_{}", symbol, interval), klines);
        }

        pub fn fetch_count(&self) -> u32 {
            self.fetches.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl MarketData for FixedMarket {
        async fn get_klines(&self, symbol: &str, interval: &str, _limit: u32) -> Result<Vec<Kline>> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            let map = self.windows.lock().unwrap();
            match map.get(&format!("{}_{}", symbol, interval)) {
                Some(klines) => Ok(klines.clone()),
                None => anyhow::bail!("no canned window for {} {}", symbol, interval),
            }
        }

        async fn get_price(&self, symbol: &str) -> Result<f64> {
            let map = self.windows.lock().unwrap();
            map.get(&format!("{}_1m", symbol))
                .and_then(|k| k.last())
                .map(|k| k.close)
                .ok_or_else(|| anyhow::anyhow!("no price for {}", symbol))
        }
    }
}
