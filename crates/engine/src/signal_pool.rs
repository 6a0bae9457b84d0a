//! Per-symbol market snapshot generation with a TTL candle cache
//!
//! One snapshot per symbol per cycle: the full strategy pool evaluated on 1m
//! candles, ATR on both timeframes, and a higher-timeframe trend bias from
//! the 5m window. Candle windows are cached briefly so the two consumers of
//! the 5m data share one fetch.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::api::MarketData;
use crate::indicators;
use crate::strategies;
use crate::types::{
    CandleWindow, Direction, HtfBias, MarketSnapshot, SignalSummary, StrategyCategory,
    StrategySignal,
};

const KLINE_FETCH_LIMIT: u32 = 100;
/// Fewer bars than this counts as no data at all
const MIN_BARS: usize = 55;
const ATR_PERIOD: usize = 14;

const PRIMARY_INTERVAL: &str = "1m";
const CONFIRM_INTERVAL: &str = "5m";
const PRIMARY_TTL_MS: i64 = 5_000;
const CONFIRM_TTL_MS: i64 = 15_000;
const MAX_CACHE_ENTRIES: usize = 20;
const STALE_EVICT_MS: i64 = 30_000;

struct CacheEntry {
    window: Arc<CandleWindow>,
    fetched_at: i64,
}

/// Shared snapshot generator over a market data source
pub struct SignalPool {
    market: Arc<dyn MarketData>,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl SignalPool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self {
            market,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Candle window for one symbol/interval, served from cache within TTL
    async fn window(&self, symbol: &str, interval: &str) -> Result<Arc<CandleWindow>> {
        let key = format!("{}_{}", symbol, interval);
        let ttl = if interval == PRIMARY_INTERVAL {
            PRIMARY_TTL_MS
        } else {
            CONFIRM_TTL_MS
        };
        let now = Utc::now().timestamp_millis();

        {
            let cache = self.cache.read().unwrap();
            if let Some(entry) = cache.get(&key) {
                if now - entry.fetched_at < ttl {
                    debug!(key = %key, "Candle cache hit");
                    return Ok(entry.window.clone());
                }
            }
        }

        let klines = self
            .market
            .get_klines(symbol, interval, KLINE_FETCH_LIMIT)
            .await?;
        if klines.len() < MIN_BARS {
            anyhow::bail!(
                "insufficient candle history for {} {}: {} bars",
                symbol,
                interval,
                klines.len()
            );
        }

        let window = Arc::new(CandleWindow::from_klines(&klines));

        let mut cache = self.cache.write().unwrap();
        cache.insert(
            key,
            CacheEntry {
                window: window.clone(),
                fetched_at: now,
            },
        );
        // Bounded cache: drop entries past the hard staleness cutoff
        if cache.len() > MAX_CACHE_ENTRIES {
            cache.retain(|_, e| now - e.fetched_at <= STALE_EVICT_MS);
        }

        Ok(window)
    }

    /// Build the full snapshot for one symbol.
    ///
    /// A missing 1m window is an error (the caller skips the symbol for the
    /// cycle); a missing 5m window only degrades the confirmation fields.
    pub async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let primary = self.window(symbol, PRIMARY_INTERVAL).await?;

        let signals: Vec<StrategySignal> = strategies::registry()
            .iter()
            .map(|s| s.evaluate(&primary, symbol))
            .collect();

        let confirm = match self.window(symbol, CONFIRM_INTERVAL).await {
            Ok(w) => Some(w),
            Err(err) => {
                debug!(symbol, error = %err, "No 5m window, sizing falls back to 1m ATR");
                None
            }
        };

        let atr_primary = indicators::atr(&primary.high, &primary.low, &primary.close, ATR_PERIOD);
        let atr_confirm = confirm
            .as_ref()
            .and_then(|w| indicators::atr(&w.high, &w.low, &w.close, ATR_PERIOD));
        let htf_bias = confirm
            .as_ref()
            .map(|w| higher_tf_bias(w, symbol))
            .unwrap_or_default();

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            summary: summarize(&signals),
            signals,
            atr_primary,
            atr_confirm,
            price: primary.last_close().unwrap_or(0.0),
            htf_bias,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Number of live candle-cache entries
    pub fn cache_size(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    /// Snapshots for every symbol, fetched concurrently.
    /// Failed symbols are logged and skipped for this cycle.
    pub async fn snapshot_all(&self, symbols: &[String]) -> Vec<MarketSnapshot> {
        let futures = symbols.iter().map(|s| self.snapshot(s));
        let results = join_all(futures).await;

        let mut snapshots = Vec::with_capacity(symbols.len());
        for (symbol, result) in symbols.iter().zip(results) {
            match result {
                Ok(snap) => snapshots.push(snap),
                Err(err) => warn!(symbol = %symbol, error = %err, "Skipping symbol this cycle"),
            }
        }
        snapshots
    }
}

fn summarize(signals: &[StrategySignal]) -> SignalSummary {
    let mut summary = SignalSummary::default();
    let mut long_strength = 0.0;
    let mut short_strength = 0.0;
    for s in signals {
        match s.direction {
            Direction::Long => {
                summary.long_count += 1;
                long_strength += s.strength;
            }
            Direction::Short => {
                summary.short_count += 1;
                short_strength += s.strength;
            }
            Direction::Neutral => summary.neutral_count += 1,
        }
    }
    if summary.long_count > 0 {
        summary.avg_long_strength = long_strength / summary.long_count as f64;
    }
    if summary.short_count > 0 {
        summary.avg_short_strength = short_strength / summary.short_count as f64;
    }
    summary
}

/// Trend-strategy majority on the 5m window
fn higher_tf_bias(window: &CandleWindow, symbol: &str) -> HtfBias {
    let mut long_count = 0u32;
    let mut short_count = 0u32;
    let mut total_strength = 0.0;

    for s in strategies::registry()
        .iter()
        .filter(|s| s.category == StrategyCategory::Trend)
    {
        let sig = s.evaluate(window, symbol);
        match sig.direction {
            Direction::Long => {
                long_count += 1;
                total_strength += sig.strength;
            }
            Direction::Short => {
                short_count += 1;
                total_strength += sig.strength;
            }
            Direction::Neutral => {}
        }
    }

    let total = long_count + short_count;
    if total == 0 {
        return HtfBias::default();
    }
    let direction = if long_count > short_count {
        Direction::Long
    } else if short_count > long_count {
        Direction::Short
    } else {
        Direction::Neutral
    };
    HtfBias {
        direction,
        strength: (total_strength / total as f64).round(),
        long_count,
        short_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::FixedMarket;
    use crate::types::Kline;

    fn make_klines(n: usize, start: f64, step: f64) -> Vec<Kline> {
        (0..n)
            .map(|i| {
                let close = start + step * i as f64;
                Kline {
                    open_time: i as i64 * 60_000,
                    open: close - step,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 25.0,
                    close_time: (i as i64 + 1) * 60_000 - 1,
                }
            })
            .collect()
    }

    fn pool_with_symbol(symbol: &str) -> (Arc<FixedMarket>, SignalPool) {
        let market = Arc::new(FixedMarket::new());
        market.set_window(symbol, "1m", make_klines(100, 100.0, 0.5));
        market.set_window(symbol, "5m", make_klines(100, 100.0, 0.5));
        let pool = SignalPool::new(market.clone());
        (market, pool)
    }

    #[tokio::test]
    async fn test_snapshot_runs_full_pool() {
        let (_, pool) = pool_with_symbol("BTCUSDT");
        let snap = pool.snapshot("BTCUSDT").await.unwrap();

        assert_eq!(snap.signals.len(), strategies::STRATEGY_COUNT);
        assert_eq!(snap.symbol, "BTCUSDT");
        assert_eq!(snap.price, 100.0 + 0.5 * 99.0);
        assert!(snap.atr_primary.is_some());
        assert!(snap.atr_confirm.is_some());
        let counted =
            snap.summary.long_count + snap.summary.short_count + snap.summary.neutral_count;
        assert_eq!(counted as usize, strategies::STRATEGY_COUNT);
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_requests() {
        let (market, pool) = pool_with_symbol("BTCUSDT");

        pool.snapshot("BTCUSDT").await.unwrap();
        let after_first = market.fetch_count();
        assert_eq!(after_first, 2, "one fetch per timeframe");

        // Within TTL nothing refetches
        pool.snapshot("BTCUSDT").await.unwrap();
        assert_eq!(market.fetch_count(), after_first);
    }

    #[tokio::test]
    async fn test_short_history_is_rejected() {
        let market = Arc::new(FixedMarket::new());
        market.set_window("BTCUSDT", "1m", make_klines(30, 100.0, 0.5));
        let pool = SignalPool::new(market);

        assert!(pool.snapshot("BTCUSDT").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_confirm_window_degrades() {
        let market = Arc::new(FixedMarket::new());
        market.set_window("BTCUSDT", "1m", make_klines(100, 100.0, 0.5));
        let pool = SignalPool::new(market);

        let snap = pool.snapshot("BTCUSDT").await.unwrap();
        assert!(snap.atr_primary.is_some());
        assert!(snap.atr_confirm.is_none());
        assert_eq!(snap.htf_bias.direction, Direction::Neutral);
        assert_eq!(snap.htf_bias.long_count + snap.htf_bias.short_count, 0);
    }

    #[tokio::test]
    async fn test_snapshot_all_skips_failing_symbols() {
        let (_, pool) = pool_with_symbol("BTCUSDT");
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];

        let snaps = pool.snapshot_all(&symbols).await;
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn test_htf_bias_points_up_in_uptrend() {
        let (_, pool) = pool_with_symbol("BTCUSDT");
        let snap = pool.snapshot("BTCUSDT").await.unwrap();

        assert_eq!(snap.htf_bias.direction, Direction::Long);
        assert!(snap.htf_bias.strength > 30.0);
        assert!(snap.htf_bias.long_count >= 3);
    }
}
