//! Core domain types shared across the arena

use serde::{Deserialize, Serialize};

/// A single candlestick (OHLCV)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

/// Column-ordered view over a kline window, oldest bar first.
///
/// Strategy functions index these arrays directly instead of walking
/// `Vec<Kline>` field by field.
#[derive(Debug, Clone, Default)]
pub struct CandleWindow {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    pub open_time: Vec<i64>,
}

impl CandleWindow {
    pub fn from_klines(klines: &[Kline]) -> Self {
        let mut w = CandleWindow {
            open: Vec::with_capacity(klines.len()),
            high: Vec::with_capacity(klines.len()),
            low: Vec::with_capacity(klines.len()),
            close: Vec::with_capacity(klines.len()),
            volume: Vec::with_capacity(klines.len()),
            open_time: Vec::with_capacity(klines.len()),
        };
        for k in klines {
            w.open.push(k.open);
            w.high.push(k.high);
            w.low.push(k.low);
            w.close.push(k.close);
            w.volume.push(k.volume);
            w.open_time.push(k.open_time);
        }
        w
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close.last().copied()
    }
}

/// Trade direction voted by a strategy or held by a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    /// Long <-> Short; Neutral maps to itself
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
            Direction::Neutral => Direction::Neutral,
        }
    }
}

/// Strategy family; the pool holds ten of each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyCategory {
    Trend,
    Momentum,
    Volatility,
}

/// What actually triggered a position close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    TrailingStop,
    SignalFlip,
}

/// Why a bot's session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    Bankrupt,
    GoalReached,
    EvolvedOut,
    Stopped,
}

impl SessionEnd {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionEnd::Bankrupt => "bankrupt",
            SessionEnd::GoalReached => "goal_reached",
            SessionEnd::EvolvedOut => "evolved_out",
            SessionEnd::Stopped => "stopped",
        }
    }
}

/// One strategy's vote for one symbol in one cycle.
///
/// Rebuilt from fresh candles every cycle, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy_id: String,
    pub category: StrategyCategory,
    pub direction: Direction,
    /// Conviction in [0, 100]
    pub strength: f64,
    pub symbol: String,
    pub timestamp: i64,
}

/// Aggregate counts over one symbol's full signal set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalSummary {
    pub long_count: u32,
    pub short_count: u32,
    pub neutral_count: u32,
    pub avg_long_strength: f64,
    pub avg_short_strength: f64,
}

/// Higher-timeframe bias from running the trend strategies on 5m candles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtfBias {
    pub direction: Direction,
    pub strength: f64,
    pub long_count: u32,
    pub short_count: u32,
}

impl Default for HtfBias {
    fn default() -> Self {
        Self {
            direction: Direction::Neutral,
            strength: 0.0,
            long_count: 0,
            short_count: 0,
        }
    }
}

/// Everything a bot needs to decide on one symbol for one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    /// Signals in pool order, one per registered strategy
    pub signals: Vec<StrategySignal>,
    pub summary: SignalSummary,
    /// ATR(14) on the 1m window, used for entry timing
    pub atr_primary: Option<f64>,
    /// ATR(14) on the 5m window, used for position sizing
    pub atr_confirm: Option<f64>,
    /// Latest close of the primary window
    pub price: f64,
    pub htf_bias: HtfBias,
    pub timestamp: i64,
}

impl MarketSnapshot {
    /// Sizing ATR with fallback to the primary timeframe
    pub fn sizing_atr(&self) -> Option<f64> {
        self.atr_confirm.or(self.atr_primary)
    }
}
