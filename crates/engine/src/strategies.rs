//! The fixed 30-strategy signal pool
//!
//! Ten trend followers, ten momentum oscillators, ten volatility/volume
//! readers. The pool never changes: strategies are evaluated by registry
//! index, and genome mask/weight arrays line up with those indices. Bots
//! evolve WHICH strategies to listen to and how to weigh them, never the
//! strategies themselves.

use chrono::Utc;

use crate::indicators;
use crate::types::{CandleWindow, Direction, StrategyCategory, StrategySignal};

/// Pool size; genome mask and weight arrays share this length
pub const STRATEGY_COUNT: usize = 30;

type EvalFn = fn(&CandleWindow) -> Option<(Direction, f64)>;

/// One fixed pool entry
pub struct Strategy {
    pub id: &'static str,
    pub name: &'static str,
    pub category: StrategyCategory,
    eval: EvalFn,
}

impl Strategy {
    /// Run this strategy against a window, producing a clamped signal.
    /// Insufficient data degrades to a zero-strength neutral vote.
    pub fn evaluate(&self, window: &CandleWindow, symbol: &str) -> StrategySignal {
        let (direction, strength) = (self.eval)(window).unwrap_or((Direction::Neutral, 0.0));
        StrategySignal {
            strategy_id: self.id.to_string(),
            category: self.category,
            direction,
            strength: strength.clamp(0.0, 100.0).round(),
            symbol: symbol.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// The ordered registry; index positions are stable across the process
pub fn registry() -> &'static [Strategy; STRATEGY_COUNT] {
    &POOL
}

/// Ids of the strategies a mask enables, in pool order
pub fn active_ids(mask: &[bool]) -> Vec<String> {
    POOL.iter()
        .zip(mask)
        .filter(|(_, &enabled)| enabled)
        .map(|(s, _)| s.id.to_string())
        .collect()
}

static POOL: [Strategy; STRATEGY_COUNT] = [
    // ------------------------------------------------------------------------
    // Trend (0-9)
    // ------------------------------------------------------------------------
    Strategy {
        id: "ema_cross_9_21",
        name: "EMA Cross 9/21",
        category: StrategyCategory::Trend,
        eval: ema_cross_9_21,
    },
    Strategy {
        id: "ema_cross_12_26",
        name: "EMA Cross 12/26",
        category: StrategyCategory::Trend,
        eval: ema_cross_12_26,
    },
    Strategy {
        id: "ema_triple_9_21_55",
        name: "EMA Triple 9/21/55",
        category: StrategyCategory::Trend,
        eval: ema_triple,
    },
    Strategy {
        id: "macd_standard",
        name: "MACD 12/26/9",
        category: StrategyCategory::Trend,
        eval: macd_standard,
    },
    Strategy {
        id: "macd_fast",
        name: "MACD Fast 5/13/6",
        category: StrategyCategory::Trend,
        eval: macd_fast,
    },
    Strategy {
        id: "adx_trend",
        name: "ADX Trend",
        category: StrategyCategory::Trend,
        eval: adx_trend,
    },
    Strategy {
        id: "parabolic_sar",
        name: "Parabolic SAR",
        category: StrategyCategory::Trend,
        eval: parabolic_sar,
    },
    Strategy {
        id: "supertrend",
        name: "SuperTrend",
        category: StrategyCategory::Trend,
        eval: supertrend,
    },
    Strategy {
        id: "ichimoku",
        name: "Ichimoku Cloud",
        category: StrategyCategory::Trend,
        eval: ichimoku,
    },
    Strategy {
        id: "aroon",
        name: "Aroon 25",
        category: StrategyCategory::Trend,
        eval: aroon_25,
    },
    // ------------------------------------------------------------------------
    // Momentum (10-19)
    // ------------------------------------------------------------------------
    Strategy {
        id: "rsi_14",
        name: "RSI Classic 14",
        category: StrategyCategory::Momentum,
        eval: rsi_14,
    },
    Strategy {
        id: "rsi_7",
        name: "RSI Fast 7",
        category: StrategyCategory::Momentum,
        eval: rsi_7,
    },
    Strategy {
        id: "stochastic_14",
        name: "Stochastic 14/3",
        category: StrategyCategory::Momentum,
        eval: stochastic_14,
    },
    Strategy {
        id: "williams_r",
        name: "Williams %R 14",
        category: StrategyCategory::Momentum,
        eval: williams_r_14,
    },
    Strategy {
        id: "cci_20",
        name: "CCI 20",
        category: StrategyCategory::Momentum,
        eval: cci_20,
    },
    Strategy {
        id: "roc_12",
        name: "ROC 12",
        category: StrategyCategory::Momentum,
        eval: roc_12,
    },
    Strategy {
        id: "momentum_10",
        name: "Momentum 10",
        category: StrategyCategory::Momentum,
        eval: momentum_10,
    },
    Strategy {
        id: "trix_15",
        name: "TRIX 15",
        category: StrategyCategory::Momentum,
        eval: trix_15,
    },
    Strategy {
        id: "elder_ray",
        name: "Elder Ray",
        category: StrategyCategory::Momentum,
        eval: elder_ray,
    },
    Strategy {
        id: "mfi_14",
        name: "MFI 14",
        category: StrategyCategory::Momentum,
        eval: mfi_14,
    },
    // ------------------------------------------------------------------------
    // Volatility / volume (20-29)
    // ------------------------------------------------------------------------
    Strategy {
        id: "bollinger_20_2",
        name: "Bollinger 20/2",
        category: StrategyCategory::Volatility,
        eval: bollinger_20_2,
    },
    Strategy {
        id: "bollinger_10_15",
        name: "Bollinger 10/1.5",
        category: StrategyCategory::Volatility,
        eval: bollinger_10_15,
    },
    Strategy {
        id: "keltner",
        name: "Keltner Channels",
        category: StrategyCategory::Volatility,
        eval: keltner,
    },
    Strategy {
        id: "atr_breakout",
        name: "ATR Breakout",
        category: StrategyCategory::Volatility,
        eval: atr_breakout,
    },
    Strategy {
        id: "obv_trend",
        name: "OBV Trend",
        category: StrategyCategory::Volatility,
        eval: obv_trend,
    },
    Strategy {
        id: "vwap_dev",
        name: "VWAP Deviation",
        category: StrategyCategory::Volatility,
        eval: vwap_dev,
    },
    Strategy {
        id: "cmf_20",
        name: "CMF 20",
        category: StrategyCategory::Volatility,
        eval: cmf_20,
    },
    Strategy {
        id: "volume_spike",
        name: "Volume Spike 2x",
        category: StrategyCategory::Volatility,
        eval: volume_spike,
    },
    Strategy {
        id: "mass_index",
        name: "Mass Index",
        category: StrategyCategory::Volatility,
        eval: mass_index,
    },
    Strategy {
        id: "dpo",
        name: "DPO 20",
        category: StrategyCategory::Volatility,
        eval: dpo_20,
    },
];

// ============================================================================
// Trend
// ============================================================================

fn ema_cross_9_21(w: &CandleWindow) -> Option<(Direction, f64)> {
    let fast = indicators::ema(&w.close, 9)?;
    let slow = indicators::ema(&w.close, 21)?;
    let diff = (fast - slow) / slow * 100.0;
    Some(if diff > 0.02 {
        (Direction::Long, (diff * 500.0).clamp(30.0, 95.0))
    } else if diff < -0.02 {
        (Direction::Short, (diff.abs() * 500.0).clamp(30.0, 95.0))
    } else {
        (Direction::Neutral, 20.0)
    })
}

fn ema_cross_12_26(w: &CandleWindow) -> Option<(Direction, f64)> {
    let fast = indicators::ema(&w.close, 12)?;
    let slow = indicators::ema(&w.close, 26)?;
    let diff = (fast - slow) / slow * 100.0;
    Some(if diff > 0.015 {
        (Direction::Long, (diff * 600.0).clamp(30.0, 95.0))
    } else if diff < -0.015 {
        (Direction::Short, (diff.abs() * 600.0).clamp(30.0, 95.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn ema_triple(w: &CandleWindow) -> Option<(Direction, f64)> {
    let e9 = indicators::ema(&w.close, 9)?;
    let e21 = indicators::ema(&w.close, 21)?;
    let e55 = indicators::ema(&w.close, 55)?;
    Some(if e9 > e21 && e21 > e55 {
        let alignment = (e9 - e55) / e55 * 100.0;
        (Direction::Long, (alignment * 300.0).clamp(50.0, 98.0))
    } else if e9 < e21 && e21 < e55 {
        let alignment = (e55 - e9) / e55 * 100.0;
        (Direction::Short, (alignment * 300.0).clamp(50.0, 98.0))
    } else {
        (Direction::Neutral, 10.0)
    })
}

fn macd_standard(w: &CandleWindow) -> Option<(Direction, f64)> {
    let macd = indicators::macd_line(&w.close, 12, 26, 9)?;
    let price = w.last_close()?;
    let normalized = macd / price * 10_000.0;
    Some(if normalized > 0.5 {
        (Direction::Long, (normalized * 30.0).clamp(30.0, 90.0))
    } else if normalized < -0.5 {
        (Direction::Short, (normalized.abs() * 30.0).clamp(30.0, 90.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn macd_fast(w: &CandleWindow) -> Option<(Direction, f64)> {
    let macd = indicators::macd_line(&w.close, 5, 13, 6)?;
    let price = w.last_close()?;
    let normalized = macd / price * 10_000.0;
    Some(if normalized > 0.3 {
        (Direction::Long, (normalized * 40.0).clamp(35.0, 90.0))
    } else if normalized < -0.3 {
        (Direction::Short, (normalized.abs() * 40.0).clamp(35.0, 90.0))
    } else {
        (Direction::Neutral, 10.0)
    })
}

// Simplified ADX: trend displacement measured against ATR
fn adx_trend(w: &CandleWindow) -> Option<(Direction, f64)> {
    if w.len() < 28 {
        return None;
    }
    let atr = indicators::atr(&w.high, &w.low, &w.close, 14)?;
    let price = w.last_close()?;
    let prev = w.close[w.len() - 14];
    let trend_dir = price - prev;
    let trend_strength = trend_dir.abs() / (atr * 14.0) * 100.0;
    Some(if trend_dir > 0.0 && trend_strength > 20.0 {
        (Direction::Long, trend_strength.clamp(30.0, 95.0))
    } else if trend_dir < 0.0 && trend_strength > 20.0 {
        (Direction::Short, trend_strength.clamp(30.0, 95.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn parabolic_sar(w: &CandleWindow) -> Option<(Direction, f64)> {
    let sar = indicators::parabolic_sar(&w.high, &w.low, 0.02, 0.2)?;
    let price = w.last_close()?;
    let diff = (price - sar) / price * 100.0;
    Some(if diff > 0.01 {
        (Direction::Long, (diff * 300.0).clamp(40.0, 85.0))
    } else if diff < -0.01 {
        (Direction::Short, (diff.abs() * 300.0).clamp(40.0, 85.0))
    } else {
        (Direction::Neutral, 20.0)
    })
}

fn supertrend(w: &CandleWindow) -> Option<(Direction, f64)> {
    let atr = indicators::atr(&w.high, &w.low, &w.close, 10)?;
    let price = w.last_close()?;
    let hl2 = (w.high.last()? + w.low.last()?) / 2.0;
    let upper = hl2 + 3.0 * atr;
    let lower = hl2 - 3.0 * atr;
    if price > upper {
        return Some((Direction::Long, 75.0));
    }
    if price < lower {
        return Some((Direction::Short, 75.0));
    }
    let dist_up = (upper - price) / atr;
    let dist_down = (price - lower) / atr;
    Some(if dist_down < dist_up {
        (Direction::Long, (50.0 + (dist_up - dist_down) * 10.0).clamp(30.0, 70.0))
    } else {
        (Direction::Short, (50.0 + (dist_down - dist_up) * 10.0).clamp(30.0, 70.0))
    })
}

fn ichimoku(w: &CandleWindow) -> Option<(Direction, f64)> {
    if w.len() < 52 {
        return None;
    }
    let n = w.len();
    let tenkan = (indicators::highest(&w.high[n - 9..])? + indicators::lowest(&w.low[n - 9..])?) / 2.0;
    let kijun =
        (indicators::highest(&w.high[n - 26..])? + indicators::lowest(&w.low[n - 26..])?) / 2.0;
    let span_a = (tenkan + kijun) / 2.0;
    let span_b =
        (indicators::highest(&w.high[n - 52..])? + indicators::lowest(&w.low[n - 52..])?) / 2.0;
    let cloud_top = span_a.max(span_b);
    let cloud_bottom = span_a.min(span_b);
    let price = w.last_close()?;
    Some(if price > cloud_top && tenkan > kijun {
        let s = (price - cloud_top) / cloud_top * 5000.0;
        (Direction::Long, (55.0 + s).clamp(55.0, 95.0))
    } else if price < cloud_bottom && tenkan < kijun {
        let s = (cloud_bottom - price) / cloud_bottom * 5000.0;
        (Direction::Short, (55.0 + s).clamp(55.0, 95.0))
    } else {
        (Direction::Neutral, 25.0)
    })
}

fn aroon_25(w: &CandleWindow) -> Option<(Direction, f64)> {
    let (up, down) = indicators::aroon(&w.close, 25)?;
    let diff = up - down;
    Some(if diff > 30.0 {
        (Direction::Long, (50.0 + diff / 2.0).clamp(40.0, 90.0))
    } else if diff < -30.0 {
        (Direction::Short, (50.0 + diff.abs() / 2.0).clamp(40.0, 90.0))
    } else {
        (Direction::Neutral, 20.0)
    })
}

// ============================================================================
// Momentum
// ============================================================================

fn rsi_14(w: &CandleWindow) -> Option<(Direction, f64)> {
    let rsi = indicators::rsi(&w.close, 14)?;
    Some(if rsi < 30.0 {
        (Direction::Long, ((30.0 - rsi) * 3.0).clamp(40.0, 95.0))
    } else if rsi > 70.0 {
        (Direction::Short, ((rsi - 70.0) * 3.0).clamp(40.0, 95.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn rsi_7(w: &CandleWindow) -> Option<(Direction, f64)> {
    let rsi = indicators::rsi(&w.close, 7)?;
    Some(if rsi < 25.0 {
        (Direction::Long, ((25.0 - rsi) * 3.5).clamp(40.0, 95.0))
    } else if rsi > 75.0 {
        (Direction::Short, ((rsi - 75.0) * 3.5).clamp(40.0, 95.0))
    } else {
        (Direction::Neutral, 10.0)
    })
}

fn stochastic_14(w: &CandleWindow) -> Option<(Direction, f64)> {
    let k = indicators::stochastic_k(&w.close, 14)?;
    Some(if k < 20.0 {
        (Direction::Long, ((20.0 - k) * 4.0).clamp(40.0, 90.0))
    } else if k > 80.0 {
        (Direction::Short, ((k - 80.0) * 4.0).clamp(40.0, 90.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn williams_r_14(w: &CandleWindow) -> Option<(Direction, f64)> {
    let wr = indicators::williams_r(&w.high, &w.low, &w.close, 14)?;
    Some(if wr < -80.0 {
        (Direction::Long, ((-80.0 - wr) * 4.0).clamp(40.0, 90.0))
    } else if wr > -20.0 {
        (Direction::Short, ((wr + 20.0) * 4.0).clamp(40.0, 90.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn cci_20(w: &CandleWindow) -> Option<(Direction, f64)> {
    let cci = indicators::cci(&w.high, &w.low, &w.close, 20)?;
    Some(if cci < -100.0 {
        (Direction::Long, (50.0 + (cci + 100.0).abs() / 3.0).clamp(50.0, 95.0))
    } else if cci > 100.0 {
        (Direction::Short, (50.0 + (cci - 100.0) / 3.0).clamp(50.0, 95.0))
    } else {
        (Direction::Neutral, 20.0)
    })
}

fn roc_12(w: &CandleWindow) -> Option<(Direction, f64)> {
    if w.len() < 13 {
        return None;
    }
    let price = w.last_close()?;
    let prev = w.close[w.len() - 13];
    let roc = (price - prev) / prev * 100.0;
    Some(if roc > 0.1 {
        (Direction::Long, (roc * 200.0).clamp(30.0, 90.0))
    } else if roc < -0.1 {
        (Direction::Short, (roc.abs() * 200.0).clamp(30.0, 90.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn momentum_10(w: &CandleWindow) -> Option<(Direction, f64)> {
    if w.len() < 11 {
        return None;
    }
    let price = w.last_close()?;
    let prev = w.close[w.len() - 11];
    let mom_pct = (price - prev) / prev * 100.0;
    Some(if mom_pct > 0.05 {
        (Direction::Long, (mom_pct * 300.0).clamp(30.0, 90.0))
    } else if mom_pct < -0.05 {
        (Direction::Short, (mom_pct.abs() * 300.0).clamp(30.0, 90.0))
    } else {
        (Direction::Neutral, 10.0)
    })
}

// EMA against EMA-of-EMA, in basis points
fn trix_15(w: &CandleWindow) -> Option<(Direction, f64)> {
    if w.len() < 50 {
        return None;
    }
    let ema1 = indicators::ema(&w.close, 15)?;
    let ema2 = indicators::ema(&indicators::ema_series(&w.close, 15), 15)?;
    if ema2 == 0.0 {
        return None;
    }
    let trix = (ema1 - ema2) / ema2 * 10_000.0;
    Some(if trix > 0.5 {
        (Direction::Long, (trix * 20.0).clamp(35.0, 85.0))
    } else if trix < -0.5 {
        (Direction::Short, (trix.abs() * 20.0).clamp(35.0, 85.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn elder_ray(w: &CandleWindow) -> Option<(Direction, f64)> {
    let ema13 = indicators::ema(&w.close, 13)?;
    let price = w.last_close()?;
    let bull = (w.high.last()? - ema13) / price * 10_000.0;
    let bear = (w.low.last()? - ema13) / price * 10_000.0;
    Some(if bull > 1.0 && bear > -2.0 {
        (Direction::Long, (50.0 + bull * 5.0).clamp(40.0, 85.0))
    } else if bear < -1.0 && bull < 2.0 {
        (Direction::Short, (50.0 + bear.abs() * 5.0).clamp(40.0, 85.0))
    } else {
        (Direction::Neutral, 20.0)
    })
}

fn mfi_14(w: &CandleWindow) -> Option<(Direction, f64)> {
    let mfi = indicators::mfi(&w.high, &w.low, &w.close, &w.volume, 14)?;
    Some(if mfi < 20.0 {
        (Direction::Long, ((20.0 - mfi) * 4.0).clamp(45.0, 95.0))
    } else if mfi > 80.0 {
        (Direction::Short, ((mfi - 80.0) * 4.0).clamp(45.0, 95.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

// ============================================================================
// Volatility / volume
// ============================================================================

fn bollinger_20_2(w: &CandleWindow) -> Option<(Direction, f64)> {
    let bands = indicators::bollinger(&w.close, 20, 2.0)?;
    let price = w.last_close()?;
    let width = bands.upper - bands.lower;
    if width <= 0.0 {
        return Some((Direction::Neutral, 20.0));
    }
    Some(if price < bands.lower {
        let depth = (bands.lower - price) / width * 100.0;
        (Direction::Long, (50.0 + depth * 3.0).clamp(50.0, 95.0))
    } else if price > bands.upper {
        let depth = (price - bands.upper) / width * 100.0;
        (Direction::Short, (50.0 + depth * 3.0).clamp(50.0, 95.0))
    } else {
        (Direction::Neutral, 20.0)
    })
}

fn bollinger_10_15(w: &CandleWindow) -> Option<(Direction, f64)> {
    let bands = indicators::bollinger(&w.close, 10, 1.5)?;
    let price = w.last_close()?;
    let width = bands.upper - bands.lower;
    if width <= 0.0 {
        return Some((Direction::Neutral, 15.0));
    }
    Some(if price < bands.lower {
        let depth = (bands.lower - price) / width * 100.0;
        (Direction::Long, (45.0 + depth * 4.0).clamp(45.0, 90.0))
    } else if price > bands.upper {
        let depth = (price - bands.upper) / width * 100.0;
        (Direction::Short, (45.0 + depth * 4.0).clamp(45.0, 90.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn keltner(w: &CandleWindow) -> Option<(Direction, f64)> {
    let ema20 = indicators::ema(&w.close, 20)?;
    let atr = indicators::atr(&w.high, &w.low, &w.close, 10)?;
    let upper = ema20 + 2.0 * atr;
    let lower = ema20 - 2.0 * atr;
    let price = w.last_close()?;
    Some(if price < lower {
        let depth = (lower - price) / atr;
        (Direction::Long, (50.0 + depth * 20.0).clamp(45.0, 90.0))
    } else if price > upper {
        let depth = (price - upper) / atr;
        (Direction::Short, (50.0 + depth * 20.0).clamp(45.0, 90.0))
    } else {
        (Direction::Neutral, 20.0)
    })
}

fn atr_breakout(w: &CandleWindow) -> Option<(Direction, f64)> {
    let atr = indicators::atr(&w.high, &w.low, &w.close, 14)?;
    let n = w.len();
    if n < 2 {
        return None;
    }
    let price = w.close[n - 1];
    let prev = w.close[n - 2];
    let ratio = (price - prev).abs() / atr;
    Some(if ratio > 1.5 {
        let dir = if price > prev {
            Direction::Long
        } else {
            Direction::Short
        };
        (dir, (ratio * 30.0).clamp(50.0, 95.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

// OBV now vs OBV five bars earlier
fn obv_trend(w: &CandleWindow) -> Option<(Direction, f64)> {
    if w.len() < 20 {
        return None;
    }
    let n = w.len();
    let obv = indicators::obv(&w.close, &w.volume)?;
    let obv_prev = indicators::obv(&w.close[..n - 5], &w.volume[..n - 5])?;
    if obv_prev == 0.0 {
        return None;
    }
    let change = (obv - obv_prev) / obv_prev.abs() * 100.0;
    Some(if change > 5.0 {
        (Direction::Long, (40.0 + change).clamp(40.0, 85.0))
    } else if change < -5.0 {
        (Direction::Short, (40.0 + change.abs()).clamp(40.0, 85.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn vwap_dev(w: &CandleWindow) -> Option<(Direction, f64)> {
    let vwap = indicators::vwap(&w.high, &w.low, &w.close, &w.volume)?;
    if vwap <= 0.0 {
        return None;
    }
    let price = w.last_close()?;
    let dev = (price - vwap) / vwap * 100.0;
    Some(if dev < -0.1 {
        (Direction::Long, (dev.abs() * 200.0).clamp(35.0, 90.0))
    } else if dev > 0.1 {
        (Direction::Short, (dev * 200.0).clamp(35.0, 90.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn cmf_20(w: &CandleWindow) -> Option<(Direction, f64)> {
    let cmf = indicators::cmf(&w.high, &w.low, &w.close, &w.volume, 20)?;
    Some(if cmf > 0.05 {
        (Direction::Long, (cmf * 500.0).clamp(40.0, 90.0))
    } else if cmf < -0.05 {
        (Direction::Short, (cmf.abs() * 500.0).clamp(40.0, 90.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn volume_spike(w: &CandleWindow) -> Option<(Direction, f64)> {
    if w.volume.len() < 21 {
        return None;
    }
    let n = w.volume.len();
    let avg: f64 = w.volume[n - 21..n - 1].iter().sum::<f64>() / 20.0;
    let current = w.volume[n - 1];
    let ratio = if avg > 0.0 { current / avg } else { current };
    if ratio < 1.5 {
        return Some((Direction::Neutral, 10.0));
    }
    let price = w.close[n - 1];
    let prev = w.close[n - 2];
    let dir = if price > prev {
        Direction::Long
    } else {
        Direction::Short
    };
    Some((dir, (ratio * 25.0).clamp(40.0, 90.0)))
}

// Range EMA bulge signals a reversal against the 21 EMA
fn mass_index(w: &CandleWindow) -> Option<(Direction, f64)> {
    if w.len() < 30 {
        return None;
    }
    let n = w.len();
    let ranges: Vec<f64> = (0..n).map(|i| w.high[i] - w.low[i]).collect();
    let ema9 = indicators::ema(&ranges, 9)?;
    let ema9_prev = indicators::ema(&ranges[..n - 5], 9)?;
    if ema9_prev == 0.0 {
        return None;
    }
    let ratio = ema9 / ema9_prev;
    Some(if ratio > 1.05 {
        let price = w.last_close()?;
        let dir = match indicators::ema(&w.close, 21) {
            Some(ema21) if price < ema21 => Direction::Long,
            _ => Direction::Short,
        };
        (dir, ((ratio - 1.0) * 500.0).clamp(40.0, 85.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

fn dpo_20(w: &CandleWindow) -> Option<(Direction, f64)> {
    if w.len() < 30 {
        return None;
    }
    let period = 20;
    let lookback = period / 2 + 1;
    let n = w.len();
    let sma = indicators::sma(&w.close[..n - lookback], period)?;
    let price = w.close[n - lookback];
    let dpo_pct = (price - sma) / sma * 100.0;
    Some(if dpo_pct < -0.05 {
        (Direction::Long, (dpo_pct.abs() * 300.0).clamp(35.0, 85.0))
    } else if dpo_pct > 0.05 {
        (Direction::Short, (dpo_pct * 300.0).clamp(35.0, 85.0))
    } else {
        (Direction::Neutral, 15.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_window(closes: &[f64]) -> CandleWindow {
        let mut w = CandleWindow::default();
        for (i, &c) in closes.iter().enumerate() {
            w.open.push(c);
            w.high.push(c + 0.5);
            w.low.push(c - 0.5);
            w.close.push(c);
            w.volume.push(10.0);
            w.open_time.push(i as i64 * 60_000);
        }
        w
    }

    fn rising_window(n: usize) -> CandleWindow {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        make_window(&closes)
    }

    #[test]
    fn test_registry_shape() {
        let pool = registry();
        assert_eq!(pool.len(), STRATEGY_COUNT);

        let trend = pool
            .iter()
            .filter(|s| s.category == StrategyCategory::Trend)
            .count();
        let momentum = pool
            .iter()
            .filter(|s| s.category == StrategyCategory::Momentum)
            .count();
        let volatility = pool
            .iter()
            .filter(|s| s.category == StrategyCategory::Volatility)
            .count();
        assert_eq!((trend, momentum, volatility), (10, 10, 10));

        let mut ids: Vec<&str> = pool.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), STRATEGY_COUNT, "strategy ids must be unique");
    }

    #[test]
    fn test_registry_index_positions_are_stable() {
        let pool = registry();
        assert_eq!(pool[0].id, "ema_cross_9_21");
        assert_eq!(pool[9].id, "aroon");
        assert_eq!(pool[10].id, "rsi_14");
        assert_eq!(pool[19].id, "mfi_14");
        assert_eq!(pool[20].id, "bollinger_20_2");
        assert_eq!(pool[29].id, "dpo");
    }

    #[test]
    fn test_tiny_window_degrades_to_neutral() {
        let w = make_window(&[100.0, 100.0]);
        for s in registry() {
            let sig = s.evaluate(&w, "BTCUSDT");
            assert_eq!(
                sig.direction,
                Direction::Neutral,
                "{} should be neutral on a 2-bar window",
                s.id
            );
            assert!((0.0..=100.0).contains(&sig.strength));
        }
    }

    #[test]
    fn test_strengths_clamped_and_rounded() {
        let w = rising_window(120);
        for s in registry() {
            let sig = s.evaluate(&w, "ETHUSDT");
            assert!(
                (0.0..=100.0).contains(&sig.strength),
                "{} strength {} out of range",
                s.id,
                sig.strength
            );
            assert_eq!(sig.strength, sig.strength.round());
            assert_eq!(sig.symbol, "ETHUSDT");
        }
    }

    #[test]
    fn test_trend_followers_vote_long_in_uptrend() {
        let w = rising_window(120);
        let pool = registry();
        assert_eq!(pool[0].evaluate(&w, "BTCUSDT").direction, Direction::Long);
        assert_eq!(pool[1].evaluate(&w, "BTCUSDT").direction, Direction::Long);
        assert_eq!(pool[2].evaluate(&w, "BTCUSDT").direction, Direction::Long);
        assert_eq!(pool[9].evaluate(&w, "BTCUSDT").direction, Direction::Long);
    }

    #[test]
    fn test_rsi_votes_against_overextension() {
        // A hard rally reads overbought on both RSI speeds
        let w = rising_window(120);
        let pool = registry();
        assert_eq!(pool[10].evaluate(&w, "BTCUSDT").direction, Direction::Short);
        assert_eq!(pool[11].evaluate(&w, "BTCUSDT").direction, Direction::Short);

        let falling: Vec<f64> = (0..120).map(|i| 500.0 - i as f64).collect();
        let w = make_window(&falling);
        assert_eq!(pool[10].evaluate(&w, "BTCUSDT").direction, Direction::Long);
    }

    #[test]
    fn test_volume_spike_reacts_to_burst() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.01).collect();
        let mut w = make_window(&closes);
        let n = w.volume.len();
        w.volume[n - 1] = 200.0;
        let sig = registry()[27].evaluate(&w, "BTCUSDT");
        assert_eq!(sig.direction, Direction::Long);
        assert!(sig.strength >= 40.0);
    }

    #[test]
    fn test_active_ids_follow_mask() {
        let mut mask = [false; STRATEGY_COUNT];
        mask[0] = true;
        mask[10] = true;
        mask[29] = true;
        assert_eq!(active_ids(&mask), vec!["ema_cross_9_21", "rsi_14", "dpo"]);
    }
}
