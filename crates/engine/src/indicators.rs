//! Technical indicator math over candle windows
//!
//! The `ta` crate provides the streaming primitives (RSI, EMA, SMA, MACD,
//! Bollinger, stochastic, ATR); each helper feeds a full window through a
//! fresh instance and returns the latest value. Indicators `ta` 0.5 does not
//! ship are computed directly over the slices.
//!
//! All helpers return `None` when the window is too short, so strategy code
//! can degrade to a neutral signal instead of guessing.

use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex, SimpleMovingAverage, SlowStochastic,
};
use ta::Next;

// ============================================================================
// ta-backed primitives
// ============================================================================

/// Bollinger band levels at the latest bar
#[derive(Debug, Clone, Copy)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if values.len() < period {
        return None;
    }
    let mut sma = SimpleMovingAverage::new(period).expect("Invalid SMA period");
    let mut last = 0.0;
    for &v in values {
        last = sma.next(v);
    }
    Some(last)
}

/// Exponential moving average at the latest bar
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if values.len() < period {
        return None;
    }
    let mut ema = ExponentialMovingAverage::new(period).expect("Invalid EMA period");
    let mut last = 0.0;
    for &v in values {
        last = ema.next(v);
    }
    Some(last)
}

/// Full EMA series, one value per input bar
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut ema = ExponentialMovingAverage::new(period).expect("Invalid EMA period");
    values.iter().map(|&v| ema.next(v)).collect()
}

/// Wilder RSI at the latest bar
pub fn rsi(close: &[f64], period: usize) -> Option<f64> {
    if close.len() < period + 1 {
        return None;
    }
    let mut rsi = RelativeStrengthIndex::new(period).expect("Invalid RSI period");
    let mut last = 50.0;
    for &c in close {
        last = rsi.next(c);
    }
    Some(last)
}

/// MACD line (fast EMA - slow EMA) at the latest bar
pub fn macd_line(close: &[f64], fast: usize, slow: usize, signal: usize) -> Option<f64> {
    if close.len() < slow + signal {
        return None;
    }
    let mut macd =
        MovingAverageConvergenceDivergence::new(fast, slow, signal).expect("Invalid MACD params");
    let mut last = 0.0;
    for &c in close {
        last = macd.next(c).macd;
    }
    Some(last)
}

/// Bollinger bands at the latest bar
pub fn bollinger(close: &[f64], period: usize, multiplier: f64) -> Option<Bands> {
    if close.len() < period {
        return None;
    }
    let mut bb = BollingerBands::new(period, multiplier).expect("Invalid BB params");
    let mut out = Bands {
        upper: 0.0,
        middle: 0.0,
        lower: 0.0,
    };
    for &c in close {
        let v = bb.next(c);
        out = Bands {
            upper: v.upper,
            middle: v.average,
            lower: v.lower,
        };
    }
    Some(out)
}

/// Smoothed stochastic %K over closes
pub fn stochastic_k(close: &[f64], period: usize) -> Option<f64> {
    if close.len() < period {
        return None;
    }
    let mut stoch = SlowStochastic::new(period, 3).expect("Invalid Stochastic params");
    let mut last = 50.0;
    for &c in close {
        last = stoch.next(c);
    }
    Some(last)
}

/// Average True Range at the latest bar
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    if close.len() < period + 1 || high.len() != close.len() || low.len() != close.len() {
        return None;
    }
    let mut atr = AverageTrueRange::new(period).expect("Invalid ATR period");
    let mut last = 0.0;
    for i in 0..close.len() {
        let bar = data_item(high[i], low[i], close[i]);
        last = atr.next(&bar);
    }
    if last > 0.0 {
        Some(last)
    } else {
        None
    }
}

// ATR needs DataItem; fall back to a degenerate bar on malformed input
fn data_item(high: f64, low: f64, close: f64) -> ta::DataItem {
    ta::DataItem::builder()
        .open(close)
        .high(high)
        .low(low)
        .close(close)
        .volume(0.0)
        .build()
        .unwrap_or_else(|_| {
            ta::DataItem::builder()
                .open(close)
                .high(close)
                .low(close)
                .close(close)
                .volume(0.0)
                .build()
                .unwrap()
        })
}

// ============================================================================
// Direct slice math
// ============================================================================

pub fn highest(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub fn lowest(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Williams %R over the last `period` bars (-100..0)
pub fn williams_r(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    if close.len() < period {
        return None;
    }
    let hh = highest(&high[high.len() - period..])?;
    let ll = lowest(&low[low.len() - period..])?;
    let range = hh - ll;
    if range <= 0.0 {
        return None;
    }
    let last = *close.last()?;
    Some((hh - last) / range * -100.0)
}

/// Commodity Channel Index over the last `period` bars
pub fn cci(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    if close.len() < period {
        return None;
    }
    let n = close.len();
    let tp: Vec<f64> = (n - period..n)
        .map(|i| (high[i] + low[i] + close[i]) / 3.0)
        .collect();
    let mean = tp.iter().sum::<f64>() / period as f64;
    let mean_dev = tp.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
    if mean_dev <= 0.0 {
        return None;
    }
    Some((tp[period - 1] - mean) / (0.015 * mean_dev))
}

/// Money Flow Index over the last `period` typical-price flows
pub fn mfi(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], period: usize) -> Option<f64> {
    if close.len() < period + 1 {
        return None;
    }
    let n = close.len();
    let mut positive = 0.0;
    let mut negative = 0.0;
    for i in n - period..n {
        let tp = (high[i] + low[i] + close[i]) / 3.0;
        let tp_prev = (high[i - 1] + low[i - 1] + close[i - 1]) / 3.0;
        let flow = tp * volume[i];
        if tp > tp_prev {
            positive += flow;
        } else if tp < tp_prev {
            negative += flow;
        }
    }
    if negative <= 0.0 {
        return Some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + positive / negative))
}

/// Final Parabolic SAR value (classic 0.02 step / 0.2 max accelerator)
pub fn parabolic_sar(high: &[f64], low: &[f64], af_step: f64, af_max: f64) -> Option<f64> {
    if high.len() < 3 || high.len() != low.len() {
        return None;
    }
    let mut uptrend = high[1] + low[1] >= high[0] + low[0];
    let mut sar = if uptrend { low[0] } else { high[0] };
    let mut extreme = if uptrend { high[1] } else { low[1] };
    let mut af = af_step;

    for i in 2..high.len() {
        sar += af * (extreme - sar);
        if uptrend {
            // SAR may not enter the prior two bars' range
            sar = sar.min(low[i - 1]).min(low[i - 2]);
            if low[i] < sar {
                uptrend = false;
                sar = extreme;
                extreme = low[i];
                af = af_step;
            } else if high[i] > extreme {
                extreme = high[i];
                af = (af + af_step).min(af_max);
            }
        } else {
            sar = sar.max(high[i - 1]).max(high[i - 2]);
            if high[i] > sar {
                uptrend = true;
                sar = extreme;
                extreme = high[i];
                af = af_step;
            } else if low[i] < extreme {
                extreme = low[i];
                af = (af + af_step).min(af_max);
            }
        }
    }
    Some(sar)
}

/// Cumulative On-Balance Volume over the whole window
pub fn obv(close: &[f64], volume: &[f64]) -> Option<f64> {
    if close.len() < 2 || close.len() != volume.len() {
        return None;
    }
    let mut obv = 0.0;
    for i in 1..close.len() {
        if close[i] > close[i - 1] {
            obv += volume[i];
        } else if close[i] < close[i - 1] {
            obv -= volume[i];
        }
    }
    Some(obv)
}

/// Volume-weighted average price over the whole window
pub fn vwap(high: &[f64], low: &[f64], close: &[f64], volume: &[f64]) -> Option<f64> {
    if close.is_empty() {
        return None;
    }
    let mut pv = 0.0;
    let mut v = 0.0;
    for i in 0..close.len() {
        let tp = (high[i] + low[i] + close[i]) / 3.0;
        pv += tp * volume[i];
        v += volume[i];
    }
    if v <= 0.0 {
        return None;
    }
    Some(pv / v)
}

/// Chaikin Money Flow over the last `period` bars
pub fn cmf(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], period: usize) -> Option<f64> {
    if close.len() < period {
        return None;
    }
    let n = close.len();
    let mut mfv = 0.0;
    let mut vol = 0.0;
    for i in n - period..n {
        let range = high[i] - low[i];
        if range == 0.0 {
            continue;
        }
        let mult = ((close[i] - low[i]) - (high[i] - close[i])) / range;
        mfv += mult * volume[i];
        vol += volume[i];
    }
    if vol <= 0.0 {
        return None;
    }
    Some(mfv / vol)
}

/// Aroon (up, down) over the last `period` closes
pub fn aroon(close: &[f64], period: usize) -> Option<(f64, f64)> {
    if close.len() < period {
        return None;
    }
    let recent = &close[close.len() - period..];
    let mut hi_idx = 0usize;
    let mut lo_idx = 0usize;
    for (i, &v) in recent.iter().enumerate() {
        if v > recent[hi_idx] {
            hi_idx = i;
        }
        if v < recent[lo_idx] {
            lo_idx = i;
        }
    }
    let up = (hi_idx + 1) as f64 / period as f64 * 100.0;
    let down = (lo_idx + 1) as f64 / period as f64 * 100.0;
    Some((up, down))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn test_sma_is_last_n_mean() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(sma(&values, 3), Some(5.0));
        assert_eq!(sma(&values, 10), None);
    }

    #[test]
    fn test_rsi_extremes_on_monotonic_series() {
        let up = ramp(100.0, 1.0, 60);
        let rsi_up = rsi(&up, 14).unwrap();
        assert!(rsi_up > 70.0, "rsi on rising series was {}", rsi_up);

        let down = ramp(200.0, -1.0, 60);
        let rsi_down = rsi(&down, 14).unwrap();
        assert!(rsi_down < 30.0, "rsi on falling series was {}", rsi_down);

        assert_eq!(rsi(&up[..10], 14), None);
    }

    #[test]
    fn test_ema_tracks_trend_direction() {
        let up = ramp(100.0, 1.0, 80);
        let fast = ema(&up, 9).unwrap();
        let slow = ema(&up, 21).unwrap();
        assert!(fast > slow, "fast {} should lead slow {} in an uptrend", fast, slow);
    }

    #[test]
    fn test_macd_line_sign_follows_trend() {
        let up = ramp(100.0, 0.5, 100);
        assert!(macd_line(&up, 12, 26, 9).unwrap() > 0.0);
        let down = ramp(200.0, -0.5, 100);
        assert!(macd_line(&down, 12, 26, 9).unwrap() < 0.0);
    }

    #[test]
    fn test_bollinger_band_ordering() {
        let mut values = ramp(100.0, 0.1, 50);
        values[49] = 110.0;
        let bands = bollinger(&values, 20, 2.0).unwrap();
        assert!(bands.lower < bands.middle && bands.middle < bands.upper);
    }

    #[test]
    fn test_atr_positive_on_ranging_bars() {
        let close = ramp(100.0, 0.2, 30);
        let high: Vec<f64> = close.iter().map(|c| c + 1.0).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 1.0).collect();
        let atr = atr(&high, &low, &close, 14).unwrap();
        assert!(atr > 0.0);
        assert!(atr < 5.0, "atr {} out of plausible range", atr);
    }

    #[test]
    fn test_williams_r_bounds() {
        let close = ramp(100.0, 1.0, 20);
        let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
        let wr = williams_r(&high, &low, &close, 14).unwrap();
        assert!((-100.0..=0.0).contains(&wr));
        // Close at the top of the range reads near zero
        assert!(wr > -20.0, "wr on rising series was {}", wr);
    }

    #[test]
    fn test_aroon_fresh_high_reads_100() {
        let close = ramp(100.0, 1.0, 30);
        let (up, down) = aroon(&close, 25).unwrap();
        assert_eq!(up, 100.0);
        assert!(down < up);
    }

    #[test]
    fn test_obv_accumulates_signed_volume() {
        let close = vec![10.0, 11.0, 10.5, 12.0];
        let volume = vec![5.0, 100.0, 40.0, 60.0];
        // +100 -40 +60
        assert_eq!(obv(&close, &volume), Some(120.0));
    }

    #[test]
    fn test_vwap_weights_by_volume() {
        let high = vec![11.0, 21.0];
        let low = vec![9.0, 19.0];
        let close = vec![10.0, 20.0];
        let volume = vec![1.0, 3.0];
        // typical prices 10 and 20, weighted 1:3
        assert_eq!(vwap(&high, &low, &close, &volume), Some(17.5));
        assert_eq!(vwap(&high, &low, &close, &[0.0, 0.0]), None);
    }

    #[test]
    fn test_cmf_sign_tracks_close_position_in_range() {
        let n = 25;
        let high = vec![110.0; n];
        let low = vec![90.0; n];
        let volume = vec![10.0; n];
        // Closes pinned near the high -> accumulation
        let close_hi = vec![108.0; n];
        assert!(cmf(&high, &low, &close_hi, &volume, 20).unwrap() > 0.05);
        // Closes pinned near the low -> distribution
        let close_lo = vec![92.0; n];
        assert!(cmf(&high, &low, &close_lo, &volume, 20).unwrap() < -0.05);
    }

    #[test]
    fn test_parabolic_sar_sits_below_uptrend() {
        let close = ramp(100.0, 1.0, 40);
        let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
        let sar = parabolic_sar(&high, &low, 0.02, 0.2).unwrap();
        assert!(
            sar < *close.last().unwrap(),
            "sar {} should trail below price in an uptrend",
            sar
        );
    }

    #[test]
    fn test_mfi_reads_high_on_sustained_buying() {
        let close = ramp(100.0, 1.0, 30);
        let high: Vec<f64> = close.iter().map(|c| c + 1.0).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 1.0).collect();
        let volume = vec![50.0; 30];
        let mfi = mfi(&high, &low, &close, &volume, 14).unwrap();
        assert!(mfi > 80.0, "mfi on all-up flows was {}", mfi);
    }
}
