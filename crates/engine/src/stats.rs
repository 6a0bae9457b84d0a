//! Performance metrics over a bot's per-trade pnl history
//!
//! All ratios work on the pnl-percent series and return 0 when there is
//! too little history to mean anything. Fitness blends them into the single
//! score the evolution controller ranks bots by.

/// Fewest closed trades before fitness is meaningful
const MIN_TRADES_FOR_FITNESS: u32 = 3;
/// Fewest pnl samples before risk-adjusted ratios are meaningful
const MIN_SAMPLES_FOR_RATIOS: usize = 5;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean return over population standard deviation, clamped to [-2, 5].
///
/// A flat profitable series has no meaningful deviation and scores a
/// fixed 3 rather than blowing up the division.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < MIN_SAMPLES_FOR_RATIOS {
        return 0.0;
    }
    let avg = mean(returns);
    let variance = returns.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev < 1e-9 {
        return if avg > 0.0 { 3.0 } else { 0.0 };
    }
    (avg / std_dev).clamp(-2.0, 5.0)
}

/// Like Sharpe but punishes only downside volatility, clamped to [-2, 5]
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.len() < MIN_SAMPLES_FOR_RATIOS {
        return 0.0;
    }
    let avg = mean(returns);
    let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if losses.is_empty() {
        return if avg > 0.0 { 3.0 } else { 0.0 };
    }
    let downside = (losses.iter().map(|l| l.powi(2)).sum::<f64>() / losses.len() as f64).sqrt();
    (avg / downside).clamp(-2.0, 5.0)
}

/// Gross wins over gross losses, capped at 10
pub fn profit_factor(returns: &[f64]) -> f64 {
    let wins: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|r| **r < 0.0).sum();
    if losses == 0.0 {
        return if wins > 0.0 { 5.0 } else { 0.0 };
    }
    (wins / losses.abs()).min(10.0)
}

/// The evolution score. Zero until a bot has closed at least 3 trades,
/// then a weighted blend of risk-adjusted performance, hit rate, growth,
/// drawdown discipline and sample size.
pub fn fitness(
    returns: &[f64],
    trades: u32,
    wins: u32,
    bankroll: f64,
    max_drawdown_pct: f64,
) -> f64 {
    if trades < MIN_TRADES_FOR_FITNESS {
        return 0.0;
    }

    let win_rate = wins as f64 / trades as f64;
    let growth = (bankroll - crate::bot::INITIAL_BANKROLL) / crate::bot::INITIAL_BANKROLL;
    let consistency = if trades > 10 {
        (trades as f64 / 50.0).min(1.0)
    } else {
        0.5
    };

    sharpe_ratio(returns) * 20.0
        + sortino_ratio(returns) * 10.0
        + win_rate * 15.0
        + (growth * 15.0).min(20.0)
        + (profit_factor(returns) * 5.0).min(15.0)
        + (1.0 - max_drawdown_pct / 100.0) * 15.0
        + consistency * 5.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharpe_needs_five_samples() {
        assert_eq!(sharpe_ratio(&[5.0, 3.0, 4.0, 2.0]), 0.0);
    }

    #[test]
    fn test_sharpe_flat_profit_scores_three() {
        assert_eq!(sharpe_ratio(&[5.0, 5.0, 5.0, 5.0, 5.0]), 3.0);
    }

    #[test]
    fn test_sharpe_clamps_both_ways() {
        // Tiny wobble around a strong mean pushes the raw ratio far above 5
        assert_eq!(sharpe_ratio(&[10.0, 10.1, 9.9, 10.0, 10.0]), 5.0);
        assert_eq!(sharpe_ratio(&[-10.0, -10.1, -9.9, -10.0, -10.0]), -2.0);
    }

    #[test]
    fn test_sharpe_mixed_series() {
        let s = sharpe_ratio(&[4.0, -2.0, 3.0, -1.0, 5.0]);
        assert!(s > 0.0 && s < 3.0, "got {}", s);
    }

    #[test]
    fn test_sortino_ignores_upside_volatility() {
        // Same mean and losses, wilder wins; sortino should not flinch
        let calm = sortino_ratio(&[2.0, 2.0, -1.0, 2.0, 2.0]);
        let wild = sortino_ratio(&[0.5, 6.0, -1.0, 0.5, 1.0]);
        assert!((calm - wild).abs() < 1e-9);
    }

    #[test]
    fn test_sortino_no_losses_scores_three() {
        assert_eq!(sortino_ratio(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0);
        assert_eq!(sortino_ratio(&[0.0, 0.0, 0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_profit_factor_edges() {
        assert_eq!(profit_factor(&[]), 0.0);
        assert_eq!(profit_factor(&[3.0, 4.0]), 5.0, "no losses with wins");
        assert_eq!(profit_factor(&[-3.0, -4.0]), 0.0, "no wins at all");
        assert_eq!(profit_factor(&[10.0, -5.0]), 2.0);
        assert_eq!(profit_factor(&[100.0, -1.0]), 10.0, "capped");
    }

    #[test]
    fn test_fitness_zero_below_three_trades() {
        assert_eq!(fitness(&[50.0, 50.0], 2, 2, 200.0, 0.0), 0.0);
    }

    #[test]
    fn test_fitness_exact_blend() {
        // sharpe 3 (flat) -> 60, sortino 3 (no losses) -> 30, win rate 1 -> 15,
        // growth 0.5 -> 7.5, profit factor 5 capped to 15, drawdown 0 -> 15,
        // consistency 0.5 -> 2.5
        let f = fitness(&[5.0, 5.0, 5.0, 5.0, 5.0], 5, 5, 150.0, 0.0);
        assert!((f - 145.0).abs() < 1e-9, "got {}", f);
    }

    #[test]
    fn test_fitness_prefers_winner_over_loser() {
        let winner = fitness(&[4.0, 5.0, -1.0, 6.0, 3.0, 4.0], 6, 5, 220.0, 8.0);
        let loser = fitness(&[-4.0, -5.0, 1.0, -6.0, -3.0, -4.0], 6, 1, 40.0, 65.0);
        assert!(winner > loser);
        assert!(winner > 50.0, "got {}", winner);
    }

    #[test]
    fn test_fitness_consistency_saturates() {
        let few = fitness(&[2.0; 20], 20, 20, 300.0, 0.0);
        let many = fitness(&[2.0; 60], 60, 60, 300.0, 0.0);
        // Only the consistency term differs: 20/50 vs capped 1.0
        assert!((many - few - (1.0 - 0.4) * 5.0).abs() < 1e-9);
    }
}
