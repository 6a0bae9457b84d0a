//! Weighted-vote consensus: one genome reads one market snapshot
//!
//! Pure function of genome x snapshot. The genome's mask picks which pool
//! signals count, weights scale their strengths, and three thresholds
//! (agreeing count, opposing count, weighted strength) gate the trade.
//! The 5m trend bias only scales confidence, it never vetoes.

use serde::{Deserialize, Serialize};

use crate::genome::{DirectionBias, Genome};
use crate::types::{Direction, MarketSnapshot};

/// An approved trade with the vote tally that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub direction: Direction,
    /// Vote quality scaled into [0, 100]
    pub confidence: f64,
    pub agreeing: u32,
    pub opposing: u32,
    /// Weighted score of the winning side divided by its vote count
    pub weighted_strength: f64,
    /// Top contributors on the winning side, strongest first, at most 5
    pub top_strategies: Vec<String>,
}

/// Evaluate a snapshot through a genome's eyes. `None` means no trade.
pub fn evaluate(genome: &Genome, snapshot: &MarketSnapshot) -> Option<TradeDecision> {
    let mut long_votes: Vec<(String, f64)> = Vec::new();
    let mut short_votes: Vec<(String, f64)> = Vec::new();
    let mut long_score = 0.0;
    let mut short_score = 0.0;

    // 1. Tally mask-filtered, weighted votes. A configured weight of zero
    //    falls back to 1.0 so a masked-in strategy always has a voice.
    for (i, signal) in snapshot.signals.iter().enumerate() {
        if !genome.strategy_mask.get(i).copied().unwrap_or(false) {
            continue;
        }
        let weight = match genome.strategy_weights.get(i) {
            Some(&w) if w > 0.0 => w,
            _ => 1.0,
        };
        let score = signal.strength * weight;
        match signal.direction {
            Direction::Long => {
                long_score += score;
                long_votes.push((signal.strategy_id.clone(), score));
            }
            Direction::Short => {
                short_score += score;
                short_votes.push((signal.strategy_id.clone(), score));
            }
            Direction::Neutral => {}
        }
    }

    // 2. Dominant side by weighted score, ties go long
    let (direction, mut votes, score, opposing) = if long_score >= short_score {
        (Direction::Long, long_votes, long_score, short_votes.len())
    } else {
        (Direction::Short, short_votes, short_score, long_votes.len())
    };
    let agreeing = votes.len();
    if agreeing == 0 {
        return None;
    }
    let weighted_strength = score / agreeing as f64;

    // 3. Trading against the genome's directional bias raises the bar
    let mut required = genome.consensus.min_agreeing;
    let against_bias = matches!(
        (genome.consensus.preferred_direction, direction),
        (DirectionBias::LongBias, Direction::Short) | (DirectionBias::ShortBias, Direction::Long)
    );
    if against_bias {
        required += 2;
    }

    // 4. The three consensus gates
    if (agreeing as u32) < required
        || (opposing as u32) > genome.consensus.max_opposing
        || weighted_strength < genome.consensus.min_weighted_strength
    {
        return None;
    }

    // 5. Higher-timeframe alignment scales confidence
    let bias = &snapshot.htf_bias;
    let multiplier = if bias.direction == direction && bias.strength > 30.0 {
        1.15
    } else if bias.direction != Direction::Neutral
        && bias.direction != direction
        && bias.strength > 50.0
    {
        0.85
    } else {
        1.0
    };

    let ratio = agreeing as f64 / (agreeing + opposing).max(1) as f64;
    let confidence = (ratio * weighted_strength * multiplier).min(100.0);

    // 6. Strongest winning voters, for trade attribution
    votes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let top_strategies = votes.into_iter().take(5).map(|(id, _)| id).collect();

    Some(TradeDecision {
        direction,
        confidence,
        agreeing: agreeing as u32,
        opposing: opposing as u32,
        weighted_strength,
        top_strategies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::genesis_genomes;
    use crate::strategies::registry;
    use crate::types::{HtfBias, SignalSummary, StrategySignal};

    /// All-neutral snapshot with the given (index, direction, strength)
    /// votes painted on top
    fn make_snapshot(votes: &[(usize, Direction, f64)]) -> MarketSnapshot {
        let mut signals: Vec<StrategySignal> = registry()
            .iter()
            .map(|s| StrategySignal {
                strategy_id: s.id.to_string(),
                category: s.category,
                direction: Direction::Neutral,
                strength: 0.0,
                symbol: "BTCUSDT".to_string(),
                timestamp: 0,
            })
            .collect();
        for &(i, direction, strength) in votes {
            signals[i].direction = direction;
            signals[i].strength = strength;
        }
        MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            signals,
            summary: SignalSummary::default(),
            atr_primary: Some(120.0),
            atr_confirm: Some(150.0),
            price: 50_000.0,
            htf_bias: HtfBias::default(),
            timestamp: 0,
        }
    }

    /// Phoenix: full mask, uniform weights, thresholds 7 / 2 / 55
    fn uniform_genome() -> crate::genome::Genome {
        genesis_genomes().remove(1)
    }

    #[test]
    fn test_strong_agreement_approves_trade() {
        let genome = uniform_genome();
        let votes: Vec<(usize, Direction, f64)> =
            (0..8).map(|i| (i, Direction::Long, 70.0)).collect();
        let decision = evaluate(&genome, &make_snapshot(&votes)).unwrap();

        assert_eq!(decision.direction, Direction::Long);
        assert_eq!(decision.agreeing, 8);
        assert_eq!(decision.opposing, 0);
        assert_eq!(decision.weighted_strength, 70.0);
        assert_eq!(decision.confidence, 70.0);
        assert_eq!(decision.top_strategies.len(), 5);
    }

    #[test]
    fn test_five_longs_outvote_one_short() {
        let mut genome = uniform_genome();
        genome.consensus.min_agreeing = 5;
        genome.consensus.max_opposing = 2;
        genome.consensus.min_weighted_strength = 50.0;

        let mut votes: Vec<(usize, Direction, f64)> =
            (0..5).map(|i| (i, Direction::Long, 80.0)).collect();
        votes.push((5, Direction::Short, 90.0));
        let snapshot = make_snapshot(&votes);

        let decision = evaluate(&genome, &snapshot).unwrap();
        assert_eq!(decision.direction, Direction::Long);
        assert_eq!(decision.agreeing, 5);
        assert_eq!(decision.opposing, 1);
        assert_eq!(decision.weighted_strength, 80.0);
        // Same inputs, same decision
        assert_eq!(evaluate(&genome, &snapshot), Some(decision));
    }

    #[test]
    fn test_too_few_agreeing_rejects() {
        let genome = uniform_genome();
        let votes: Vec<(usize, Direction, f64)> =
            (0..6).map(|i| (i, Direction::Long, 80.0)).collect();
        assert!(evaluate(&genome, &make_snapshot(&votes)).is_none());
    }

    #[test]
    fn test_too_many_opposing_rejects() {
        let genome = uniform_genome();
        let mut votes: Vec<(usize, Direction, f64)> =
            (0..8).map(|i| (i, Direction::Long, 80.0)).collect();
        votes.extend((8..11).map(|i| (i, Direction::Short, 40.0)));
        assert!(evaluate(&genome, &make_snapshot(&votes)).is_none());
    }

    #[test]
    fn test_weak_strength_rejects() {
        let genome = uniform_genome();
        let votes: Vec<(usize, Direction, f64)> =
            (0..10).map(|i| (i, Direction::Long, 40.0)).collect();
        assert!(evaluate(&genome, &make_snapshot(&votes)).is_none());
    }

    #[test]
    fn test_bias_penalty_demands_two_extra_votes() {
        let mut genome = uniform_genome();
        genome.consensus.preferred_direction = DirectionBias::LongBias;

        let seven: Vec<(usize, Direction, f64)> =
            (0..7).map(|i| (i, Direction::Short, 80.0)).collect();
        assert!(
            evaluate(&genome, &make_snapshot(&seven)).is_none(),
            "seven shorts should not clear min_agreeing + 2"
        );

        let nine: Vec<(usize, Direction, f64)> =
            (0..9).map(|i| (i, Direction::Short, 80.0)).collect();
        let decision = evaluate(&genome, &make_snapshot(&nine)).unwrap();
        assert_eq!(decision.direction, Direction::Short);
    }

    #[test]
    fn test_score_tie_goes_long() {
        let mut genome = uniform_genome();
        genome.consensus.min_agreeing = 2;
        genome.consensus.max_opposing = 10;
        genome.consensus.min_weighted_strength = 30.0;

        let mut votes: Vec<(usize, Direction, f64)> =
            (0..3).map(|i| (i, Direction::Long, 60.0)).collect();
        votes.extend((3..6).map(|i| (i, Direction::Short, 60.0)));
        let decision = evaluate(&genome, &make_snapshot(&votes)).unwrap();
        assert_eq!(decision.direction, Direction::Long);
    }

    #[test]
    fn test_htf_alignment_scales_confidence() {
        let genome = uniform_genome();
        let votes: Vec<(usize, Direction, f64)> =
            (0..8).map(|i| (i, Direction::Long, 70.0)).collect();

        let mut aligned = make_snapshot(&votes);
        aligned.htf_bias = HtfBias {
            direction: Direction::Long,
            strength: 60.0,
            long_count: 7,
            short_count: 1,
        };
        let boosted = evaluate(&genome, &aligned).unwrap();
        assert!((boosted.confidence - 70.0 * 1.15).abs() < 1e-9);

        let mut opposed = make_snapshot(&votes);
        opposed.htf_bias = HtfBias {
            direction: Direction::Short,
            strength: 60.0,
            long_count: 1,
            short_count: 7,
        };
        let damped = evaluate(&genome, &opposed).unwrap();
        assert!((damped.confidence - 70.0 * 0.85).abs() < 1e-9);

        // Weak opposing bias (<= 50) leaves confidence untouched
        let mut weak = make_snapshot(&votes);
        weak.htf_bias = HtfBias {
            direction: Direction::Short,
            strength: 40.0,
            long_count: 2,
            short_count: 5,
        };
        let flat = evaluate(&genome, &weak).unwrap();
        assert_eq!(flat.confidence, 70.0);
    }

    #[test]
    fn test_zero_weight_votes_with_default_weight() {
        let mut genome = uniform_genome();
        genome.strategy_weights = vec![0.0; 30];

        let votes: Vec<(usize, Direction, f64)> =
            (0..8).map(|i| (i, Direction::Long, 70.0)).collect();
        let decision = evaluate(&genome, &make_snapshot(&votes)).unwrap();
        assert_eq!(decision.weighted_strength, 70.0);
    }

    #[test]
    fn test_masked_out_strategies_are_silent() {
        let mut genome = uniform_genome();
        genome.consensus.min_agreeing = 3;
        // Silence everything but the first five slots
        for i in 5..30 {
            genome.strategy_mask[i] = false;
        }

        let mut votes: Vec<(usize, Direction, f64)> =
            (0..4).map(|i| (i, Direction::Long, 70.0)).collect();
        votes.extend((5..20).map(|i| (i, Direction::Short, 90.0)));

        let decision = evaluate(&genome, &make_snapshot(&votes)).unwrap();
        assert_eq!(decision.direction, Direction::Long, "masked shorts must not vote");
        assert_eq!(decision.agreeing, 4);
        assert_eq!(decision.opposing, 0);
    }

    #[test]
    fn test_top_strategies_ranked_by_weighted_score() {
        let mut genome = uniform_genome();
        genome.consensus.min_agreeing = 2;
        genome.consensus.min_weighted_strength = 30.0;
        genome.strategy_weights[2] = 2.0;

        let votes = vec![
            (0, Direction::Long, 80.0),
            (1, Direction::Long, 90.0),
            (2, Direction::Long, 50.0), // 50 x 2.0 = 100, the strongest
        ];
        let decision = evaluate(&genome, &make_snapshot(&votes)).unwrap();
        let ids = registry();
        assert_eq!(decision.top_strategies[0], ids[2].id);
        assert_eq!(decision.top_strategies[1], ids[1].id);
        assert_eq!(decision.top_strategies[2], ids[0].id);
    }
}
