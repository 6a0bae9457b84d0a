//! Bot genomes: the evolvable per-bot configuration
//!
//! A genome is pure data. It says which pool strategies to listen to, how to
//! weigh their votes, when a consensus is strong enough to trade, how wide to
//! bracket positions, and how aggressively to size bets. Crossover and
//! mutation reshuffle these genes; validation clamps instead of rejecting so
//! evolution never produces a dead bot.

use serde::{Deserialize, Serialize};

use crate::strategies::STRATEGY_COUNT;

/// Roster for naming evolved children, indexed by generation
pub const BOT_NAMES: [&str; 20] = [
    "Hydra", "Phoenix", "Cerberus", "Atlas", "Kraken", "Titan", "Nexus", "Vortex", "Zenith",
    "Apex", "Sigma", "Delta", "Omega", "Nova", "Pulse", "Forge", "Storm", "Drift", "Blaze",
    "Echo",
];

pub const DEFAULT_SYMBOLS: [&str; 5] = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "BNBUSDT", "XRPUSDT"];

/// Fewest strategies a genome may listen to
pub const MIN_ACTIVE_STRATEGIES: usize = 5;

pub fn name_for_generation(generation: u32) -> &'static str {
    BOT_NAMES[generation as usize % BOT_NAMES.len()]
}

/// Directional preference; trading against it raises the consensus bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionBias {
    Any,
    LongBias,
    ShortBias,
}

/// When is a vote strong enough to act on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusGenes {
    pub min_agreeing: u32,
    pub max_opposing: u32,
    pub min_weighted_strength: f64,
    pub preferred_direction: DirectionBias,
}

/// Position bracketing and exposure limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskGenes {
    /// Take-profit distance in ATR multiples
    pub atr_tp_mult: f64,
    /// Stop-loss distance in ATR multiples
    pub atr_sl_mult: f64,
    /// Trailing stop distance in ATR multiples; 0 disables trailing
    pub trailing_stop_atr: f64,
    /// Opposing signals needed to force an exit; 0 disables the flip exit
    pub flip_exit_threshold: u32,
    pub leverage: u32,
    pub max_open_positions: usize,
    /// Total exposure ceiling as percent of bankroll
    pub max_exposure_pct: f64,
}

/// Streak-adaptive bet sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BettingGenes {
    pub base_pct: f64,
    pub win_mult: f64,
    pub loss_mult: f64,
    pub max_bet_pct: f64,
    /// Consecutive losses before the bet percent resets to base
    pub reset_after_losses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub id: String,
    pub name: String,
    pub generation: u32,
    pub parent_ids: Vec<String>,
    /// Which pool strategies this bot listens to, by registry index
    pub strategy_mask: Vec<bool>,
    /// Vote weight per pool strategy, index-aligned with the mask
    pub strategy_weights: Vec<f64>,
    pub consensus: ConsensusGenes,
    pub risk: RiskGenes,
    pub betting: BettingGenes,
    pub symbols: Vec<String>,
}

impl Genome {
    pub fn active_strategies(&self) -> usize {
        self.strategy_mask.iter().filter(|&&m| m).count()
    }

    /// Check every bound, collecting all violations instead of failing fast
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.strategy_mask.len() != STRATEGY_COUNT {
            errors.push(format!(
                "strategy_mask length {} != {}",
                self.strategy_mask.len(),
                STRATEGY_COUNT
            ));
        }
        if self.strategy_weights.len() != STRATEGY_COUNT {
            errors.push(format!(
                "strategy_weights length {} != {}",
                self.strategy_weights.len(),
                STRATEGY_COUNT
            ));
        }
        if self
            .strategy_weights
            .iter()
            .any(|w| !(0.0..=2.5).contains(w))
        {
            errors.push("strategy weight outside [0, 2.5]".to_string());
        }
        if self.active_strategies() < MIN_ACTIVE_STRATEGIES {
            errors.push(format!(
                "only {} active strategies, need at least {}",
                self.active_strategies(),
                MIN_ACTIVE_STRATEGIES
            ));
        }

        let c = &self.consensus;
        if !(2..=15).contains(&c.min_agreeing) {
            errors.push(format!("min_agreeing {} outside [2, 15]", c.min_agreeing));
        }
        if c.max_opposing > 10 {
            errors.push(format!("max_opposing {} outside [0, 10]", c.max_opposing));
        }
        if !(30.0..=95.0).contains(&c.min_weighted_strength) {
            errors.push(format!(
                "min_weighted_strength {} outside [30, 95]",
                c.min_weighted_strength
            ));
        }

        let r = &self.risk;
        if !(1.0..=6.0).contains(&r.atr_tp_mult) {
            errors.push(format!("atr_tp_mult {} outside [1, 6]", r.atr_tp_mult));
        }
        if !(0.5..=4.0).contains(&r.atr_sl_mult) {
            errors.push(format!("atr_sl_mult {} outside [0.5, 4]", r.atr_sl_mult));
        }
        if r.atr_tp_mult <= r.atr_sl_mult * 0.8 {
            errors.push(format!(
                "atr_tp_mult {} must exceed 0.8 x atr_sl_mult {}",
                r.atr_tp_mult, r.atr_sl_mult
            ));
        }
        if !(0.0..=4.0).contains(&r.trailing_stop_atr) {
            errors.push(format!(
                "trailing_stop_atr {} outside [0, 4]",
                r.trailing_stop_atr
            ));
        }
        if r.flip_exit_threshold > 20 {
            errors.push(format!(
                "flip_exit_threshold {} outside [0, 20]",
                r.flip_exit_threshold
            ));
        }
        if !(1..=75).contains(&r.leverage) {
            errors.push(format!("leverage {} outside [1, 75]", r.leverage));
        }
        if !(1..=10).contains(&r.max_open_positions) {
            errors.push(format!(
                "max_open_positions {} outside [1, 10]",
                r.max_open_positions
            ));
        }
        if !(10.0..=100.0).contains(&r.max_exposure_pct) {
            errors.push(format!(
                "max_exposure_pct {} outside [10, 100]",
                r.max_exposure_pct
            ));
        }

        let b = &self.betting;
        if !(1.0..=15.0).contains(&b.base_pct) {
            errors.push(format!("base_pct {} outside [1, 15]", b.base_pct));
        }
        if !(0.5..=3.0).contains(&b.win_mult) {
            errors.push(format!("win_mult {} outside [0.5, 3]", b.win_mult));
        }
        if !(0.3..=1.5).contains(&b.loss_mult) {
            errors.push(format!("loss_mult {} outside [0.3, 1.5]", b.loss_mult));
        }
        if !(5.0..=25.0).contains(&b.max_bet_pct) {
            errors.push(format!("max_bet_pct {} outside [5, 25]", b.max_bet_pct));
        }

        if self.symbols.is_empty() {
            errors.push("genome has no symbols".to_string());
        }

        errors
    }

    /// Pull the genes that most often drift out of bounds back to safe
    /// values. Called on every freshly bred genome; never rejects.
    pub fn auto_correct(&mut self) {
        if self.consensus.min_agreeing < 3 {
            self.consensus.min_agreeing = 3;
        }
        if self.risk.atr_tp_mult < 1.5 {
            self.risk.atr_tp_mult = 1.5;
        }
        if self.risk.atr_sl_mult < 0.8 {
            self.risk.atr_sl_mult = 0.8;
        }
        if self.risk.leverage > 50 {
            self.risk.leverage = 50;
        }
    }
}

/// The five founding genomes. Distinct temperaments so generation one
/// already explores different corners of the gene space.
pub fn genesis_genomes() -> Vec<Genome> {
    let symbols: Vec<String> = DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect();

    vec![
        // Aggressive trend hunter: trend + momentum heavy, quick brackets
        Genome {
            id: "alpha-gen1".to_string(),
            name: "Hydra".to_string(),
            generation: 1,
            parent_ids: Vec::new(),
            strategy_mask: (0..STRATEGY_COUNT).map(|i| i < 15).collect(),
            strategy_weights: (0..STRATEGY_COUNT)
                .map(|i| {
                    if i < 10 {
                        1.5
                    } else if i < 20 {
                        1.0
                    } else {
                        0.3
                    }
                })
                .collect(),
            consensus: ConsensusGenes {
                min_agreeing: 5,
                max_opposing: 2,
                min_weighted_strength: 50.0,
                preferred_direction: DirectionBias::Any,
            },
            risk: RiskGenes {
                atr_tp_mult: 2.0,
                atr_sl_mult: 1.0,
                trailing_stop_atr: 1.5,
                flip_exit_threshold: 8,
                leverage: 50,
                max_open_positions: 5,
                max_exposure_pct: 50.0,
            },
            betting: BettingGenes {
                base_pct: 5.0,
                win_mult: 1.3,
                loss_mult: 0.8,
                max_bet_pct: 15.0,
                reset_after_losses: 4,
            },
            symbols: symbols.clone(),
        },
        // Conservative all-listener: hears everything, trades rarely
        Genome {
            id: "beta-gen1".to_string(),
            name: "Phoenix".to_string(),
            generation: 1,
            parent_ids: Vec::new(),
            strategy_mask: vec![true; STRATEGY_COUNT],
            strategy_weights: vec![1.0; STRATEGY_COUNT],
            consensus: ConsensusGenes {
                min_agreeing: 7,
                max_opposing: 2,
                min_weighted_strength: 55.0,
                preferred_direction: DirectionBias::Any,
            },
            risk: RiskGenes {
                atr_tp_mult: 3.0,
                atr_sl_mult: 1.5,
                trailing_stop_atr: 2.0,
                flip_exit_threshold: 10,
                leverage: 30,
                max_open_positions: 3,
                max_exposure_pct: 30.0,
            },
            betting: BettingGenes {
                base_pct: 3.0,
                win_mult: 1.1,
                loss_mult: 0.9,
                max_bet_pct: 10.0,
                reset_after_losses: 3,
            },
            symbols: symbols.clone(),
        },
        // Volatility hunter: volume/volatility readers plus a few trend eyes
        Genome {
            id: "gamma-gen1".to_string(),
            name: "Cerberus".to_string(),
            generation: 1,
            parent_ids: Vec::new(),
            strategy_mask: (0..STRATEGY_COUNT).map(|i| i >= 20 || i < 5).collect(),
            strategy_weights: (0..STRATEGY_COUNT)
                .map(|i| {
                    if i >= 20 {
                        1.8
                    } else if i < 5 {
                        1.0
                    } else {
                        0.2
                    }
                })
                .collect(),
            consensus: ConsensusGenes {
                min_agreeing: 6,
                max_opposing: 2,
                min_weighted_strength: 50.0,
                preferred_direction: DirectionBias::Any,
            },
            risk: RiskGenes {
                atr_tp_mult: 2.5,
                atr_sl_mult: 1.2,
                trailing_stop_atr: 1.0,
                flip_exit_threshold: 6,
                leverage: 40,
                max_open_positions: 4,
                max_exposure_pct: 40.0,
            },
            betting: BettingGenes {
                base_pct: 4.0,
                win_mult: 1.2,
                loss_mult: 0.85,
                max_bet_pct: 12.0,
                reset_after_losses: 5,
            },
            symbols: symbols.clone(),
        },
        // Momentum specialist: oscillators only, tight stops
        Genome {
            id: "delta-gen1".to_string(),
            name: "Atlas".to_string(),
            generation: 1,
            parent_ids: Vec::new(),
            strategy_mask: (0..STRATEGY_COUNT).map(|i| (10..20).contains(&i)).collect(),
            strategy_weights: (0..STRATEGY_COUNT)
                .map(|i| if (10..20).contains(&i) { 1.5 } else { 0.0 })
                .collect(),
            consensus: ConsensusGenes {
                min_agreeing: 5,
                max_opposing: 2,
                min_weighted_strength: 55.0,
                preferred_direction: DirectionBias::Any,
            },
            risk: RiskGenes {
                atr_tp_mult: 2.0,
                atr_sl_mult: 0.8,
                trailing_stop_atr: 0.8,
                flip_exit_threshold: 5,
                leverage: 45,
                max_open_positions: 4,
                max_exposure_pct: 35.0,
            },
            betting: BettingGenes {
                base_pct: 4.0,
                win_mult: 1.25,
                loss_mult: 0.85,
                max_bet_pct: 12.0,
                reset_after_losses: 3,
            },
            symbols: symbols.clone(),
        },
        // Diversified patient: every third strategy weighted up, no trailing
        Genome {
            id: "epsilon-gen1".to_string(),
            name: "Kraken".to_string(),
            generation: 1,
            parent_ids: Vec::new(),
            strategy_mask: vec![true; STRATEGY_COUNT],
            strategy_weights: (0..STRATEGY_COUNT)
                .map(|i| match i % 3 {
                    0 => 1.4,
                    1 => 1.0,
                    _ => 0.7,
                })
                .collect(),
            consensus: ConsensusGenes {
                min_agreeing: 7,
                max_opposing: 3,
                min_weighted_strength: 50.0,
                preferred_direction: DirectionBias::Any,
            },
            risk: RiskGenes {
                atr_tp_mult: 3.5,
                atr_sl_mult: 1.8,
                trailing_stop_atr: 0.0,
                flip_exit_threshold: 0,
                leverage: 35,
                max_open_positions: 3,
                max_exposure_pct: 25.0,
            },
            betting: BettingGenes {
                base_pct: 3.0,
                win_mult: 1.15,
                loss_mult: 0.9,
                max_bet_pct: 8.0,
                reset_after_losses: 4,
            },
            symbols,
        },
    ]
}
