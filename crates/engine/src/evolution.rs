//! Genetic operators and the Hall of Fame
//!
//! Crossover mixes two parents gene by gene, mutation jitters a child
//! within tighter-than-validation clamps, and a repair pass guarantees a
//! bred genome can still hear enough strategies to ever trade. When and
//! on whom these run is the orchestrator's business, not this module's.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bot::{round2, BotState};
use crate::genome::{ConsensusGenes, Genome, RiskGenes, MIN_ACTIVE_STRATEGIES};

/// Per-gene mutation probability
pub const MUTATION_RATE: f64 = 0.10;
/// Bound on the Hall of Fame
pub const HALL_OF_FAME_CAP: usize = 20;

fn jitter(rng: &mut impl Rng, span: f64) -> f64 {
    (rng.gen::<f64>() - 0.5) * span
}

fn shift_int(rng: &mut impl Rng, value: u32, span: f64, lo: i64, hi: i64) -> u32 {
    let delta = jitter(rng, span).round() as i64;
    (value as i64 + delta).clamp(lo, hi) as u32
}

/// Mix two parents. The child starts as a copy of `a`; each mask bit and
/// weight flips to `b`'s allele with even odds, as do the ten most
/// consequential scalar genes. Everything else stays paternal.
pub fn crossover(a: &Genome, b: &Genome, rng: &mut impl Rng) -> Genome {
    let mut child = a.clone();
    child.parent_ids = vec![a.id.clone(), b.id.clone()];

    for i in 0..child.strategy_mask.len() {
        if rng.gen_bool(0.5) {
            child.strategy_mask[i] = b.strategy_mask[i];
        }
    }
    for i in 0..child.strategy_weights.len() {
        if rng.gen_bool(0.5) {
            child.strategy_weights[i] = b.strategy_weights[i];
        }
    }

    if rng.gen_bool(0.5) {
        child.consensus.min_agreeing = b.consensus.min_agreeing;
    }
    if rng.gen_bool(0.5) {
        child.consensus.max_opposing = b.consensus.max_opposing;
    }
    if rng.gen_bool(0.5) {
        child.consensus.min_weighted_strength = b.consensus.min_weighted_strength;
    }
    if rng.gen_bool(0.5) {
        child.risk.atr_tp_mult = b.risk.atr_tp_mult;
    }
    if rng.gen_bool(0.5) {
        child.risk.atr_sl_mult = b.risk.atr_sl_mult;
    }
    if rng.gen_bool(0.5) {
        child.risk.trailing_stop_atr = b.risk.trailing_stop_atr;
    }
    if rng.gen_bool(0.5) {
        child.risk.flip_exit_threshold = b.risk.flip_exit_threshold;
    }
    if rng.gen_bool(0.5) {
        child.risk.leverage = b.risk.leverage;
    }
    if rng.gen_bool(0.5) {
        child.betting.base_pct = b.betting.base_pct;
    }
    if rng.gen_bool(0.5) {
        child.betting.win_mult = b.betting.win_mult;
    }

    child
}

/// Jitter each gene with probability `MUTATION_RATE`, then repair the mask
/// so at least five strategies stay active
pub fn mutate(genome: &mut Genome, rng: &mut impl Rng) {
    for bit in genome.strategy_mask.iter_mut() {
        if rng.gen::<f64>() < MUTATION_RATE {
            *bit = !*bit;
        }
    }
    let mut active = genome.active_strategies();
    while active < MIN_ACTIVE_STRATEGIES {
        let idx = rng.gen_range(0..genome.strategy_mask.len());
        if !genome.strategy_mask[idx] {
            genome.strategy_mask[idx] = true;
            active += 1;
        }
    }

    for w in genome.strategy_weights.iter_mut() {
        if rng.gen::<f64>() < MUTATION_RATE {
            *w = (*w + jitter(rng, 0.4)).clamp(0.1, 2.0);
        }
    }

    let c = &mut genome.consensus;
    if rng.gen::<f64>() < MUTATION_RATE {
        c.min_agreeing = shift_int(rng, c.min_agreeing, 4.0, 3, 15);
    }
    if rng.gen::<f64>() < MUTATION_RATE {
        c.max_opposing = shift_int(rng, c.max_opposing, 3.0, 1, 10);
    }
    if rng.gen::<f64>() < MUTATION_RATE {
        c.min_weighted_strength = (c.min_weighted_strength + jitter(rng, 20.0)).clamp(40.0, 90.0);
    }

    let r = &mut genome.risk;
    if rng.gen::<f64>() < MUTATION_RATE {
        r.atr_tp_mult = (r.atr_tp_mult + jitter(rng, 1.0)).clamp(1.5, 5.0);
    }
    if rng.gen::<f64>() < MUTATION_RATE {
        r.atr_sl_mult = (r.atr_sl_mult + jitter(rng, 0.6)).clamp(0.8, 3.0);
    }
    if rng.gen::<f64>() < MUTATION_RATE {
        r.trailing_stop_atr = (r.trailing_stop_atr + jitter(rng, 0.8)).clamp(0.5, 3.0);
    }
    if rng.gen::<f64>() < MUTATION_RATE {
        r.flip_exit_threshold = shift_int(rng, r.flip_exit_threshold, 4.0, 3, 15);
    }
    if rng.gen::<f64>() < MUTATION_RATE {
        r.leverage = shift_int(rng, r.leverage, 20.0, 5, 50);
    }

    let b = &mut genome.betting;
    if rng.gen::<f64>() < MUTATION_RATE {
        b.base_pct = (b.base_pct + jitter(rng, 2.0)).clamp(2.0, 8.0);
    }
    if rng.gen::<f64>() < MUTATION_RATE {
        b.win_mult = (b.win_mult + jitter(rng, 0.3)).clamp(1.0, 2.0);
    }
    if rng.gen::<f64>() < MUTATION_RATE {
        b.loss_mult = (b.loss_mult + jitter(rng, 0.2)).clamp(0.5, 1.0);
    }
}

/// Breed one child: crossover when a second parent exists, otherwise a
/// mutated copy. Identity fields are stamped here so callers only choose
/// parents and a lineage prefix.
pub fn breed_child(
    parent: &Genome,
    second: Option<&Genome>,
    id: String,
    name: String,
    generation: u32,
    rng: &mut impl Rng,
) -> Genome {
    let mut child = match second {
        Some(b) => crossover(parent, b, rng),
        None => {
            let mut c = parent.clone();
            c.parent_ids = vec![parent.id.clone()];
            c
        }
    };
    mutate(&mut child, rng);
    child.auto_correct();
    child.id = id;
    child.name = name;
    child.generation = generation;
    child
}

/// A strong genome captured at its moment of glory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallOfFameEntry {
    pub bot_id: String,
    pub bot_name: String,
    pub generation: u32,
    pub fitness: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub profit_factor: f64,
    pub bankroll: f64,
    pub trades: u32,
    /// Win rate in percent
    pub win_rate: f64,
    pub active_strategies: usize,
    pub recorded_at: i64,
    pub consensus: ConsensusGenes,
    pub risk: RiskGenes,
}

/// Bounded, fitness-sorted archive of historically strong bots. One entry
/// per bot id; re-recording keeps whichever run scored higher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HallOfFame {
    entries: Vec<HallOfFameEntry>,
}

impl HallOfFame {
    pub fn record(&mut self, bot: &BotState) {
        let fitness = round2(bot.fitness());
        if let Some(existing) = self.entries.iter().position(|e| e.bot_id == bot.genome.id) {
            if self.entries[existing].fitness >= fitness {
                return;
            }
            self.entries.remove(existing);
        }

        self.entries.push(HallOfFameEntry {
            bot_id: bot.genome.id.clone(),
            bot_name: bot.genome.name.clone(),
            generation: bot.genome.generation,
            fitness,
            sharpe: round2(bot.sharpe()),
            sortino: round2(bot.sortino()),
            profit_factor: round2(bot.profit_factor()),
            bankroll: round2(bot.bankroll),
            trades: bot.trades,
            win_rate: round2(bot.win_rate() * 100.0),
            active_strategies: bot.genome.active_strategies(),
            recorded_at: Utc::now().timestamp_millis(),
            consensus: bot.genome.consensus.clone(),
            risk: bot.genome.risk.clone(),
        });
        self.entries
            .sort_by(|a, b| b.fitness.partial_cmp(&a.fitness).unwrap_or(std::cmp::Ordering::Equal));
        self.entries.truncate(HALL_OF_FAME_CAP);
    }

    pub fn entries(&self) -> &[HallOfFameEntry] {
        &self.entries
    }

    pub fn top(&self, n: usize) -> &[HallOfFameEntry] {
        &self.entries[..self.entries.len().min(n)]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::genesis_genomes;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_crossover_picks_alleles_from_either_parent() {
        let parents = genesis_genomes();
        let a = &parents[0]; // Hydra, leverage 50
        let b = &parents[1]; // Phoenix, leverage 30
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let child = crossover(a, b, &mut rng);
            assert!(child.risk.leverage == 50 || child.risk.leverage == 30);
            assert!(
                child.consensus.min_agreeing == a.consensus.min_agreeing
                    || child.consensus.min_agreeing == b.consensus.min_agreeing
            );
            for i in 0..30 {
                let w = child.strategy_weights[i];
                assert!(
                    w == a.strategy_weights[i] || w == b.strategy_weights[i],
                    "weight {} came from neither parent",
                    i
                );
            }
            // Genes outside the crossover set stay paternal
            assert_eq!(child.betting.loss_mult, a.betting.loss_mult);
            assert_eq!(child.betting.max_bet_pct, a.betting.max_bet_pct);
            assert_eq!(child.risk.max_open_positions, a.risk.max_open_positions);
            assert_eq!(child.risk.max_exposure_pct, a.risk.max_exposure_pct);
            assert_eq!(child.symbols, a.symbols);
            assert_eq!(child.parent_ids, vec![a.id.clone(), b.id.clone()]);
        }
    }

    #[test]
    fn test_mutation_respects_clamps() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = genesis_genomes().remove(0);

        for _ in 0..200 {
            mutate(&mut genome, &mut rng);
            assert!(genome.active_strategies() >= MIN_ACTIVE_STRATEGIES);
            assert!(genome
                .strategy_weights
                .iter()
                .all(|w| (0.0..=2.5).contains(w)));
            assert!((3..=15).contains(&genome.consensus.min_agreeing));
            assert!((1..=10).contains(&genome.consensus.max_opposing));
            assert!((40.0..=90.0).contains(&genome.consensus.min_weighted_strength));
            assert!((1.5..=5.0).contains(&genome.risk.atr_tp_mult));
            assert!((0.8..=3.0).contains(&genome.risk.atr_sl_mult));
            assert!((0.5..=3.0).contains(&genome.risk.trailing_stop_atr));
            assert!((3..=15).contains(&genome.risk.flip_exit_threshold));
            assert!((5..=50).contains(&genome.risk.leverage));
            assert!((2.0..=8.0).contains(&genome.betting.base_pct));
            assert!((1.0..=2.0).contains(&genome.betting.win_mult));
            assert!((0.5..=1.0).contains(&genome.betting.loss_mult));
        }
    }

    #[test]
    fn test_mask_repair_revives_dead_genome() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut genome = genesis_genomes().remove(0);
        genome.strategy_mask = vec![false; 30];

        mutate(&mut genome, &mut rng);
        assert!(genome.active_strategies() >= MIN_ACTIVE_STRATEGIES);
    }

    #[test]
    fn test_breed_child_stamps_identity() {
        let parents = genesis_genomes();
        let mut rng = StdRng::seed_from_u64(11);

        let child = breed_child(
            &parents[0],
            Some(&parents[1]),
            "child-gen2-123".to_string(),
            "Titan".to_string(),
            2,
            &mut rng,
        );
        assert_eq!(child.id, "child-gen2-123");
        assert_eq!(child.name, "Titan");
        assert_eq!(child.generation, 2);
        assert_eq!(child.parent_ids.len(), 2);
        assert!((1..=75).contains(&child.risk.leverage));
        assert!(child.risk.atr_tp_mult >= 1.5, "auto-correct floor");

        let clone_child = breed_child(
            &parents[0],
            None,
            "evo-gen2-456".to_string(),
            "Nexus".to_string(),
            2,
            &mut rng,
        );
        assert_eq!(clone_child.parent_ids, vec![parents[0].id.clone()]);
    }

    #[test]
    fn test_hall_of_fame_caps_and_sorts() {
        let mut hof = HallOfFame::default();
        // Flat profitable histories; bankroll difference orders fitness
        for i in 0..25 {
            let mut genome = genesis_genomes().remove(0);
            genome.id = format!("bot{}", i);
            let mut bot = BotState::new(genome);
            bot.trades = 6;
            bot.wins = 3;
            bot.pnl_history = vec![2.0; 6];
            bot.bankroll = 100.0 + i as f64;
            hof.record(&bot);
        }

        assert_eq!(hof.len(), HALL_OF_FAME_CAP);
        assert_eq!(hof.entries()[0].bot_id, "bot24", "highest fitness first");
        let fits: Vec<f64> = hof.entries().iter().map(|e| e.fitness).collect();
        let mut sorted = fits.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(fits, sorted);
        assert!(
            !hof.entries().iter().any(|e| e.bot_id == "bot0"),
            "weakest entries trimmed"
        );
        assert_eq!(hof.top(10).len(), 10);
    }

    #[test]
    fn test_hall_of_fame_keeps_better_run_per_bot() {
        let mut hof = HallOfFame::default();
        let mut genome = genesis_genomes().remove(0);
        genome.id = "repeat".to_string();
        let mut bot = BotState::new(genome);
        bot.trades = 6;
        bot.wins = 5;
        bot.pnl_history = vec![3.0; 6];
        bot.bankroll = 400.0;
        hof.record(&bot);
        let first_fitness = hof.entries()[0].fitness;

        // A worse later run must not displace the stronger record
        bot.bankroll = 120.0;
        bot.wins = 1;
        hof.record(&bot);
        assert_eq!(hof.len(), 1);
        assert_eq!(hof.entries()[0].fitness, first_fitness);

        // A better one replaces it
        bot.bankroll = 900.0;
        bot.wins = 6;
        hof.record(&bot);
        assert_eq!(hof.len(), 1);
        assert!(hof.entries()[0].fitness > first_fitness);
    }
}
