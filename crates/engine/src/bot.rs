//! Per-bot runtime state: bankroll, open positions, trade history
//!
//! A bot is a genome plus the mutable state of its current session. All
//! money math is plain f64; records round to 2 decimals at the point of
//! recording, not in the running state.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consensus::TradeDecision;
use crate::genome::Genome;
use crate::stats;
use crate::strategies;
use crate::types::{CloseReason, Direction, SessionEnd};

pub const INITIAL_BANKROLL: f64 = 100.0;
pub const GOAL_BANKROLL: f64 = 10_000.0;
/// Cycles a symbol stays untradeable after a losing close
pub const COOLDOWN_CYCLES: u64 = 10;
pub const TRADE_HISTORY_CAP: usize = 100;
pub const PNL_HISTORY_CAP: usize = 200;
/// How many recent trades survive into snapshots and session archives
pub const TRADE_PERSIST_TAIL: usize = 50;

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// One open simulated futures position. Exactly one per (bot, symbol).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Direction,
    pub entry_price: f64,
    pub quantity: f64,
    pub leverage: u32,
    pub bet_amount: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    /// Absolute trailing distance in price units; 0 disables trailing
    pub trailing_distance: f64,
    /// Best price seen since entry, in the position's favor
    pub high_water_mark: f64,
    pub opened_at: i64,
    /// The vote tally that opened this position
    pub consensus: TradeDecision,
}

/// A closed trade as it lands in the bot's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub bet_amount: f64,
    pub pnl_pct: f64,
    pub pnl_value: f64,
    pub reason: CloseReason,
    pub bankroll_before: f64,
    pub bankroll_after: f64,
    pub timestamp: i64,
    pub consensus: TradeDecision,
}

/// Lifetime contribution of one pool strategy to a bot's closed trades
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyMetric {
    pub trades: u32,
    pub wins: u32,
    pub pnl: f64,
}

/// Everything archived when a bot's run ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub bot_id: String,
    pub bot_name: String,
    pub generation: u32,
    pub genome: Genome,
    pub start_bankroll: f64,
    pub end_bankroll: f64,
    pub peak_bankroll: f64,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub max_drawdown_pct: f64,
    pub fitness: f64,
    pub death_count: u32,
    pub end_reason: SessionEnd,
    pub started_at: i64,
    pub ended_at: i64,
    pub recent_trades: Vec<TradeRecord>,
    pub active_strategies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotState {
    pub genome: Genome,
    pub bankroll: f64,
    pub initial_bankroll: f64,
    pub max_bankroll: f64,
    pub min_bankroll: f64,
    pub max_drawdown_pct: f64,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    pub positions: Vec<Position>,
    /// Sum of bet amounts across open positions
    pub exposure: f64,
    pub trade_history: Vec<TradeRecord>,
    /// Per-trade pnl percent, newest last
    pub pnl_history: Vec<f64>,
    pub alive: bool,
    pub start_time: i64,
    pub last_trade_time: Option<i64>,
    pub death_count: u32,
    pub session_id: String,
    pub current_bet_pct: f64,
    /// symbol -> cycle number when it becomes tradeable again
    pub cooldowns: HashMap<String, u64>,
    /// Cumulative value of profitable closes
    pub tp_value_total: f64,
    /// Cumulative value of losing closes
    pub sl_value_total: f64,
    pub strategy_metrics: HashMap<String, StrategyMetric>,
}

impl BotState {
    /// Build a fresh bot around a genome. Validation failures are logged
    /// and clamped away, never fatal.
    pub fn new(mut genome: Genome) -> Self {
        let errors = genome.validate();
        if !errors.is_empty() {
            warn!(
                bot = %genome.name,
                errors = ?errors,
                "genome out of bounds, auto-correcting"
            );
        }
        genome.auto_correct();

        let now = Utc::now().timestamp_millis();
        let session_id = format!("{}-session-{}", genome.id, now);
        let base_pct = genome.betting.base_pct;
        BotState {
            genome,
            bankroll: INITIAL_BANKROLL,
            initial_bankroll: INITIAL_BANKROLL,
            max_bankroll: INITIAL_BANKROLL,
            min_bankroll: INITIAL_BANKROLL,
            max_drawdown_pct: 0.0,
            trades: 0,
            wins: 0,
            losses: 0,
            consecutive_wins: 0,
            consecutive_losses: 0,
            positions: Vec::new(),
            exposure: 0.0,
            trade_history: Vec::new(),
            pnl_history: Vec::new(),
            alive: true,
            start_time: now,
            last_trade_time: None,
            death_count: 0,
            session_id,
            current_bet_pct: base_pct,
            cooldowns: HashMap::new(),
            tp_value_total: 0.0,
            sl_value_total: 0.0,
            strategy_metrics: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.genome.id
    }

    pub fn name(&self) -> &str {
        &self.genome.name
    }

    pub fn position_index(&self, symbol: &str) -> Option<usize> {
        self.positions.iter().position(|p| p.symbol == symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.position_index(symbol).is_some()
    }

    pub fn in_cooldown(&self, symbol: &str, cycle: u64) -> bool {
        self.cooldowns
            .get(symbol)
            .map_or(false, |&until| cycle < until)
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }

    pub fn sharpe(&self) -> f64 {
        stats::sharpe_ratio(&self.pnl_history)
    }

    pub fn sortino(&self) -> f64 {
        stats::sortino_ratio(&self.pnl_history)
    }

    pub fn profit_factor(&self) -> f64 {
        stats::profit_factor(&self.pnl_history)
    }

    pub fn fitness(&self) -> f64 {
        stats::fitness(
            &self.pnl_history,
            self.trades,
            self.wins,
            self.bankroll,
            self.max_drawdown_pct,
        )
    }

    pub fn record_trade(&mut self, record: TradeRecord) {
        self.trade_history.push(record);
        if self.trade_history.len() > TRADE_HISTORY_CAP {
            self.trade_history.remove(0);
        }
    }

    pub fn record_pnl(&mut self, pnl_pct: f64) {
        self.pnl_history.push(pnl_pct);
        if self.pnl_history.len() > PNL_HISTORY_CAP {
            self.pnl_history.remove(0);
        }
    }

    /// Send the winner back to the starting line after reaching the goal.
    /// Session state resets; lifetime telemetry (drawdown, streak record,
    /// death count, strategy metrics) survives.
    pub fn reset_for_new_session(&mut self) {
        self.bankroll = INITIAL_BANKROLL;
        self.initial_bankroll = INITIAL_BANKROLL;
        self.max_bankroll = INITIAL_BANKROLL;
        self.trades = 0;
        self.wins = 0;
        self.losses = 0;
        self.positions.clear();
        self.exposure = 0.0;
        self.trade_history.clear();
        self.pnl_history.clear();
        self.cooldowns.clear();
        self.current_bet_pct = self.genome.betting.base_pct;
        self.alive = true;
        self.session_id = format!(
            "{}-session-{}",
            self.genome.id,
            Utc::now().timestamp_millis()
        );
    }

    /// Snapshot this run for the session archive
    pub fn session_record(&self, reason: SessionEnd) -> SessionRecord {
        let tail = self
            .trade_history
            .len()
            .saturating_sub(TRADE_PERSIST_TAIL);
        SessionRecord {
            session_id: self.session_id.clone(),
            bot_id: self.genome.id.clone(),
            bot_name: self.genome.name.clone(),
            generation: self.genome.generation,
            genome: self.genome.clone(),
            start_bankroll: self.initial_bankroll,
            end_bankroll: round2(self.bankroll),
            peak_bankroll: round2(self.max_bankroll),
            trades: self.trades,
            wins: self.wins,
            losses: self.losses,
            win_rate: round2(self.win_rate() * 100.0),
            max_drawdown_pct: round2(self.max_drawdown_pct),
            fitness: round2(self.fitness()),
            death_count: self.death_count,
            end_reason: reason,
            started_at: self.start_time,
            ended_at: Utc::now().timestamp_millis(),
            recent_trades: self.trade_history[tail..].to_vec(),
            active_strategies: strategies::active_ids(&self.genome.strategy_mask),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::genesis_genomes;
    use crate::types::{CloseReason, Direction};

    fn make_record(pnl_value: f64, n: i64) -> TradeRecord {
        TradeRecord {
            symbol: "BTCUSDT".to_string(),
            side: Direction::Long,
            entry_price: 100.0,
            exit_price: 102.0,
            bet_amount: 5.0,
            pnl_pct: 2.0,
            pnl_value,
            reason: CloseReason::TakeProfit,
            bankroll_before: 100.0,
            bankroll_after: 100.0 + pnl_value,
            timestamp: n,
            consensus: TradeDecision {
                direction: Direction::Long,
                confidence: 60.0,
                agreeing: 6,
                opposing: 1,
                weighted_strength: 62.0,
                top_strategies: vec!["rsi_14".to_string()],
            },
        }
    }

    #[test]
    fn test_new_bot_starts_at_the_line() {
        let bot = BotState::new(genesis_genomes().remove(0));
        assert_eq!(bot.bankroll, INITIAL_BANKROLL);
        assert!(bot.alive);
        assert_eq!(bot.current_bet_pct, bot.genome.betting.base_pct);
        assert!(bot.positions.is_empty());
        assert_eq!(bot.fitness(), 0.0);
        assert!(bot.session_id.starts_with("alpha-gen1-session-"));
    }

    #[test]
    fn test_new_bot_clamps_bad_genome() {
        let mut genome = genesis_genomes().remove(0);
        genome.consensus.min_agreeing = 1;
        genome.risk.leverage = 70;
        let bot = BotState::new(genome);
        assert_eq!(bot.genome.consensus.min_agreeing, 3);
        assert_eq!(bot.genome.risk.leverage, 50);
    }

    #[test]
    fn test_trade_history_ring_caps_at_100() {
        let mut bot = BotState::new(genesis_genomes().remove(0));
        for n in 0..105 {
            bot.record_trade(make_record(1.0, n));
        }
        assert_eq!(bot.trade_history.len(), TRADE_HISTORY_CAP);
        assert_eq!(bot.trade_history[0].timestamp, 5, "oldest records trimmed");
    }

    #[test]
    fn test_pnl_history_ring_caps_at_200() {
        let mut bot = BotState::new(genesis_genomes().remove(0));
        for n in 0..210 {
            bot.record_pnl(n as f64);
        }
        assert_eq!(bot.pnl_history.len(), PNL_HISTORY_CAP);
        assert_eq!(bot.pnl_history[0], 10.0);
    }

    #[test]
    fn test_cooldown_window() {
        let mut bot = BotState::new(genesis_genomes().remove(0));
        bot.cooldowns.insert("ETHUSDT".to_string(), 25);
        assert!(bot.in_cooldown("ETHUSDT", 20));
        assert!(!bot.in_cooldown("ETHUSDT", 25));
        assert!(!bot.in_cooldown("BTCUSDT", 20));
    }

    #[test]
    fn test_session_reset_keeps_lifetime_telemetry() {
        let mut bot = BotState::new(genesis_genomes().remove(0));
        bot.bankroll = 10_250.0;
        bot.max_bankroll = 10_250.0;
        bot.min_bankroll = 40.0;
        bot.max_drawdown_pct = 35.0;
        bot.trades = 40;
        bot.wins = 28;
        bot.losses = 12;
        bot.death_count = 2;
        bot.current_bet_pct = 12.0;
        bot.exposure = 30.0;
        bot.record_pnl(5.0);
        bot.cooldowns.insert("BTCUSDT".to_string(), 99);
        let old_session = bot.session_id.clone();
        bot.session_id = "stale".to_string();

        bot.reset_for_new_session();

        assert_eq!(bot.bankroll, INITIAL_BANKROLL);
        assert_eq!(bot.max_bankroll, INITIAL_BANKROLL);
        assert_eq!(bot.trades, 0);
        assert!(bot.pnl_history.is_empty());
        assert!(bot.cooldowns.is_empty());
        assert_eq!(bot.exposure, 0.0);
        assert_eq!(bot.current_bet_pct, bot.genome.betting.base_pct);
        assert_ne!(bot.session_id, "stale");
        assert_ne!(bot.session_id, old_session);
        // Lifetime telemetry survives the reset
        assert_eq!(bot.min_bankroll, 40.0);
        assert_eq!(bot.max_drawdown_pct, 35.0);
        assert_eq!(bot.death_count, 2);
    }

    #[test]
    fn test_session_record_takes_trade_tail() {
        let mut bot = BotState::new(genesis_genomes().remove(0));
        for n in 0..80 {
            bot.record_trade(make_record(1.0, n));
        }
        bot.trades = 80;
        bot.wins = 80;

        let record = bot.session_record(SessionEnd::GoalReached);
        assert_eq!(record.recent_trades.len(), TRADE_PERSIST_TAIL);
        assert_eq!(record.recent_trades[0].timestamp, 30);
        assert_eq!(record.end_reason, SessionEnd::GoalReached);
        assert_eq!(record.win_rate, 100.0);
        assert_eq!(record.active_strategies.len(), 15);
    }
}
