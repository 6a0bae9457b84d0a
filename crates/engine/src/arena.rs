//! The arena: a fixed population of bots competing on the same market
//!
//! Owns the bot population behind one `RwLock` and drives everything that
//! happens to it: the trading cycle, the three evolution paths (bankruptcy,
//! periodic pressure, goal reached), periodic persistence and the read
//! queries the HTTP layer serves. Cycles never skew the clock: the timer
//! fires on schedule and a tick that finds the previous pass still running
//! is dropped, not queued.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use persistence::repository::{SessionRepository, SessionRow, SnapshotRepository};
use persistence::SqlitePool;

use crate::bot::{
    round2, BotState, SessionRecord, StrategyMetric, TradeRecord, GOAL_BANKROLL,
    INITIAL_BANKROLL, TRADE_PERSIST_TAIL,
};
use crate::consensus;
use crate::evolution::{self, HallOfFame};
use crate::genome::{genesis_genomes, name_for_generation, Genome, DEFAULT_SYMBOLS};
use crate::position;
use crate::signal_pool::SignalPool;
use crate::types::{CloseReason, MarketSnapshot, SessionEnd};

pub const DEFAULT_CYCLE_SECS: u64 = 6;
pub const DEFAULT_PERSIST_SECS: u64 = 30;
/// Evolutionary pressure is applied every this many cycles
pub const EVOLUTION_INTERVAL: u64 = 50;
/// Saved state older than this is ignored on boot
pub const SNAPSHOT_MAX_AGE_DAYS: i64 = 7;

/// Log the first N consecutive cycle failures, then only every Mth
const ERROR_LOG_BURST: u32 = 10;
const ERROR_LOG_EVERY: u32 = 50;

#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Symbol universe handed to the genesis population
    pub symbols: Vec<String>,
    pub cycle_secs: u64,
    pub persist_secs: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            cycle_secs: DEFAULT_CYCLE_SECS,
            persist_secs: DEFAULT_PERSIST_SECS,
        }
    }
}

/// Everything behind the arena's lock
#[derive(Debug)]
pub struct ArenaState {
    pub generation: u32,
    pub cycle: u64,
    pub bots: Vec<BotState>,
    pub hall_of_fame: HallOfFame,
}

/// A bot as it is written to disk. Open positions, cooldowns and exposure
/// are runtime-only: a restored bot comes back flat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedBot {
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
    pub trade_history: Vec<TradeRecord>,
    pub pnl_history: Vec<f64>,
    pub death_count: u32,
    pub session_id: String,
    pub current_bet_pct: f64,
    pub start_time: i64,
    pub last_trade_time: Option<i64>,
    pub tp_value_total: f64,
    pub sl_value_total: f64,
    pub strategy_metrics: HashMap<String, StrategyMetric>,
}

impl From<&BotState> for PersistedBot {
    fn from(bot: &BotState) -> Self {
        let tail = bot.trade_history.len().saturating_sub(TRADE_PERSIST_TAIL);
        PersistedBot {
            genome: bot.genome.clone(),
            bankroll: bot.bankroll,
            initial_bankroll: bot.initial_bankroll,
            max_bankroll: bot.max_bankroll,
            min_bankroll: bot.min_bankroll,
            max_drawdown_pct: bot.max_drawdown_pct,
            trades: bot.trades,
            wins: bot.wins,
            losses: bot.losses,
            consecutive_wins: bot.consecutive_wins,
            consecutive_losses: bot.consecutive_losses,
            trade_history: bot.trade_history[tail..].to_vec(),
            pnl_history: bot.pnl_history.clone(),
            death_count: bot.death_count,
            session_id: bot.session_id.clone(),
            current_bet_pct: bot.current_bet_pct,
            start_time: bot.start_time,
            last_trade_time: bot.last_trade_time,
            tp_value_total: bot.tp_value_total,
            sl_value_total: bot.sl_value_total,
            strategy_metrics: bot.strategy_metrics.clone(),
        }
    }
}

impl PersistedBot {
    fn into_bot(self) -> BotState {
        BotState {
            genome: self.genome,
            bankroll: self.bankroll,
            initial_bankroll: self.initial_bankroll,
            max_bankroll: self.max_bankroll,
            min_bankroll: self.min_bankroll,
            max_drawdown_pct: self.max_drawdown_pct,
            trades: self.trades,
            wins: self.wins,
            losses: self.losses,
            consecutive_wins: self.consecutive_wins,
            consecutive_losses: self.consecutive_losses,
            positions: Vec::new(),
            exposure: 0.0,
            trade_history: self.trade_history,
            pnl_history: self.pnl_history,
            alive: true,
            start_time: self.start_time,
            last_trade_time: self.last_trade_time,
            death_count: self.death_count,
            session_id: self.session_id,
            current_bet_pct: self.current_bet_pct,
            cooldowns: HashMap::new(),
            tp_value_total: self.tp_value_total,
            sl_value_total: self.sl_value_total,
            strategy_metrics: self.strategy_metrics,
        }
    }
}

/// The persisted document: the whole arena in one JSON blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub generation: u32,
    pub cycle: u64,
    /// Millis; used for the staleness check on boot
    pub saved_at: i64,
    pub bots: Vec<PersistedBot>,
    pub hall_of_fame: HallOfFame,
}

pub struct Arena {
    pool: Arc<SignalPool>,
    db: Option<SqlitePool>,
    config: ArenaConfig,
    state: RwLock<ArenaState>,
    running: AtomicBool,
    /// Guards against overlapping cycle passes; a busy tick is dropped
    cycle_busy: AtomicBool,
    /// Bumped on every start so loops from an older start exit cleanly
    epoch: AtomicU64,
    consecutive_errors: AtomicU32,
    started_at: i64,
}

impl Arena {
    pub fn new(pool: Arc<SignalPool>, db: Option<SqlitePool>, config: ArenaConfig) -> Self {
        let state = RwLock::new(Self::seed_state(&config));
        Self {
            pool,
            db,
            config,
            state,
            running: AtomicBool::new(false),
            cycle_busy: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            consecutive_errors: AtomicU32::new(0),
            started_at: Utc::now().timestamp_millis(),
        }
    }

    fn seed_state(config: &ArenaConfig) -> ArenaState {
        let mut genomes = genesis_genomes();
        if !config.symbols.is_empty() {
            for genome in &mut genomes {
                genome.symbols = config.symbols.clone();
            }
        }
        ArenaState {
            generation: 1,
            cycle: 0,
            bots: genomes.into_iter().map(BotState::new).collect(),
            hall_of_fame: HallOfFame::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    // ==================== LIFECYCLE ====================

    /// Restore state from the latest saved snapshot. Returns false when no
    /// usable snapshot exists (missing, stale or unreadable) and the genesis
    /// population stays in place.
    pub async fn restore(&self) -> bool {
        let db = match &self.db {
            Some(pool) => pool,
            None => return false,
        };
        let record = match SnapshotRepository::new(db).load_latest().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("No saved arena state, starting from genesis");
                return false;
            }
            Err(err) => {
                warn!(error = %err, "Snapshot load failed, starting from genesis");
                return false;
            }
        };
        let snapshot: ArenaSnapshot = match serde_json::from_str(&record.state_json) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "Snapshot unreadable, starting from genesis");
                return false;
            }
        };

        let age_ms = Utc::now().timestamp_millis() - snapshot.saved_at;
        if age_ms > SNAPSHOT_MAX_AGE_DAYS * 86_400_000 {
            warn!(
                age_days = age_ms / 86_400_000,
                "Snapshot too old, starting from genesis"
            );
            return false;
        }

        let mut state = self.state.write().unwrap();
        state.generation = snapshot.generation;
        state.cycle = snapshot.cycle;
        state.bots = snapshot.bots.into_iter().map(PersistedBot::into_bot).collect();
        state.hall_of_fame = snapshot.hall_of_fame;
        info!(
            generation = state.generation,
            cycle = state.cycle,
            bots = state.bots.len(),
            "Arena state restored"
        );
        true
    }

    /// Spawn the cycle and persist loops. Idempotent: a second start while
    /// already running is a no-op and returns false.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::Relaxed) {
            return false;
        }
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            cycle_secs = self.config.cycle_secs,
            persist_secs = self.config.persist_secs,
            "Arena starting"
        );

        let arena = self.clone();
        tokio::spawn(async move { arena.run_cycles(epoch).await });
        let arena = self.clone();
        tokio::spawn(async move { arena.run_persist(epoch).await });
        true
    }

    /// Stop the loops, archive every live session as stopped and write a
    /// final snapshot. Returns false when the arena was not running.
    pub async fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::Relaxed) {
            return false;
        }
        info!("Arena stopping");

        let records: Vec<SessionRecord> = {
            let state = self.state.read().unwrap();
            state
                .bots
                .iter()
                .map(|bot| bot.session_record(SessionEnd::Stopped))
                .collect()
        };
        self.archive_sessions(&records).await;

        if let Err(err) = self.persist().await {
            warn!(error = %err, "Final persist on stop failed");
        }
        true
    }

    /// Wipe the saved snapshot and reseed the genesis population. Archived
    /// sessions are kept. The arena is left stopped; the caller restarts it.
    pub async fn reset(&self) -> Result<()> {
        self.stop().await;
        if let Some(db) = &self.db {
            SnapshotRepository::new(db)
                .clear()
                .await
                .map_err(|e| anyhow::anyhow!("snapshot clear failed: {e}"))?;
        }
        let mut state = self.state.write().unwrap();
        *state = Self::seed_state(&self.config);
        info!("Arena reset to genesis");
        Ok(())
    }

    fn live(&self, epoch: u64) -> bool {
        self.running.load(Ordering::Relaxed) && self.epoch.load(Ordering::Relaxed) == epoch
    }

    async fn run_cycles(self: Arc<Self>, epoch: u64) {
        info!("Cycle loop up");
        loop {
            if !self.live(epoch) {
                break;
            }
            // The timer stays on schedule whether or not the last pass
            // finished; a pass that is still running means this tick is lost.
            if self.cycle_busy.swap(true, Ordering::Relaxed) {
                debug!("Previous cycle still running, dropping tick");
            } else {
                let arena = self.clone();
                tokio::spawn(async move {
                    match arena.run_cycle().await {
                        Ok(()) => {
                            let failed = arena.consecutive_errors.swap(0, Ordering::Relaxed);
                            if failed > 0 {
                                info!(after_failures = failed, "Cycle recovered");
                            }
                        }
                        Err(err) => {
                            let n = arena.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
                            if n <= ERROR_LOG_BURST || n % ERROR_LOG_EVERY == 0 {
                                warn!(consecutive = n, error = %err, "Cycle failed");
                            }
                        }
                    }
                    arena.cycle_busy.store(false, Ordering::Relaxed);
                });
            }

            // Chunked sleep so stop() takes effect within ~500ms
            for _ in 0..(self.config.cycle_secs * 2) {
                if !self.live(epoch) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
        info!("Cycle loop down");
    }

    async fn run_persist(self: Arc<Self>, epoch: u64) {
        loop {
            for _ in 0..(self.config.persist_secs * 2) {
                if !self.live(epoch) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            // Persistence failures never interrupt trading
            if let Err(err) = self.persist().await {
                warn!(error = %err, "Persist failed, trading continues");
            }
        }
    }

    // ==================== THE CYCLE ====================

    /// One trading pass over the whole population: close, cull, breed, open.
    pub async fn run_cycle(&self) -> Result<()> {
        let symbols = self.tracked_symbols();
        let snapshots = self.pool.snapshot_all(&symbols).await;
        if snapshots.is_empty() {
            anyhow::bail!("no market data this cycle");
        }
        let by_symbol: HashMap<String, MarketSnapshot> = snapshots
            .into_iter()
            .map(|s| (s.symbol.clone(), s))
            .collect();

        let mut archived: Vec<SessionRecord> = Vec::new();
        {
            let mut state = self.state.write().unwrap();
            state.cycle += 1;
            let cycle = state.cycle;

            for i in 0..state.bots.len() {
                let closed = position::monitor(&mut state.bots[i], &by_symbol, cycle);
                for trade in &closed {
                    info!(
                        bot = %state.bots[i].name(),
                        symbol = %trade.symbol,
                        pnl = trade.pnl_value,
                        reason = ?trade.reason,
                        bankroll = round2(state.bots[i].bankroll),
                        "Position closed"
                    );
                }

                if state.bots[i].bankroll <= 0.0 {
                    archived.push(Self::handle_bankruptcy(&mut state, i));
                    continue;
                }
                if state.bots[i].bankroll >= GOAL_BANKROLL {
                    archived.extend(Self::handle_goal(&mut state, i));
                    continue;
                }

                for snapshot in by_symbol.values() {
                    if !state.bots[i].genome.symbols.contains(&snapshot.symbol) {
                        continue;
                    }
                    let decision = match consensus::evaluate(&state.bots[i].genome, snapshot) {
                        Some(decision) => decision,
                        None => continue,
                    };
                    if position::open(&mut state.bots[i], snapshot, &decision, cycle) {
                        info!(
                            bot = %state.bots[i].name(),
                            symbol = %snapshot.symbol,
                            side = ?decision.direction,
                            confidence = round2(decision.confidence),
                            "Position opened"
                        );
                    }
                }
            }

            if cycle % EVOLUTION_INTERVAL == 0 {
                if let Some(record) = Self::periodic_evolution(&mut state) {
                    archived.push(record);
                }
            }
        }

        self.archive_sessions(&archived).await;
        Ok(())
    }

    /// Union of every genome's symbol list, first-seen order
    fn tracked_symbols(&self) -> Vec<String> {
        let state = self.state.read().unwrap();
        let mut seen = HashSet::new();
        let mut symbols = Vec::new();
        for bot in &state.bots {
            for symbol in &bot.genome.symbols {
                if seen.insert(symbol.clone()) {
                    symbols.push(symbol.clone());
                }
            }
        }
        symbols
    }

    // ==================== EVOLUTION ====================

    /// A bankrupt bot is replaced on the spot by a child of the strongest
    /// living peers; with no peer worth copying, its own genome is mutated
    /// and sent back in. Every breeding event advances the arena generation.
    fn handle_bankruptcy(state: &mut ArenaState, i: usize) -> SessionRecord {
        let record = state.bots[i].session_record(SessionEnd::Bankrupt);
        let death_count = state.bots[i].death_count + 1;
        state.generation += 1;
        warn!(
            bot = %state.bots[i].name(),
            deaths = death_count,
            trades = state.bots[i].trades,
            generation = state.generation,
            "Bankrupt, breeding replacement"
        );

        let mut peers: Vec<(usize, f64)> = state
            .bots
            .iter()
            .enumerate()
            .filter(|(j, bot)| *j != i && bot.bankroll > 0.0)
            .map(|(j, bot)| (j, bot.fitness()))
            .collect();
        peers.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut rng = rand::thread_rng();
        let id = format!("reborn-gen{}-c{}-s{}", state.generation, state.cycle, i);
        let name = name_for_generation(state.generation).to_string();
        let child = match (peers.first(), peers.get(1)) {
            (Some(&(best, best_fit)), Some(&(second, _))) if best_fit > 0.0 => evolution::breed_child(
                &state.bots[best].genome,
                Some(&state.bots[second].genome),
                id,
                name,
                state.generation,
                &mut rng,
            ),
            (Some(&(best, best_fit)), None) if best_fit > 0.0 => evolution::breed_child(
                &state.bots[best].genome,
                None,
                id,
                name,
                state.generation,
                &mut rng,
            ),
            _ => evolution::breed_child(
                &state.bots[i].genome,
                None,
                id,
                name,
                state.generation,
                &mut rng,
            ),
        };

        let mut replacement = BotState::new(child);
        replacement.death_count = death_count;
        state.bots[i] = replacement;
        record
    }

    /// Goal reached: a new generation begins. The winner enters the hall of
    /// fame and restarts from the line (unless it is the sharpe elite, which
    /// keeps its bankroll), and the weakest peer is replaced by a child of
    /// the winner.
    fn handle_goal(state: &mut ArenaState, winner: usize) -> Vec<SessionRecord> {
        let mut archived = Vec::new();
        state.generation += 1;
        let generation = state.generation;
        info!(
            bot = %state.bots[winner].name(),
            bankroll = round2(state.bots[winner].bankroll),
            generation,
            "Goal reached, next generation begins"
        );

        // Best sharpe with enough history keeps its seat no matter what
        let elite = state
            .bots
            .iter()
            .enumerate()
            .filter(|(_, bot)| bot.trades >= 5)
            .max_by(|a, b| {
                a.1.sharpe()
                    .partial_cmp(&b.1.sharpe())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(j, _)| j);

        state.hall_of_fame.record(&state.bots[winner]);
        archived.push(state.bots[winner].session_record(SessionEnd::GoalReached));

        let worst = state
            .bots
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != winner && Some(*j) != elite)
            .fold(None::<(usize, f64)>, |lowest, (j, bot)| match lowest {
                Some((_, low)) if low <= bot.bankroll => lowest,
                _ => Some((j, bot.bankroll)),
            })
            .map(|(j, _)| j);

        let second = state
            .bots
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != winner)
            .max_by(|a, b| {
                a.1.bankroll
                    .partial_cmp(&b.1.bankroll)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(j, _)| j);

        if let Some(worst_idx) = worst {
            let mut rng = rand::thread_rng();
            let id = format!("offspring-gen{}-c{}-s{}", generation, state.cycle, worst_idx);
            let name = name_for_generation(generation).to_string();
            let second_genome = second.map(|j| state.bots[j].genome.clone());
            let child = evolution::breed_child(
                &state.bots[winner].genome,
                second_genome.as_ref(),
                id,
                name,
                generation,
                &mut rng,
            );
            info!(
                replaced = %state.bots[worst_idx].name(),
                child = %child.name,
                "Weakest bot evolved out"
            );
            archived.push(state.bots[worst_idx].session_record(SessionEnd::EvolvedOut));
            state.bots[worst_idx] = BotState::new(child);
        }

        if elite == Some(winner) {
            info!(bot = %state.bots[winner].name(), "Winner is the elite, keeps its bankroll");
        } else {
            state.bots[winner].reset_for_new_session();
        }
        archived
    }

    /// Every [`EVOLUTION_INTERVAL`] cycles the weakest bot is replaced by a
    /// child of the strongest, unless there is nothing worth learning yet.
    fn periodic_evolution(state: &mut ArenaState) -> Option<SessionRecord> {
        let mut ranked: Vec<(usize, f64)> = state
            .bots
            .iter()
            .enumerate()
            .map(|(j, bot)| (j, bot.fitness()))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let &(best, best_fit) = ranked.first()?;
        let &(worst, _) = ranked.last()?;
        if best == worst {
            return None;
        }
        // Proceed only when the best has proven itself, or the worst has sat
        // idle for a whole interval
        if best_fit <= 0.0 && state.bots[worst].trades > 0 {
            return None;
        }

        state.generation += 1;
        state.hall_of_fame.record(&state.bots[best]);

        let mut rng = rand::thread_rng();
        let id = format!("evolved-gen{}-c{}-s{}", state.generation, state.cycle, worst);
        let name = name_for_generation(state.generation).to_string();
        let second = ranked.get(1).map(|&(j, _)| state.bots[j].genome.clone());
        let child = if best_fit > 0.0 {
            evolution::breed_child(
                &state.bots[best].genome,
                second.as_ref(),
                id,
                name,
                state.generation,
                &mut rng,
            )
        } else {
            evolution::breed_child(
                &state.bots[best].genome,
                None,
                id,
                name,
                state.generation,
                &mut rng,
            )
        };

        info!(
            replaced = %state.bots[worst].name(),
            parent = %state.bots[best].name(),
            fitness = round2(best_fit),
            "Periodic evolution"
        );
        let record = state.bots[worst].session_record(SessionEnd::EvolvedOut);
        state.bots[worst] = BotState::new(child);
        Some(record)
    }

    // ==================== PERSISTENCE ====================

    /// Serialize the arena and write it to the snapshot slot
    pub async fn persist(&self) -> Result<()> {
        let db = match &self.db {
            Some(pool) => pool,
            None => return Ok(()),
        };
        let (generation, cycle, state_json) = {
            let state = self.state.read().unwrap();
            let snapshot = ArenaSnapshot {
                generation: state.generation,
                cycle: state.cycle,
                saved_at: Utc::now().timestamp_millis(),
                bots: state.bots.iter().map(PersistedBot::from).collect(),
                hall_of_fame: state.hall_of_fame.clone(),
            };
            (
                state.generation,
                state.cycle,
                serde_json::to_string(&snapshot)?,
            )
        };

        SnapshotRepository::new(db)
            .save(generation as i64, cycle as i64, &state_json)
            .await
            .map_err(|e| anyhow::anyhow!("snapshot save failed: {e}"))?;
        debug!(cycle, bytes = state_json.len(), "Arena state persisted");
        Ok(())
    }

    /// Write session records to the archive; failures are logged, never fatal
    async fn archive_sessions(&self, records: &[SessionRecord]) {
        let db = match &self.db {
            Some(pool) => pool,
            None => return,
        };
        if records.is_empty() {
            return;
        }
        let repo = SessionRepository::new(db);
        for record in records {
            match session_row(record) {
                Ok(row) => {
                    if let Err(err) = repo.insert(&row).await {
                        warn!(session = %record.session_id, error = %err, "Session archive failed");
                    }
                }
                Err(err) => {
                    warn!(session = %record.session_id, error = %err, "Session serialize failed");
                }
            }
        }
    }

    // ==================== QUERIES ====================

    /// Full per-bot detail for the dashboard
    pub fn status(&self) -> serde_json::Value {
        let state = self.state.read().unwrap();
        let bots: Vec<serde_json::Value> = state
            .bots
            .iter()
            .map(|bot| {
                json!({
                    "id": bot.id(),
                    "name": bot.name(),
                    "generation": bot.genome.generation,
                    "alive": bot.alive,
                    "bankroll": round2(bot.bankroll),
                    "exposure": round2(bot.exposure),
                    "goal_progress_pct": round2(bot.bankroll / GOAL_BANKROLL * 100.0),
                    "trades": bot.trades,
                    "wins": bot.wins,
                    "losses": bot.losses,
                    "win_rate": round2(bot.win_rate() * 100.0),
                    "current_bet_pct": round2(bot.current_bet_pct),
                    "consecutive_wins": bot.consecutive_wins,
                    "consecutive_losses": bot.consecutive_losses,
                    "max_drawdown_pct": round2(bot.max_drawdown_pct),
                    "fitness": round2(bot.fitness()),
                    "sharpe": round2(bot.sharpe()),
                    "sortino": round2(bot.sortino()),
                    "profit_factor": round2(bot.profit_factor()),
                    "death_count": bot.death_count,
                    "session_id": bot.session_id,
                    "active_strategies": bot.genome.active_strategies(),
                    "symbols": bot.genome.symbols,
                    "consensus": {
                        "min_agreeing": bot.genome.consensus.min_agreeing,
                        "max_opposing": bot.genome.consensus.max_opposing,
                        "min_weighted_strength": bot.genome.consensus.min_weighted_strength,
                    },
                    "risk": {
                        "leverage": bot.genome.risk.leverage,
                        "atr_tp_mult": bot.genome.risk.atr_tp_mult,
                        "atr_sl_mult": bot.genome.risk.atr_sl_mult,
                        "trailing_stop_atr": bot.genome.risk.trailing_stop_atr,
                    },
                    "positions": bot.positions,
                    "recent_trades": bot.trade_history.iter().rev().take(5).collect::<Vec<_>>(),
                })
            })
            .collect();

        json!({
            "running": self.is_running(),
            "generation": state.generation,
            "cycle": state.cycle,
            "bot_count": state.bots.len(),
            "pool_size": self.pool.cache_size(),
            "initial_bankroll": INITIAL_BANKROLL,
            "goal_bankroll": GOAL_BANKROLL,
            "bots": bots,
        })
    }

    /// Bots ranked by bankroll
    pub fn leaderboard(&self) -> serde_json::Value {
        let state = self.state.read().unwrap();
        let mut ranked: Vec<&BotState> = state.bots.iter().collect();
        ranked.sort_by(|a, b| {
            b.bankroll
                .partial_cmp(&a.bankroll)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let rows: Vec<serde_json::Value> = ranked
            .iter()
            .enumerate()
            .map(|(i, bot)| {
                json!({
                    "rank": i + 1,
                    "id": bot.id(),
                    "name": bot.name(),
                    "generation": bot.genome.generation,
                    "bankroll": round2(bot.bankroll),
                    "goal_progress_pct": round2(bot.bankroll / GOAL_BANKROLL * 100.0),
                    "fitness": round2(bot.fitness()),
                    "sharpe": round2(bot.sharpe()),
                    "win_rate": round2(bot.win_rate() * 100.0),
                    "trades": bot.trades,
                    "death_count": bot.death_count,
                    "active_strategies": bot.genome.active_strategies(),
                    "consensus": {
                        "min_agreeing": bot.genome.consensus.min_agreeing,
                        "max_opposing": bot.genome.consensus.max_opposing,
                    },
                })
            })
            .collect();

        json!({
            "generation": state.generation,
            "cycle": state.cycle,
            "bots": rows,
        })
    }

    /// Arena-wide aggregates, best performers and the hall of fame
    pub fn stats(&self) -> serde_json::Value {
        let state = self.state.read().unwrap();

        let total_trades: u32 = state.bots.iter().map(|b| b.trades).sum();
        let total_wins: u32 = state.bots.iter().map(|b| b.wins).sum();
        let total_losses: u32 = state.bots.iter().map(|b| b.losses).sum();
        let combined_bankroll: f64 = state.bots.iter().map(|b| b.bankroll).sum();
        let combined_pnl: f64 = state
            .bots
            .iter()
            .map(|b| b.bankroll - b.initial_bankroll)
            .sum();
        let total_deaths: u32 = state.bots.iter().map(|b| b.death_count).sum();
        let overall_win_rate = if total_trades > 0 {
            round2(total_wins as f64 / total_trades as f64 * 100.0)
        } else {
            0.0
        };

        let mut take_profit = 0u32;
        let mut stop_loss = 0u32;
        let mut trailing_stop = 0u32;
        let mut signal_flip = 0u32;
        for bot in &state.bots {
            for trade in &bot.trade_history {
                match trade.reason {
                    CloseReason::TakeProfit => take_profit += 1,
                    CloseReason::StopLoss => stop_loss += 1,
                    CloseReason::TrailingStop => trailing_stop += 1,
                    CloseReason::SignalFlip => signal_flip += 1,
                }
            }
        }

        let summary = |bot: &BotState, value: f64| {
            json!({
                "id": bot.id(),
                "name": bot.name(),
                "value": round2(value),
            })
        };
        let best_by = |min_trades: u32, metric: &dyn Fn(&BotState) -> f64| {
            state
                .bots
                .iter()
                .filter(|b| b.trades >= min_trades)
                .max_by(|a, b| {
                    metric(a)
                        .partial_cmp(&metric(b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|b| summary(b, metric(b)))
        };

        json!({
            "running": self.is_running(),
            "generation": state.generation,
            "cycle": state.cycle,
            "uptime_minutes": (Utc::now().timestamp_millis() - self.started_at) / 60_000,
            "totals": {
                "trades": total_trades,
                "wins": total_wins,
                "losses": total_losses,
                "win_rate": overall_win_rate,
                "combined_bankroll": round2(combined_bankroll),
                "avg_bankroll": round2(combined_bankroll / state.bots.len().max(1) as f64),
                "combined_pnl": round2(combined_pnl),
                "deaths": total_deaths,
            },
            "close_reasons": {
                "take_profit": take_profit,
                "stop_loss": stop_loss,
                "trailing_stop": trailing_stop,
                "signal_flip": signal_flip,
            },
            "best": {
                "sharpe": best_by(3, &|b| b.sharpe()),
                "win_rate": best_by(3, &|b| b.win_rate() * 100.0),
                "fitness": best_by(3, &|b| b.fitness()),
                "bankroll": best_by(0, &|b| b.bankroll),
            },
            "elite": best_by(5, &|b| b.sharpe()),
            "hall_of_fame": state.hall_of_fame.top(10),
        })
    }

    pub fn hall_of_fame(&self) -> serde_json::Value {
        let state = self.state.read().unwrap();
        json!({
            "entries": state.hall_of_fame.entries(),
            "total": state.hall_of_fame.len(),
        })
    }
}

fn session_row(record: &SessionRecord) -> serde_json::Result<SessionRow> {
    Ok(SessionRow {
        id: None,
        session_id: record.session_id.clone(),
        bot_id: record.bot_id.clone(),
        bot_name: record.bot_name.clone(),
        generation: record.generation as i64,
        genome_json: serde_json::to_string(&record.genome)?,
        start_bankroll: record.start_bankroll,
        end_bankroll: record.end_bankroll,
        peak_bankroll: record.peak_bankroll,
        trades: record.trades as i64,
        wins: record.wins as i64,
        losses: record.losses as i64,
        win_rate: record.win_rate,
        max_drawdown_pct: record.max_drawdown_pct,
        fitness: record.fitness,
        death_count: record.death_count as i64,
        end_reason: record.end_reason.as_str().to_string(),
        started_at: record.started_at,
        ended_at: record.ended_at,
        trades_json: Some(serde_json::to_string(&record.recent_trades)?),
        active_strategies_json: Some(serde_json::to_string(&record.active_strategies)?),
    })
}
