//! Evolution Arena Engine — competing trading bots bred by survival
//!
//! Five genome-driven bots paper-trade the same market on simulated
//! leveraged futures. Provides:
//! - 30-strategy signal pool over live Binance candles
//! - Genome-weighted consensus voting and ATR bracket risk management
//! - Three evolution paths: bankruptcy, periodic pressure, goal reached
//! - Crash-safe state snapshots and a session archive via SQLite

pub mod api;
pub mod arena;
pub mod bot;
pub mod consensus;
pub mod evolution;
pub mod genome;
pub mod indicators;
pub mod position;
pub mod signal_pool;
pub mod stats;
pub mod strategies;
pub mod types;

// Re-exports for convenience
pub use api::{BinanceFuturesClient, MarketData};
pub use arena::{Arena, ArenaConfig, ArenaSnapshot, EVOLUTION_INTERVAL};
pub use bot::{BotState, SessionRecord, TradeRecord, GOAL_BANKROLL, INITIAL_BANKROLL};
pub use consensus::TradeDecision;
pub use evolution::{crossover, mutate, HallOfFame, HallOfFameEntry};
pub use genome::{genesis_genomes, Genome, DEFAULT_SYMBOLS};
pub use signal_pool::SignalPool;
pub use types::*;
