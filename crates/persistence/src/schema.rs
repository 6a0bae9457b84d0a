//! Database schema definitions

/// SQL to create all tables
/// NOTE: Genomes, trade tails and strategy lists are stored as serialized
/// JSON blobs; scalar money fields are REAL (f64 end to end).
pub const CREATE_TABLES: &str = r#"
-- Latest arena state (single slot, overwritten on every persist)
CREATE TABLE IF NOT EXISTS arena_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slot TEXT NOT NULL UNIQUE,
    generation INTEGER NOT NULL,
    cycle INTEGER NOT NULL,
    state_json TEXT NOT NULL,
    saved_at INTEGER NOT NULL
);

-- Archive of completed bot sessions (bankruptcy, goal, evolution, shutdown)
CREATE TABLE IF NOT EXISTS bot_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL UNIQUE,
    bot_id TEXT NOT NULL,
    bot_name TEXT NOT NULL,
    generation INTEGER NOT NULL DEFAULT 1,
    genome_json TEXT NOT NULL,
    start_bankroll REAL NOT NULL DEFAULT 0,
    end_bankroll REAL NOT NULL DEFAULT 0,
    peak_bankroll REAL NOT NULL DEFAULT 0,
    trades INTEGER NOT NULL DEFAULT 0,
    wins INTEGER NOT NULL DEFAULT 0,
    losses INTEGER NOT NULL DEFAULT 0,
    win_rate REAL NOT NULL DEFAULT 0,
    max_drawdown_pct REAL NOT NULL DEFAULT 0,
    fitness REAL NOT NULL DEFAULT 0,
    death_count INTEGER NOT NULL DEFAULT 0,
    end_reason TEXT NOT NULL,
    started_at INTEGER NOT NULL DEFAULT 0,
    ended_at INTEGER NOT NULL DEFAULT 0,
    trades_json TEXT,
    active_strategies_json TEXT
);

-- ========== INDEXES ==========

-- Session archive indexes
CREATE INDEX IF NOT EXISTS idx_sessions_bot ON bot_sessions(bot_id);
CREATE INDEX IF NOT EXISTS idx_sessions_ended ON bot_sessions(ended_at DESC);
CREATE INDEX IF NOT EXISTS idx_sessions_reason ON bot_sessions(end_reason)
"#;
