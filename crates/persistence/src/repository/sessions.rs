//! Session repository for the bot lifecycle archive
//!
//! Every bot session that ends (bankruptcy, goal reached, evolved out,
//! shutdown) is archived here with its genome and a tail of recent trades,
//! so past lives stay queryable after the arena moves on.

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A fully archived bot session, including JSON blobs
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    pub id: Option<i64>,
    pub session_id: String,
    pub bot_id: String,
    pub bot_name: String,
    pub generation: i64,
    pub genome_json: String,
    pub start_bankroll: f64,
    pub end_bankroll: f64,
    pub peak_bankroll: f64,
    pub trades: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: f64,
    pub max_drawdown_pct: f64,
    pub fitness: f64,
    pub death_count: i64,
    pub end_reason: String,
    pub started_at: i64,
    pub ended_at: i64,
    pub trades_json: Option<String>,
    pub active_strategies_json: Option<String>,
}

/// Summary projection for session listings (no JSON blobs)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionSummaryRow {
    pub id: Option<i64>,
    pub session_id: String,
    pub bot_id: String,
    pub bot_name: String,
    pub generation: i64,
    pub start_bankroll: f64,
    pub end_bankroll: f64,
    pub peak_bankroll: f64,
    pub trades: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: f64,
    pub max_drawdown_pct: f64,
    pub fitness: f64,
    pub death_count: i64,
    pub end_reason: String,
    pub started_at: i64,
    pub ended_at: i64,
}

/// Repository for archived bot sessions
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Archive a completed session (replace by session_id).
    ///
    /// A session restored from a snapshot keeps its id, so a later shutdown
    /// re-archives it; the newest version of the record wins.
    pub async fn insert(&self, row: &SessionRow) -> DbResult<i64> {
        let result = sqlx::query(
            r#"INSERT OR REPLACE INTO bot_sessions
                (session_id, bot_id, bot_name, generation, genome_json,
                 start_bankroll, end_bankroll, peak_bankroll,
                 trades, wins, losses, win_rate, max_drawdown_pct, fitness,
                 death_count, end_reason, started_at, ended_at,
                 trades_json, active_strategies_json)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                       ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"#,
        )
        .bind(&row.session_id)
        .bind(&row.bot_id)
        .bind(&row.bot_name)
        .bind(row.generation)
        .bind(&row.genome_json)
        .bind(row.start_bankroll)
        .bind(row.end_bankroll)
        .bind(row.peak_bankroll)
        .bind(row.trades)
        .bind(row.wins)
        .bind(row.losses)
        .bind(row.win_rate)
        .bind(row.max_drawdown_pct)
        .bind(row.fitness)
        .bind(row.death_count)
        .bind(&row.end_reason)
        .bind(row.started_at)
        .bind(row.ended_at)
        .bind(&row.trades_json)
        .bind(&row.active_strategies_json)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// List recent sessions, newest first
    pub async fn list(&self, limit: i64) -> DbResult<Vec<SessionSummaryRow>> {
        let rows = sqlx::query_as::<_, SessionSummaryRow>(
            r#"SELECT id, session_id, bot_id, bot_name, generation,
                      start_bankroll, end_bankroll, peak_bankroll,
                      trades, wins, losses, win_rate, max_drawdown_pct, fitness,
                      death_count, end_reason, started_at, ended_at
               FROM bot_sessions
               ORDER BY ended_at DESC, id DESC
               LIMIT ?1"#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Fetch one session with its genome and trade tail
    pub async fn get(&self, session_id: &str) -> DbResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM bot_sessions WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Total number of archived sessions
    pub async fn count(&self) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bot_sessions")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn sample_row(session_id: &str, ended_at: i64) -> SessionRow {
        SessionRow {
            id: None,
            session_id: session_id.to_string(),
            bot_id: "alpha-gen1".to_string(),
            bot_name: "Hydra".to_string(),
            generation: 1,
            genome_json: r#"{"id":"alpha-gen1"}"#.to_string(),
            start_bankroll: 100.0,
            end_bankroll: 0.0,
            peak_bankroll: 140.0,
            trades: 12,
            wins: 5,
            losses: 7,
            win_rate: 41.67,
            max_drawdown_pct: 100.0,
            fitness: 18.5,
            death_count: 2,
            end_reason: "BANKRUPT".to_string(),
            started_at: 1_700_000_000,
            ended_at,
            trades_json: Some("[]".to_string()),
            active_strategies_json: Some(r#"["rsi_momentum"]"#.to_string()),
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let repo = SessionRepository::new(db.pool());

        repo.insert(&sample_row("alpha-gen1-session-1", 1_700_000_500))
            .await
            .unwrap();

        let row = repo.get("alpha-gen1-session-1").await.unwrap().unwrap();
        assert_eq!(row.bot_name, "Hydra");
        assert_eq!(row.end_reason, "BANKRUPT");
        assert_eq!(row.trades, 12);
        assert_eq!(row.genome_json, r#"{"id":"alpha-gen1"}"#);
        assert_eq!(row.active_strategies_json.as_deref(), Some(r#"["rsi_momentum"]"#));

        assert!(repo.get("missing-session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reinsert_replaces_by_session_id() {
        let db = Database::in_memory().await.unwrap();
        let repo = SessionRepository::new(db.pool());

        repo.insert(&sample_row("alpha-gen1-session-1", 1_700_000_500))
            .await
            .unwrap();

        let mut updated = sample_row("alpha-gen1-session-1", 1_700_001_000);
        updated.end_bankroll = 55.0;
        updated.end_reason = "STOPPED".to_string();
        repo.insert(&updated).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        let row = repo.get("alpha-gen1-session-1").await.unwrap().unwrap();
        assert_eq!(row.end_bankroll, 55.0);
        assert_eq!(row.end_reason, "STOPPED");
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let db = Database::in_memory().await.unwrap();
        let repo = SessionRepository::new(db.pool());

        repo.insert(&sample_row("s-oldest", 100)).await.unwrap();
        repo.insert(&sample_row("s-newest", 300)).await.unwrap();
        repo.insert(&sample_row("s-middle", 200)).await.unwrap();

        let rows = repo.list(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].session_id, "s-newest");
        assert_eq!(rows[1].session_id, "s-middle");
    }
}
