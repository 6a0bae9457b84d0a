//! Snapshot repository for arena crash recovery
//!
//! The arena persists its full in-memory state as one JSON document on a
//! fixed interval. Only the latest document is kept: every save overwrites
//! the single `latest` slot, and boot reads that slot back (or starts fresh
//! when it is missing or stale).

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted arena state document
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SnapshotRecord {
    pub id: i64,
    pub slot: String,
    pub generation: i64,
    pub cycle: i64,
    pub state_json: String,
    pub saved_at: i64,
}

/// Repository for arena state snapshots
pub struct SnapshotRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SnapshotRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Save the latest arena state (upsert into the single `latest` slot)
    pub async fn save(&self, generation: i64, cycle: i64, state_json: &str) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO arena_snapshots (slot, generation, cycle, state_json, saved_at)
               VALUES ('latest', ?1, ?2, ?3, strftime('%s', 'now'))
               ON CONFLICT(slot) DO UPDATE SET
                 generation = excluded.generation,
                 cycle = excluded.cycle,
                 state_json = excluded.state_json,
                 saved_at = excluded.saved_at"#,
        )
        .bind(generation)
        .bind(cycle)
        .bind(state_json)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Load the most recently saved snapshot, if any
    pub async fn load_latest(&self) -> DbResult<Option<SnapshotRecord>> {
        let record = sqlx::query_as::<_, SnapshotRecord>(
            "SELECT * FROM arena_snapshots ORDER BY saved_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Delete all stored snapshots (arena reset)
    pub async fn clear(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM arena_snapshots")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
