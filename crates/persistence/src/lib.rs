//! Persistence layer for the evolution arena
//!
//! Provides SQLite storage for arena state snapshots (crash recovery) and
//! the archive of completed bot sessions.

pub mod repository;
pub mod schema;

pub use sqlx::sqlite::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        db.configure_pragmas().await?;

        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub async fn in_memory() -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        db.configure_pragmas().await?;

        Ok(db)
    }

    /// Create all tables and indexes (execute each statement individually)
    async fn run_migrations(&self) -> DbResult<()> {
        for statement in schema::CREATE_TABLES.split(';') {
            // Strip comment-only lines, then check if any SQL remains
            let sql: String = statement
                .lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");
            let sql = sql.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DbError::Migration(format!("{e}: {sql}")))?;
        }

        Ok(())
    }

    /// Configure SQLite pragmas for optimal performance
    async fn configure_pragmas(&self) -> DbResult<()> {
        // WAL keeps reads open while the periodic persist writes;
        // cache is 8 MB (negative = KiB).
        for pragma in [
            "PRAGMA journal_mode=WAL",
            "PRAGMA synchronous=NORMAL",
            "PRAGMA foreign_keys=ON",
            "PRAGMA cache_size=-8000",
        ] {
            sqlx::query(pragma)
                .execute(&self.pool)
                .await
                .map_err(|e| DbError::Connection(format!("{pragma} failed: {e}")))?;
        }

        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Clone the pool for use in spawned tasks
    pub fn pool_clone(&self) -> SqlitePool {
        self.pool.clone()
    }
}
