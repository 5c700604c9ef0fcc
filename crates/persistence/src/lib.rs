//! Persistence layer for saved backtest runs
//!
//! SQLite storage for run history. Records hold plain strings and JSON so the
//! crate stays independent of the engine types.

pub mod repository;
pub mod schema;

pub use sqlx::sqlite::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Schema setup error: {0}")]
    Migration(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Run history database
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file at `path`, creating parent directories
    pub async fn new(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();

        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| DbError::Connection(format!("{}: {e}", dir.display())))?;
        }

        Self::open(&format!("sqlite:{}?mode=rwc", path.display()), 5).await
    }

    /// Single-connection in-memory database, used by tests
    pub async fn in_memory() -> DbResult<Self> {
        Self::open("sqlite::memory:", 1).await
    }

    async fn open(url: &str, max_connections: u32) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| DbError::Connection(format!("{url}: {e}")))?;

        let db = Self { pool };
        db.create_schema().await?;
        db.set_pragma("journal_mode", "WAL").await?;
        db.set_pragma("synchronous", "NORMAL").await?;

        debug!(url, "Run history database ready");
        Ok(db)
    }

    /// Execute each schema statement on its own; comment lines are skipped
    async fn create_schema(&self) -> DbResult<()> {
        let statements = schema::CREATE_TABLES.split(';').map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
        });

        for sql in statements {
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

    async fn set_pragma(&self, name: &str, value: &str) -> DbResult<()> {
        sqlx::query(&format!("PRAGMA {name}={value}"))
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::Connection(format!("{name} pragma failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
