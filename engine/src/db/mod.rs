/// Database module for SQLite persistence
///
/// This module provides database operations for memory entries and pipeline
/// task records. It uses sqlx with parameterized queries and WAL mode for
/// better concurrency.
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub mod trace;

pub use trace::TraceRepository;

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Enable WAL mode for better concurrency
    /// 3. Run migrations to set up the schema
    ///
    /// SQLite with WAL mode automatically recovers from unclean shutdowns
    /// when the database is reopened. During graceful shutdown, call
    /// `flush_wal()` or `close()` to checkpoint the WAL.
    pub async fn new(db_path: &Path) -> Result<Self> {
        info!("Initializing database at: {}", db_path.display());

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        // Configure SQLite connection with WAL mode
        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .disable_statement_logging();

        // Create connection pool
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!("Database connection established");

        let db = Self { pool };

        // Run migrations
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    ///
    /// Migrations are idempotent and can be run multiple times safely.
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::raw_sql(include_str!("../../migrations/001_initial.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 001_initial.sql")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get a reference to the connection pool
    ///
    /// This allows other modules to execute queries against the database.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Flush the WAL to disk
    ///
    /// This should be called during graceful shutdown to ensure all
    /// pending writes are persisted to the database file.
    pub async fn flush_wal(&self) -> Result<()> {
        info!("Flushing WAL to disk");

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to flush WAL")?;

        debug!("WAL flushed successfully");
        Ok(())
    }

    /// Close the database connection
    ///
    /// This flushes the WAL and closes all connections in the pool.
    /// Should be called during shutdown.
    pub async fn close(self) -> Result<()> {
        info!("Closing database connection");

        // Flush WAL before closing
        self.flush_wal().await?;

        // Close the pool
        self.pool.close().await;

        info!("Database connection closed");
        Ok(())
    }

    /// Create a pipeline trace repository
    pub fn traces(&self) -> TraceRepository {
        TraceRepository::new(self.pool.clone())
    }
}
