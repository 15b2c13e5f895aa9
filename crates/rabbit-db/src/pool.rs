//! # Opening the Store
//!
//! One [`Database`] per process. Every repository borrows its pool.
//!
//! ```text
//! DbConfig::new(path)                   DbConfig::in_memory()
//!        │                                      │
//!        └──────────────┬───────────────────────┘
//!                       ▼
//!            Database::new(config)
//!              1. connect (WAL, foreign keys on, busy timeout)
//!              2. migrate            (unless disabled)
//!              3. purge expired share links (unless disabled)
//!                       │
//!                       ▼
//!   tabs() items() rabbits() assignments() profiles() share_links()
//! ```
//!
//! Foreign keys must be on for every connection: deleting an item or a
//! rabbit relies on the cascade to drop its assignment rows.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::assignment::AssignmentRepository;
use crate::repository::item::ItemRepository;
use crate::repository::profile::ProfileRepository;
use crate::repository::rabbit::RabbitRepository;
use crate::repository::share::ShareLinkRepository;
use crate::repository::tab::TabRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the store.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("rabbit.db").pool_size(2)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first open. `:memory:` for a throwaway store.
    pub database_path: PathBuf,

    /// Upper bound on pooled connections. Default: 4
    pub pool_size: u32,

    /// How long to wait for a free connection. Default: 10 seconds
    pub acquire_timeout: Duration,

    /// How long a writer waits on a locked database before failing.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    pub run_migrations: bool,

    /// Drop share links whose TTL has passed while opening.
    pub purge_expired_shares: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            pool_size: 4,
            acquire_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            purge_expired_shares: true,
        }
    }

    /// Private in-memory store for tests and demos.
    ///
    /// Each SQLite connection to `:memory:` gets its own database, so the
    /// pool is pinned to one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            pool_size: 1,
            acquire_timeout: Duration::from_secs(5),
            purge_expired_shares: false,
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size.max(1);
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the store. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the store described by `config`.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), pool_size = config.pool_size, "Opening database");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool_size)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            // an idle in-memory connection takes its data with it
            .idle_timeout(if config.is_memory() { None } else { Some(Duration::from_secs(600)) })
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };

        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }

        if config.purge_expired_shares {
            match db.share_links().purge_expired().await {
                Ok(0) => {}
                Ok(count) => info!(count, "Removed expired share links"),
                Err(e) => warn!(error = %e, "Could not purge expired share links"),
            }
        }

        debug!("Database ready");
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tabs(&self) -> TabRepository {
        TabRepository::new(self.pool.clone())
    }

    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.pool.clone())
    }

    pub fn rabbits(&self) -> RabbitRepository {
        RabbitRepository::new(self.pool.clone())
    }

    pub fn assignments(&self) -> AssignmentRepository {
        AssignmentRepository::new(self.pool.clone())
    }

    pub fn profiles(&self) -> ProfileRepository {
        ProfileRepository::new(self.pool.clone())
    }

    pub fn share_links(&self) -> ShareLinkRepository {
        ShareLinkRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }

    /// True if the store answers a trivial query.
    pub async fn is_reachable(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
