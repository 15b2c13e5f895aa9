//! # Schema Migrations
//!
//! The files under `migrations/sqlite/` are compiled into the binary and
//! applied in order on open. Applied files are recorded in
//! `_sqlx_migrations`; a file that changes after release makes every
//! existing store refuse to open, so schema changes always go in a new
//! `NNN_*.sql` file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration the store has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (known, applied) = migration_status(pool).await?;
    if applied >= known {
        debug!(known, "Schema up to date");
        return Ok(());
    }

    info!(pending = known - applied, "Applying schema migrations");
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// `(embedded, applied)` migration counts. A fresh store reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let known = MIGRATOR.iter().count();

    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    Ok((known, applied.max(0) as usize))
}
