//! # Database Migrations
//!
//! Embedded SQL migrations for Kasir.
//!
//! ```text
//! Database::new ──► _sqlx_migrations ──► run pending files in order
//!                        │
//!                        ├── 001_initial_schema.sql ✓
//!                        └── 00N_....sql            ⬜ new, runs now
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create `migrations/sqlite/NNN_description.sql` with the next number
//! 2. Use `IF NOT EXISTS` where possible
//! 3. **NEVER** modify an applied migration; add a new one

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations embedded from `migrations/sqlite` at compile time.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations. Safe to call repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// `(total, applied)` migration counts, for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
