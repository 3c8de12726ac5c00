//! Database lifecycle management for Bazaar.
//!
//! Provides migration running, status checking, and catalog seeding.

mod init;

pub use init::{load_seed_file, seed_catalog, SeedProduct};

use sqlx::{PgPool, Row};
use tracing::{info, warn};

/// Result type for DB operations.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Run all pending migrations.
///
/// Idempotent: safe to run multiple times.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("../migrations").run(pool).await?;

    info!("Migrations completed successfully");
    Ok(())
}

/// One row of `_sqlx_migrations`.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    pub version: i64,
    pub description: String,
    pub success: bool,
}

/// Snapshot reported by `bazaard db status`.
#[derive(Debug, Clone, Default)]
pub struct DbStatus {
    /// Latest applied migrations, newest first (empty before the first migrate)
    pub migrations: Vec<AppliedMigration>,
    /// Catalog size
    pub products: i64,
    /// Approval requests waiting for a resolver
    pub pending_approvals: i64,
}

/// Check connectivity, applied migrations and queue sizes.
///
/// Counts are only read once the schema exists.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    sqlx::query("SELECT 1").execute(pool).await?;
    info!("Database connectivity: OK");

    let rows = match sqlx::query(
        "SELECT version, description, success FROM _sqlx_migrations ORDER BY version DESC LIMIT 10",
    )
    .fetch_all(pool)
    .await
    {
        Ok(rows) => rows,
        Err(e) if e.to_string().contains("_sqlx_migrations") => {
            warn!("Migration table not found (run `bazaard db migrate` first)");
            return Ok(DbStatus::default());
        },
        Err(e) => return Err(e.into()),
    };

    let migrations: Vec<AppliedMigration> = rows
        .iter()
        .map(|row| AppliedMigration {
            version: row.get("version"),
            description: row.get("description"),
            success: row.get("success"),
        })
        .collect();

    if migrations.is_empty() {
        warn!("No migrations applied (run `bazaard db migrate` first)");
        return Ok(DbStatus::default());
    }
    for m in &migrations {
        info!(version = m.version, success = m.success, "{}", m.description);
    }

    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(pool).await?;
    let pending_approvals: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM approval_requests WHERE status = 'PENDING'")
            .fetch_one(pool)
            .await?;
    info!(products, pending_approvals, "Catalog and approval queue");

    Ok(DbStatus {
        migrations,
        products,
        pending_approvals,
    })
}
