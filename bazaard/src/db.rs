//! Database CLI subcommands for bazaard.
//!
//! Provides `db migrate`, `db status`, and `db seed` commands.

use anyhow::{anyhow, Result};
use std::env;
use std::path::Path;
use tracing::info;

use bazaar_db::{load_seed_file, migrate, seed_catalog, status};

/// Run database CLI subcommands.
///
/// Supported commands:
/// - `bazaard db migrate` - Run pending migrations
/// - `bazaard db status` - Check migration status
/// - `bazaard db seed <file.json>` - Load catalog products from a JSON file
pub async fn run_db_command(args: Vec<String>) -> Result<()> {
    if args.len() < 3 {
        return Err(anyhow!("Usage: bazaard db <migrate|status|seed> [options]"));
    }

    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow!("DATABASE_URL environment variable is required for db commands"))?;

    let pool = sqlx::PgPool::connect(&database_url).await?;

    match args[2].as_str() {
        "migrate" => {
            migrate(&pool).await?;
        },
        "status" => {
            let report = status(&pool).await?;
            if report.migrations.iter().any(|m| !m.success) {
                return Err(anyhow!("A migration is marked as failed"));
            }
        },
        "seed" => {
            let path = args
                .get(3)
                .ok_or_else(|| anyhow!("Usage: bazaard db seed <file.json>"))?;
            let seeds = load_seed_file(Path::new(path))?;
            let inserted = seed_catalog(&pool, seeds).await?;
            info!(inserted, file = %path, "Catalog seeded");
        },
        _ => {
            return Err(anyhow!("Unknown db command: {}. Use migrate, status, or seed", args[2]));
        },
    }

    Ok(())
}
