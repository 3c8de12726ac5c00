//! Test helpers for Bazaar.
//!
//! Provides actor/product fixtures and an in-memory [`Harness`] that wires
//! the full commerce core with a controllable clock, settings and notifier.

mod fixtures;
mod harness;

pub use fixtures::{address, admin, customer, product, product_with_policy, seller, super_admin, ProductSpec};
pub use harness::Harness;

pub use anyhow::Result;

/// Setup a clean test database by running migrations.
///
/// Note: migrations are located at the workspace root.
#[cfg(feature = "postgres")]
pub async fn setup_test_db(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::migrate!("../migrations").run(pool).await?;
    Ok(())
}
