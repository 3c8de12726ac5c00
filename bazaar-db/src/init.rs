//! Catalog seeding for local runs and demos.
//!
//! Reads a JSON list of products and inserts the ones whose name is not in
//! the catalog yet, so re-running is harmless.

use bazaar_domain::{InventoryCounter, Money, Product, ReturnPolicy};
use bazaar_store::{PgStore, Store};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::Result;

/// One catalog entry in a seed file
#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub price: Decimal,
    /// Omit to disable stock tracking
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default = "default_returnable")]
    pub returnable: bool,
    #[serde(default)]
    pub return_window_days: Option<u32>,
    #[serde(default)]
    pub estimated_delivery_days: Option<u32>,
}

fn default_returnable() -> bool {
    true
}

impl SeedProduct {
    fn into_product(self) -> Result<Product> {
        let mut product = Product::new(self.name, Money::new(self.price)?, self.stock.unwrap_or(0));
        if self.stock.is_none() {
            product.stock = InventoryCounter::untracked();
        }
        if !self.returnable || self.return_window_days.is_some() {
            product.return_policy = Some(ReturnPolicy {
                returnable: self.returnable,
                window_days: self.return_window_days,
            });
        }
        product.estimated_delivery_days = self.estimated_delivery_days;
        Ok(product)
    }
}

/// Parse a seed file
pub fn load_seed_file(path: &Path) -> Result<Vec<SeedProduct>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Insert products missing from the catalog; returns how many were added
pub async fn seed_catalog(pool: &PgPool, seeds: Vec<SeedProduct>) -> Result<usize> {
    let store = PgStore::new(Arc::new(pool.clone()));
    let mut added = 0;

    for seed in seeds {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE name = $1)")
            .bind(&seed.name)
            .fetch_one(pool)
            .await?;
        if exists {
            info!(name = %seed.name, "Product already seeded");
            continue;
        }

        let product = seed.into_product()?;
        store.products().save(&product).await?;
        info!(product_id = %product.id, name = %product.name, "Product seeded");
        added += 1;
    }

    info!(added, "Catalog seeding complete");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_defaults() {
        let seeds: Vec<SeedProduct> = serde_json::from_str(
            r#"[
                {"name": "Mug", "price": "12.50", "stock": 40},
                {"name": "Gift card", "price": "25", "returnable": false}
            ]"#,
        )
        .unwrap();

        let mug = seeds[0].clone().into_product().unwrap();
        assert!(mug.stock.is_stock_enabled);
        assert_eq!(mug.stock.count_in_stock, 40);
        assert!(mug.return_policy.is_none());

        let card = seeds[1].clone().into_product().unwrap();
        assert!(!card.stock.is_stock_enabled);
        assert!(!card.is_returnable());
    }
}
