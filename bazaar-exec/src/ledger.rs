//! Inventory ledger
//!
//! Atomic per-product stock reservation and release on top of the product
//! repository. Reservation is one conditional write in the store; the ledger
//! only translates outcomes and logs.

use crate::error::{ExecError, ExecResult};
use bazaar_domain::{ProductId, Quantity};
use bazaar_engine::StockMovement;
use bazaar_store::{StockDecrement, Store};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Stock reservation front
pub struct InventoryLedger {
    store: Arc<dyn Store>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Reserve `quantity` units, or fail without touching the counter
    ///
    /// # Errors
    /// - `ExecError::InsufficientStock` when fewer units are available
    /// - `ExecError::NotFound` for an unknown product
    pub async fn reserve(&self, product_id: ProductId, quantity: Quantity) -> ExecResult<StockDecrement> {
        let outcome = self
            .store
            .products()
            .try_reserve(product_id, quantity)
            .await
            .map_err(|e| match e {
                bazaar_store::StoreError::NotFound { .. } => ExecError::not_found("product", product_id),
                other => other.into(),
            })?;

        match outcome {
            StockDecrement::Applied { remaining } => {
                debug!(%product_id, quantity = quantity.get(), remaining, "Stock reserved");
                Ok(outcome)
            },
            StockDecrement::Untracked => Ok(outcome),
            StockDecrement::Insufficient { available } => {
                warn!(%product_id, requested = quantity.get(), available, "Insufficient stock");
                Err(ExecError::InsufficientStock {
                    product_id,
                    requested: quantity.get(),
                    available,
                })
            },
        }
    }

    /// Put `quantity` units back (no-op when tracking is disabled)
    pub async fn release(&self, product_id: ProductId, quantity: Quantity) -> ExecResult<Option<u32>> {
        let count = self.store.products().release(product_id, quantity).await?;
        debug!(%product_id, quantity = quantity.get(), count = ?count, "Stock released");
        Ok(count)
    }

    /// Release every movement, attempting all of them
    ///
    /// Failures are logged; the first one is returned after the rest ran.
    pub async fn release_all(&self, movements: &[StockMovement]) -> ExecResult<()> {
        let mut first_error = None;
        for movement in movements {
            if let Err(e) = self.release(movement.product_id, movement.quantity).await {
                error!(
                    product_id = %movement.product_id,
                    quantity = movement.quantity.get(),
                    error = %e,
                    "Stock release failed"
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_domain::{Money, Product};
    use bazaar_store::MemoryStore;
    use rust_decimal_macros::dec;

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    async fn ledger_with(count: u32) -> (Arc<MemoryStore>, InventoryLedger, ProductId) {
        let store = Arc::new(MemoryStore::new());
        let product = Product::new("Lamp", Money::new(dec!(40)).unwrap(), count);
        store.products().save(&product).await.unwrap();
        let ledger = InventoryLedger::new(store.clone());
        (store, ledger, product.id)
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let (store, ledger, id) = ledger_with(5).await;

        ledger.reserve(id, qty(3)).await.unwrap();
        assert_eq!(store.stock_of(id), Some(2));

        ledger.release(id, qty(3)).await.unwrap();
        assert_eq!(store.stock_of(id), Some(5));
    }

    #[tokio::test]
    async fn test_insufficient_leaves_counter() {
        let (store, ledger, id) = ledger_with(2).await;

        let err = ledger.reserve(id, qty(3)).await.unwrap_err();
        assert!(matches!(
            err,
            ExecError::InsufficientStock { requested: 3, available: 2, .. }
        ));
        assert_eq!(store.stock_of(id), Some(2));
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let (_store, ledger, _id) = ledger_with(2).await;
        let err = ledger.reserve(uuid::Uuid::now_v7(), qty(1)).await.unwrap_err();
        assert!(matches!(err, ExecError::NotFound { entity: "product", .. }));
    }
}
