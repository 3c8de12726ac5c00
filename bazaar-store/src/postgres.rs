//! PostgreSQL store implementation.
//!
//! One table per entity, each row carrying the full entity as a JSONB `doc`
//! plus the columns that conditional writes and lookups need. Stock counters
//! live in real columns so `try_reserve` is a single conditional UPDATE.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::error::StoreError;
use crate::repository::{
    ApprovalRepository, FinancialRecordRepository, OrderRepository, ProductRepository,
    ReturnRepository, StockDecrement, Store,
};
use async_trait::async_trait;
use bazaar_domain::{
    ActorId, ApprovalAction, ApprovalId, ApprovalRequest, ApprovalStatus, DomainError, FinancialRecord,
    LineItemId, Order, OrderId, Product, ProductId, Quantity, ReturnId, ReturnRequest,
    ReturnStatus,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL-backed store
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    /// Create a new PostgreSQL store.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool (for testing).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn from_doc<T: DeserializeOwned>(row: &sqlx::postgres::PgRow) -> Result<T, StoreError> {
    let doc: serde_json::Value = row.try_get("doc")?;
    Ok(serde_json::from_value(doc)?)
}

fn version_to_db(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

/// Overlay the authoritative counter columns onto the product document
fn product_from_row(row: &sqlx::postgres::PgRow) -> Result<Product, StoreError> {
    let mut product: Product = from_doc(row)?;
    let count: i32 = row.try_get("count_in_stock")?;
    product.stock.count_in_stock = u32::try_from(count)
        .map_err(|_| StoreError::Serialization(format!("negative stock for {}", product.id)))?;
    product.stock.is_stock_enabled = row.try_get("is_stock_enabled")?;
    Ok(product)
}

fn qty_to_db(quantity: Quantity) -> Result<i32, StoreError> {
    i32::try_from(quantity.get()).map_err(|_| {
        StoreError::Domain(DomainError::InvalidQuantity(format!(
            "{} units exceed the stock column range",
            quantity.get()
        )))
    })
}

// =============================================================================
// Product Repository Implementation
// =============================================================================

#[async_trait]
impl ProductRepository for PgStore {
    async fn save(&self, product: &Product) -> Result<(), StoreError> {
        let doc = serde_json::to_value(product)?;
        let count = i32::try_from(product.stock.count_in_stock)
            .map_err(|_| StoreError::Serialization("stock counter out of range".to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, count_in_stock, is_stock_enabled, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                count_in_stock = EXCLUDED.count_in_stock,
                is_stock_enabled = EXCLUDED.is_stock_enabled,
                doc = EXCLUDED.doc,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price.as_decimal())
        .bind(count)
        .bind(product.stock.is_stock_enabled)
        .bind(doc)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT doc, count_in_stock, is_stock_enabled FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc, count_in_stock, is_stock_enabled FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn try_reserve(&self, id: ProductId, quantity: Quantity) -> Result<StockDecrement, StoreError> {
        let qty = qty_to_db(quantity)?;

        // Single conditional write: no read-modify-write window
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET count_in_stock = CASE WHEN is_stock_enabled THEN count_in_stock - $2 ELSE count_in_stock END,
                updated_at = NOW()
            WHERE id = $1 AND (NOT is_stock_enabled OR count_in_stock >= $2)
            RETURNING count_in_stock, is_stock_enabled
            "#,
        )
        .bind(id)
        .bind(qty)
        .fetch_optional(self.pool())
        .await?;

        if let Some(row) = updated {
            let enabled: bool = row.try_get("is_stock_enabled")?;
            if !enabled {
                return Ok(StockDecrement::Untracked);
            }
            let remaining: i32 = row.try_get("count_in_stock")?;
            return Ok(StockDecrement::Applied {
                remaining: u32::try_from(remaining).unwrap_or(0),
            });
        }

        // Either missing or short; read the counter only to report it
        let row = sqlx::query("SELECT count_in_stock FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::not_found("product", id.to_string()))?;
        let available: i32 = row.try_get("count_in_stock")?;
        debug!(%id, requested = qty, available, "Reservation refused");
        Ok(StockDecrement::Insufficient {
            available: u32::try_from(available).unwrap_or(0),
        })
    }

    async fn release(&self, id: ProductId, quantity: Quantity) -> Result<Option<u32>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET count_in_stock = CASE WHEN is_stock_enabled THEN count_in_stock + $2 ELSE count_in_stock END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING count_in_stock, is_stock_enabled
            "#,
        )
        .bind(id)
        .bind(qty_to_db(quantity)?)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| StoreError::not_found("product", id.to_string()))?;

        let enabled: bool = row.try_get("is_stock_enabled")?;
        if !enabled {
            return Ok(None);
        }
        let count: i32 = row.try_get("count_in_stock")?;
        Ok(Some(u32::try_from(count).unwrap_or(0)))
    }
}

// =============================================================================
// Order Repository Implementation
// =============================================================================

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let doc = serde_json::to_value(order)?;
        sqlx::query(
            r#"
            INSERT INTO orders (id, invoice_number, customer_id, status, version, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id)
        .bind(&order.invoice_number)
        .bind(order.customer_id)
        .bind(order.status.as_str())
        .bind(version_to_db(order.version))
        .bind(doc)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate { .. } => StoreError::duplicate("order", order.id.to_string()),
            other => other,
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(from_doc).transpose()
    }

    async fn find_by_customer(&self, customer_id: ActorId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT doc FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
            .bind(customer_id)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(from_doc).collect()
    }

    async fn update(&self, order: &Order) -> Result<Order, StoreError> {
        let mut next = order.clone();
        next.version += 1;
        let doc = serde_json::to_value(&next)?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, version = $4, doc = $5, updated_at = $6
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id)
        .bind(version_to_db(order.version))
        .bind(next.status.as_str())
        .bind(version_to_db(next.version))
        .bind(doc)
        .bind(next.updated_at)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return match OrderRepository::find_by_id(self, order.id).await? {
                Some(_) => Err(StoreError::version_conflict("order", order.id.to_string(), order.version)),
                None => Err(StoreError::not_found("order", order.id.to_string())),
            };
        }
        Ok(next)
    }

    async fn set_line_return_status(
        &self,
        order_id: OrderId,
        line_id: LineItemId,
        allowed_from: &[ReturnStatus],
        to: ReturnStatus,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found("order", order_id.to_string()))?;
        let mut order: Order = from_doc(&row)?;

        let line = order
            .line_mut(line_id)
            .ok_or_else(|| StoreError::not_found("line_item", line_id.to_string()))?;
        if !allowed_from.contains(&line.return_status) {
            return Err(StoreError::invalid_state(format!(
                "line {} return status is {}, cannot become {}",
                line_id, line.return_status, to
            )));
        }
        line.return_status = to;
        order.version += 1;
        order.updated_at = Utc::now();

        sqlx::query("UPDATE orders SET version = $2, doc = $3, updated_at = $4 WHERE id = $1")
            .bind(order.id)
            .bind(version_to_db(order.version))
            .bind(serde_json::to_value(&order)?)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(order)
    }
}

// =============================================================================
// Return Repository Implementation
// =============================================================================

#[async_trait]
impl ReturnRepository for PgStore {
    async fn insert(&self, request: &ReturnRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO return_requests (id, order_id, line_item_id, status, version, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(request.id)
        .bind(request.order_id)
        .bind(request.line_item_id)
        .bind(request.status.as_str())
        .bind(version_to_db(request.version))
        .bind(serde_json::to_value(request)?)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: ReturnId) -> Result<Option<ReturnRequest>, StoreError> {
        let row = sqlx::query("SELECT doc FROM return_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(from_doc).transpose()
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<ReturnRequest>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM return_requests WHERE order_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(order_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(from_doc).collect()
    }

    async fn update(&self, request: &ReturnRequest) -> Result<ReturnRequest, StoreError> {
        let mut next = request.clone();
        next.version += 1;

        let result = sqlx::query(
            r#"
            UPDATE return_requests
            SET status = $3, version = $4, doc = $5, updated_at = $6
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(request.id)
        .bind(version_to_db(request.version))
        .bind(next.status.as_str())
        .bind(version_to_db(next.version))
        .bind(serde_json::to_value(&next)?)
        .bind(next.updated_at)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return match ReturnRepository::find_by_id(self, request.id).await? {
                Some(_) => Err(StoreError::version_conflict(
                    "return_request",
                    request.id.to_string(),
                    request.version,
                )),
                None => Err(StoreError::not_found("return_request", request.id.to_string())),
            };
        }
        Ok(next)
    }
}

// =============================================================================
// Approval Repository Implementation
// =============================================================================

#[async_trait]
impl ApprovalRepository for PgStore {
    async fn insert_pending(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        // Partial unique index on (action, target_id) WHERE status = 'PENDING'
        sqlx::query(
            r#"
            INSERT INTO approval_requests (id, action, target_id, status, doc, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(request.id)
        .bind(request.action.as_str())
        .bind(request.target_id)
        .bind(request.status.as_str())
        .bind(serde_json::to_value(request)?)
        .bind(request.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate { .. } => StoreError::duplicate(
                "approval_request",
                format!("{}:{}", request.action, request.target_id),
            ),
            other => other,
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: ApprovalId) -> Result<Option<ApprovalRequest>, StoreError> {
        let row = sqlx::query("SELECT doc FROM approval_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(from_doc).transpose()
    }

    async fn find_pending(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM approval_requests WHERE status = 'PENDING' ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(from_doc).collect()
    }

    async fn find_pending_for(
        &self,
        action: ApprovalAction,
        target_id: Uuid,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let row = sqlx::query(
            "SELECT doc FROM approval_requests WHERE action = $1 AND target_id = $2 AND status = 'PENDING'",
        )
        .bind(action.as_str())
        .bind(target_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(from_doc).transpose()
    }

    async fn update_if_status(
        &self,
        request: &ApprovalRequest,
        expected: ApprovalStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE approval_requests
            SET status = $3, doc = $4, resolved_at = $5
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(request.id)
        .bind(expected.as_str())
        .bind(request.status.as_str())
        .bind(serde_json::to_value(request)?)
        .bind(request.resolved_at)
        .execute(self.pool())
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate { .. } => StoreError::duplicate(
                "approval_request",
                format!("{}:{}", request.action, request.target_id),
            ),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return match ApprovalRepository::find_by_id(self, request.id).await? {
                Some(stored) => Err(StoreError::invalid_state(format!(
                    "approval {} is {}, expected {}",
                    request.id, stored.status, expected
                ))),
                None => Err(StoreError::not_found("approval_request", request.id.to_string())),
            };
        }
        Ok(())
    }
}

// =============================================================================
// Financial Record Repository Implementation
// =============================================================================

#[async_trait]
impl FinancialRecordRepository for PgStore {
    async fn insert(&self, record: &FinancialRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO financial_records (id, kind, amount, order_id, reference_model, reference_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.kind.as_str())
        .bind(record.amount.as_decimal())
        .bind(record.order_id)
        .bind(&record.reference.model)
        .bind(record.reference.id)
        .bind(record.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<FinancialRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, amount, order_id, reference_model, reference_id, created_at
            FROM financial_records
            WHERE order_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<FinancialRecord, StoreError> {
                let amount: rust_decimal::Decimal = row.try_get("amount")?;
                Ok(FinancialRecord {
                    id: row.try_get("id")?,
                    kind: bazaar_domain::FinancialRecordKind::Refund,
                    amount: bazaar_domain::Money::new(amount)?,
                    order_id: row.try_get("order_id")?,
                    reference: bazaar_domain::RecordReference {
                        model: row.try_get("reference_model")?,
                        id: row.try_get("reference_id")?,
                    },
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

// =============================================================================
// Store Implementation
// =============================================================================

#[async_trait]
impl Store for PgStore {
    fn products(&self) -> &dyn ProductRepository {
        self
    }

    fn orders(&self) -> &dyn OrderRepository {
        self
    }

    fn returns(&self) -> &dyn ReturnRepository {
        self
    }

    fn approvals(&self) -> &dyn ApprovalRepository {
        self
    }

    fn financial_records(&self) -> &dyn FinancialRecordRepository {
        self
    }
}
