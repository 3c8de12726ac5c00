//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! Thread-safe using RwLock for concurrent access; every conditional write
//! holds the write lock across check and mutation.

use crate::error::StoreError;
use crate::repository::{
    ApprovalRepository, FinancialRecordRepository, OrderRepository, ProductRepository,
    ReturnRepository, StockDecrement, Store,
};
use async_trait::async_trait;
use bazaar_domain::{
    ActorId, ApprovalAction, ApprovalId, ApprovalRequest, ApprovalStatus, FinancialRecord,
    LineItemId, Order, OrderId, Product, ProductId, Quantity, ReturnId, ReturnRequest,
    ReturnStatus,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// In-memory store for testing
pub struct MemoryStore {
    products: RwLock<HashMap<ProductId, Product>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    returns: RwLock<HashMap<ReturnId, ReturnRequest>>,
    approvals: RwLock<HashMap<ApprovalId, ApprovalRequest>>,
    financial_records: RwLock<Vec<FinancialRecord>>,
    refuse_return_inserts: AtomicBool,
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Database("memory store lock poisoned".to_string())
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
            orders: RwLock::new(HashMap::new()),
            returns: RwLock::new(HashMap::new()),
            approvals: RwLock::new(HashMap::new()),
            financial_records: RwLock::new(Vec::new()),
            refuse_return_inserts: AtomicBool::new(false),
        }
    }

    /// Make subsequent return request inserts fail (or succeed again)
    pub fn set_refuse_return_inserts(&self, refuse: bool) {
        self.refuse_return_inserts.store(refuse, Ordering::SeqCst);
    }

    /// Get the number of orders
    pub fn order_count(&self) -> usize {
        self.orders.read().map(|o| o.len()).unwrap_or(0)
    }

    /// Get the number of return requests
    pub fn return_count(&self) -> usize {
        self.returns.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Get the number of financial records
    pub fn financial_record_count(&self) -> usize {
        self.financial_records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Current stock counter of a product (test helper)
    pub fn stock_of(&self, id: ProductId) -> Option<u32> {
        self.products
            .read()
            .ok()
            .and_then(|p| p.get(&id).map(|p| p.stock.count_in_stock))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Product Repository Implementation
// =============================================================================

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn save(&self, product: &Product) -> Result<(), StoreError> {
        let mut products = self.products.write().map_err(poisoned)?;
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let products = self.products.read().map_err(poisoned)?;
        Ok(products.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn try_reserve(&self, id: ProductId, quantity: Quantity) -> Result<StockDecrement, StoreError> {
        let mut products = self.products.write().map_err(poisoned)?;
        let product = products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id.to_string()))?;

        let stock = &mut product.stock;
        if !stock.is_stock_enabled {
            return Ok(StockDecrement::Untracked);
        }
        if stock.count_in_stock < quantity.get() {
            return Ok(StockDecrement::Insufficient {
                available: stock.count_in_stock,
            });
        }
        stock.count_in_stock -= quantity.get();
        Ok(StockDecrement::Applied {
            remaining: stock.count_in_stock,
        })
    }

    async fn release(&self, id: ProductId, quantity: Quantity) -> Result<Option<u32>, StoreError> {
        let mut products = self.products.write().map_err(poisoned)?;
        let product = products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id.to_string()))?;

        if !product.stock.is_stock_enabled {
            return Ok(None);
        }
        product.stock.count_in_stock = product.stock.count_in_stock.saturating_add(quantity.get());
        Ok(Some(product.stock.count_in_stock))
    }
}

// =============================================================================
// Order Repository Implementation
// =============================================================================

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        if orders.contains_key(&order.id) {
            return Err(StoreError::duplicate("order", order.id.to_string()));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(&id).cloned())
    }

    async fn find_by_customer(&self, customer_id: ActorId) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        let mut found: Vec<Order> =
            orders.values().filter(|o| o.customer_id == customer_id).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update(&self, order: &Order) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let stored = orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::not_found("order", order.id.to_string()))?;

        if stored.version != order.version {
            return Err(StoreError::version_conflict("order", order.id.to_string(), order.version));
        }
        let mut next = order.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn set_line_return_status(
        &self,
        order_id: OrderId,
        line_id: LineItemId,
        allowed_from: &[ReturnStatus],
        to: ReturnStatus,
    ) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found("order", order_id.to_string()))?;
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
        Ok(order.clone())
    }
}

// =============================================================================
// Return Repository Implementation
// =============================================================================

#[async_trait]
impl ReturnRepository for MemoryStore {
    async fn insert(&self, request: &ReturnRequest) -> Result<(), StoreError> {
        if self.refuse_return_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Database("return inserts switched off".to_string()));
        }
        let mut returns = self.returns.write().map_err(poisoned)?;
        if returns.contains_key(&request.id) {
            return Err(StoreError::duplicate("return_request", request.id.to_string()));
        }
        returns.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ReturnId) -> Result<Option<ReturnRequest>, StoreError> {
        let returns = self.returns.read().map_err(poisoned)?;
        Ok(returns.get(&id).cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<ReturnRequest>, StoreError> {
        let returns = self.returns.read().map_err(poisoned)?;
        let mut found: Vec<ReturnRequest> =
            returns.values().filter(|r| r.order_id == order_id).cloned().collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update(&self, request: &ReturnRequest) -> Result<ReturnRequest, StoreError> {
        let mut returns = self.returns.write().map_err(poisoned)?;
        let stored = returns
            .get_mut(&request.id)
            .ok_or_else(|| StoreError::not_found("return_request", request.id.to_string()))?;

        if stored.version != request.version {
            return Err(StoreError::version_conflict(
                "return_request",
                request.id.to_string(),
                request.version,
            ));
        }
        let mut next = request.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }
}

// =============================================================================
// Approval Repository Implementation
// =============================================================================

#[async_trait]
impl ApprovalRepository for MemoryStore {
    async fn insert_pending(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        let mut approvals = self.approvals.write().map_err(poisoned)?;
        let clash = approvals.values().any(|a| {
            a.is_pending() && a.action == request.action && a.target_id == request.target_id
        });
        if clash {
            return Err(StoreError::duplicate(
                "approval_request",
                format!("{}:{}", request.action, request.target_id),
            ));
        }
        approvals.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ApprovalId) -> Result<Option<ApprovalRequest>, StoreError> {
        let approvals = self.approvals.read().map_err(poisoned)?;
        Ok(approvals.get(&id).cloned())
    }

    async fn find_pending(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        let approvals = self.approvals.read().map_err(poisoned)?;
        let mut pending: Vec<ApprovalRequest> =
            approvals.values().filter(|a| a.is_pending()).cloned().collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn find_pending_for(
        &self,
        action: ApprovalAction,
        target_id: Uuid,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let approvals = self.approvals.read().map_err(poisoned)?;
        Ok(approvals
            .values()
            .find(|a| a.is_pending() && a.action == action && a.target_id == target_id)
            .cloned())
    }

    async fn update_if_status(
        &self,
        request: &ApprovalRequest,
        expected: ApprovalStatus,
    ) -> Result<(), StoreError> {
        let mut approvals = self.approvals.write().map_err(poisoned)?;
        if request.is_pending() {
            let clash = approvals.values().any(|a| {
                a.id != request.id
                    && a.is_pending()
                    && a.action == request.action
                    && a.target_id == request.target_id
            });
            if clash {
                return Err(StoreError::duplicate(
                    "approval_request",
                    format!("{}:{}", request.action, request.target_id),
                ));
            }
        }
        let stored = approvals
            .get_mut(&request.id)
            .ok_or_else(|| StoreError::not_found("approval_request", request.id.to_string()))?;

        if stored.status != expected {
            return Err(StoreError::invalid_state(format!(
                "approval {} is {}, expected {}",
                request.id, stored.status, expected
            )));
        }
        *stored = request.clone();
        Ok(())
    }
}

// =============================================================================
// Financial Record Repository Implementation
// =============================================================================

#[async_trait]
impl FinancialRecordRepository for MemoryStore {
    async fn insert(&self, record: &FinancialRecord) -> Result<(), StoreError> {
        let mut records = self.financial_records.write().map_err(poisoned)?;
        records.push(record.clone());
        Ok(())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<FinancialRecord>, StoreError> {
        let records = self.financial_records.read().map_err(poisoned)?;
        Ok(records.iter().filter(|r| r.order_id == order_id).cloned().collect())
    }
}

// =============================================================================
// Store Implementation
// =============================================================================

#[async_trait]
impl Store for MemoryStore {
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

// =============================================================================
// Tests
// =============================================================================
