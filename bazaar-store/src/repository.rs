//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the domain.
//! Implementations can be PostgreSQL, in-memory, or mock for testing.
//!
//! Every write that guards an invariant is a single conditional operation in
//! the adapter (stock decrement, versioned update, pending uniqueness), so the
//! callers never hold a read-modify-write window.

use crate::error::StoreError;
use async_trait::async_trait;
use bazaar_domain::{
    ActorId, ApprovalAction, ApprovalId, ApprovalRequest, ApprovalStatus, FinancialRecord,
    LineItemId, Order, OrderId, Product, ProductId, Quantity, ReturnId, ReturnRequest,
    ReturnStatus,
};
use uuid::Uuid;

/// Result of a conditional stock decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// Counter decremented
    Applied {
        /// Units left after the decrement
        remaining: u32,
    },
    /// Stock tracking disabled, counter untouched
    Untracked,
    /// Not enough stock, counter untouched
    Insufficient {
        /// Units available at the time of the attempt
        available: u32,
    },
}

impl StockDecrement {
    /// Whether the reservation went through
    pub fn is_reserved(&self) -> bool {
        !matches!(self, StockDecrement::Insufficient { .. })
    }
}

/// Repository for Product entities and their embedded stock counters
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Save a product (insert or replace, including its counter)
    async fn save(&self, product: &Product) -> Result<(), StoreError>;

    /// Find a product by ID
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Find several products; missing ids are skipped
    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// Decrement `count_in_stock` by `quantity` iff enough is available
    ///
    /// Single conditional write; succeeds without touching the counter when
    /// stock tracking is disabled.
    async fn try_reserve(&self, id: ProductId, quantity: Quantity) -> Result<StockDecrement, StoreError>;

    /// Increment `count_in_stock` by `quantity`
    ///
    /// Returns the new count, or `None` when stock tracking is disabled.
    async fn release(&self, id: ProductId, quantity: Quantity) -> Result<Option<u32>, StoreError>;
}

/// Repository for Order entities (never deleted)
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    /// Find an order by ID
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Find all orders of a customer, newest first
    async fn find_by_customer(&self, customer_id: ActorId) -> Result<Vec<Order>, StoreError>;

    /// Replace an order if its stored version still equals `order.version`
    ///
    /// Returns the stored copy with the bumped version.
    async fn update(&self, order: &Order) -> Result<Order, StoreError>;

    /// Set one line's return mirror iff its current value is in `allowed_from`
    ///
    /// Independent of the order version so return activity never races with
    /// order-level writes on other fields. Bumps the version.
    async fn set_line_return_status(
        &self,
        order_id: OrderId,
        line_id: LineItemId,
        allowed_from: &[ReturnStatus],
        to: ReturnStatus,
    ) -> Result<Order, StoreError>;
}

/// Repository for ReturnRequest entities (never deleted)
#[async_trait]
pub trait ReturnRepository: Send + Sync {
    /// Insert a new return request
    async fn insert(&self, request: &ReturnRequest) -> Result<(), StoreError>;

    /// Find a return request by ID
    async fn find_by_id(&self, id: ReturnId) -> Result<Option<ReturnRequest>, StoreError>;

    /// Find all return requests of an order, oldest first
    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<ReturnRequest>, StoreError>;

    /// Replace a request if its stored version still equals `request.version`
    async fn update(&self, request: &ReturnRequest) -> Result<ReturnRequest, StoreError>;
}

/// Repository for ApprovalRequest entities
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    /// Insert a PENDING request
    ///
    /// Fails with `Duplicate` when a PENDING request already exists for the
    /// same (action, target_id).
    async fn insert_pending(&self, request: &ApprovalRequest) -> Result<(), StoreError>;

    /// Find a request by ID
    async fn find_by_id(&self, id: ApprovalId) -> Result<Option<ApprovalRequest>, StoreError>;

    /// All PENDING requests, oldest first
    async fn find_pending(&self) -> Result<Vec<ApprovalRequest>, StoreError>;

    /// The PENDING request for (action, target_id), if any
    async fn find_pending_for(
        &self,
        action: ApprovalAction,
        target_id: Uuid,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Replace a request iff its stored status equals `expected`
    ///
    /// Moving a request back to PENDING fails with `Duplicate` while another
    /// PENDING request holds the same (action, target).
    async fn update_if_status(
        &self,
        request: &ApprovalRequest,
        expected: ApprovalStatus,
    ) -> Result<(), StoreError>;
}

/// Repository for FinancialRecord entities (append-only)
#[async_trait]
pub trait FinancialRecordRepository: Send + Sync {
    /// Append a record
    async fn insert(&self, record: &FinancialRecord) -> Result<(), StoreError>;

    /// All records of an order, oldest first
    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<FinancialRecord>, StoreError>;
}

/// Combined store interface
#[async_trait]
pub trait Store: Send + Sync {
    /// Get product repository
    fn products(&self) -> &dyn ProductRepository;

    /// Get order repository
    fn orders(&self) -> &dyn OrderRepository;

    /// Get return request repository
    fn returns(&self) -> &dyn ReturnRepository;

    /// Get approval request repository
    fn approvals(&self) -> &dyn ApprovalRepository;

    /// Get financial record repository
    fn financial_records(&self) -> &dyn FinancialRecordRepository;
}
