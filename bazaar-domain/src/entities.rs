//! Domain Entities for Bazaar
//!
//! Core business entities with lifecycle management.
//! All entities have identity and state transitions.

use crate::actor::ActorId;
use crate::returns::ReturnStatus;
use crate::value_objects::{DomainError, Money, PaymentMethod, Quantity, ShippingAddress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// IDs
// =============================================================================

/// Unique identifier for a Product
pub type ProductId = Uuid;

/// Unique identifier for an Order
pub type OrderId = Uuid;

/// Unique identifier for a line inside an Order
pub type LineItemId = Uuid;

// =============================================================================
// Product (external catalog view + embedded stock counter)
// =============================================================================

/// Product as seen by the core: price, stock policy, return policy, delivery estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub seller_id: Option<ActorId>,
    pub price: Money,
    pub stock: InventoryCounter,
    /// Per-item return policy (absent = returnable with the platform window)
    pub return_policy: Option<ReturnPolicy>,
    /// Seller's delivery estimate in days
    pub estimated_delivery_days: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Create a product with a tracked stock counter
    pub fn new(name: impl Into<String>, price: Money, count_in_stock: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            seller_id: None,
            price,
            stock: InventoryCounter::tracked(count_in_stock),
            return_policy: None,
            estimated_delivery_days: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the product can be returned at all
    pub fn is_returnable(&self) -> bool {
        self.return_policy.as_ref().map(|p| p.returnable).unwrap_or(true)
    }

    /// Product-specific return window, if the seller overrides the platform default
    pub fn return_window_days(&self) -> Option<u32> {
        self.return_policy.as_ref().and_then(|p| p.window_days)
    }
}

/// Stock counter embedded in a product
///
/// # Invariants
/// - `count_in_stock` never goes below zero (enforced by the unsigned type and
///   by conditional decrement in the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCounter {
    pub count_in_stock: u32,
    /// When false, reservations always succeed and the counter is left alone
    pub is_stock_enabled: bool,
}

impl InventoryCounter {
    /// Counter with stock tracking enabled
    pub fn tracked(count_in_stock: u32) -> Self {
        Self {
            count_in_stock,
            is_stock_enabled: true,
        }
    }

    /// Counter with stock tracking disabled (made-to-order, digital goods)
    pub fn untracked() -> Self {
        Self {
            count_in_stock: 0,
            is_stock_enabled: false,
        }
    }

    /// Check whether a reservation of `quantity` would succeed
    pub fn can_reserve(&self, quantity: Quantity) -> bool {
        !self.is_stock_enabled || self.count_in_stock >= quantity.get()
    }
}

/// Per-product return policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPolicy {
    pub returnable: bool,
    /// Overrides the platform default window when present
    pub window_days: Option<u32>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Order status state machine
///
/// ```text
/// CREATED → PAID → READY_TO_SHIP → SHIPPED → OUT_FOR_DELIVERY → DELIVERED
///    │                                                              │
///    ├→ PAYMENT_FAILED                                              ├→ RETURNED → REFUNDED
///    └→ CANCELLED (any time before delivery) → REFUNDED (if paid)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Paid,
    ReadyToShip,
    Shipped,
    OutForDelivery,
    Delivered,
    PaymentFailed,
    Cancelled,
    Returned,
    Refunded,
}

impl OrderStatus {
    /// All statuses, in declaration order
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::Created,
        OrderStatus::Paid,
        OrderStatus::ReadyToShip,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::PaymentFailed,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::Refunded,
    ];

    /// Stable string form (matches the serialized tag)
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Paid => "PAID",
            OrderStatus::ReadyToShip => "READY_TO_SHIP",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// Position on the main fulfillment path, `None` for side branches
    pub fn fulfillment_rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Created => Some(0),
            OrderStatus::Paid => Some(1),
            OrderStatus::ReadyToShip => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::OutForDelivery => Some(4),
            OrderStatus::Delivered => Some(5),
            _ => None,
        }
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Refunded)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| DomainError::UnknownTag {
                kind: "order status",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Order
// =============================================================================

/// One product line of an order
///
/// Name and unit price are snapshotted at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    /// Mirror of the latest return request status for this line
    pub return_status: ReturnStatus,
}

impl LineItem {
    /// Create a line with no return activity
    pub fn new(product_id: ProductId, name: impl Into<String>, quantity: Quantity, unit_price: Money) -> Self {
        Self {
            id: Uuid::now_v7(),
            product_id,
            name: name.into(),
            quantity,
            unit_price,
            return_status: ReturnStatus::None,
        }
    }

    /// unit price × quantity
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Line is under return-lifecycle control
    pub fn has_return_activity(&self) -> bool {
        self.return_status != ReturnStatus::None
    }
}

/// Computed order totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub items_price: Money,
    pub tax_price: Money,
    pub shipping_price: Money,
    pub total_price: Money,
}

impl OrderTotals {
    /// items + tax + shipping == total
    pub fn is_balanced(&self) -> bool {
        self.items_price + self.tax_price + self.shipping_price == self.total_price
    }
}

/// Gateway confirmation attached when an order is marked paid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub provider: String,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,
}

/// Courier details recorded during fulfillment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierInfo {
    pub courier_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
}

/// Cancellation metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationInfo {
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: ActorId,
    /// Amount owed back to the customer (zero when nothing was paid)
    pub refund_amount: Money,
}

/// Order placed by a customer
///
/// Legacy booleans (`is_paid`, `is_delivered`, `is_cancelled`) are kept for
/// older consumers and must always agree with `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable code, best-effort unique
    pub invoice_number: String,
    pub customer_id: ActorId,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_result: Option<PaymentResult>,
    pub totals: OrderTotals,

    pub status: OrderStatus,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub is_cancelled: bool,
    pub cancellation: Option<CancellationInfo>,
    pub courier: Option<CourierInfo>,

    pub expected_delivery_at: DateTime<Utc>,

    /// Optimistic concurrency token, bumped by the store on every update
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to materialize a new order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: ActorId,
    pub invoice_number: String,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
    pub expected_delivery_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order in CREATED state
    ///
    /// # Errors
    /// Returns `DomainError::InvalidOrder` if there are no lines or totals don't balance
    pub fn place(new: NewOrder, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if new.items.is_empty() {
            return Err(DomainError::InvalidOrder("Order has no items".to_string()));
        }
        if !new.totals.is_balanced() {
            return Err(DomainError::InvalidOrder(format!(
                "Totals do not balance: {} + {} + {} != {}",
                new.totals.items_price,
                new.totals.tax_price,
                new.totals.shipping_price,
                new.totals.total_price
            )));
        }
        let items_sum: Money = new.items.iter().map(LineItem::line_total).sum();
        if items_sum != new.totals.items_price {
            return Err(DomainError::InvalidOrder(format!(
                "Line totals {} do not match items price {}",
                items_sum, new.totals.items_price
            )));
        }

        Ok(Self {
            id: Uuid::now_v7(),
            invoice_number: new.invoice_number,
            customer_id: new.customer_id,
            items: new.items,
            shipping_address: new.shipping_address,
            payment_method: new.payment_method,
            payment_result: None,
            totals: new.totals,
            status: OrderStatus::Created,
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            delivered_at: None,
            is_cancelled: false,
            cancellation: None,
            courier: None,
            expected_delivery_at: new.expected_delivery_at,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Find a line by id
    pub fn line(&self, line_id: LineItemId) -> Option<&LineItem> {
        self.items.iter().find(|l| l.id == line_id)
    }

    /// Find a line by id (mutable)
    pub fn line_mut(&mut self, line_id: LineItemId) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|l| l.id == line_id)
    }

    /// Check the legacy flags against `status`
    pub fn flags_consistent(&self) -> bool {
        let paid_ok = self.is_paid == self.paid_at.is_some()
            && (self.status != OrderStatus::Paid || self.is_paid);
        let delivered_ok = self.is_delivered == self.delivered_at.is_some()
            && match self.status {
                OrderStatus::Delivered | OrderStatus::Returned => self.is_delivered,
                OrderStatus::Refunded => true,
                _ => !self.is_delivered,
            };
        let cancelled_ok = self.is_cancelled == self.cancellation.is_some()
            && match self.status {
                OrderStatus::Cancelled => self.is_cancelled,
                OrderStatus::Refunded => true,
                _ => !self.is_cancelled,
            };
        paid_ok && delivered_ok && cancelled_ok
    }
}

// =============================================================================
// Tests
// =============================================================================
