//! Return requests
//!
//! A return request tracks one order line through pickup and refund or
//! replacement. Its `history` is append-only and the order line mirrors the
//! status of the latest history entry.

use crate::actor::{ActorId, ActorSnapshot};
use crate::entities::{LineItem, LineItemId, Order, OrderId, ProductId};
use crate::value_objects::{DomainError, Money, Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a ReturnRequest
pub type ReturnId = Uuid;

// =============================================================================
// Return Status
// =============================================================================

/// Return state machine
///
/// ```text
/// REQUESTED → APPROVED → PICKUP_SCHEDULED → PICKED_UP → REFUNDED ─┐
///     │           │                                  └→ REPLACED ─┴→ COMPLETED
///     └───────────┴→ REJECTED
/// ```
///
/// `NONE` only appears on order lines that never had a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    None,
    Requested,
    Approved,
    Rejected,
    PickupScheduled,
    PickedUp,
    Refunded,
    Replaced,
    Completed,
}

impl ReturnStatus {
    /// All statuses, in declaration order
    pub const ALL: [ReturnStatus; 9] = [
        ReturnStatus::None,
        ReturnStatus::Requested,
        ReturnStatus::Approved,
        ReturnStatus::Rejected,
        ReturnStatus::PickupScheduled,
        ReturnStatus::PickedUp,
        ReturnStatus::Refunded,
        ReturnStatus::Replaced,
        ReturnStatus::Completed,
    ];

    /// Stable string form (matches the serialized tag)
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::None => "NONE",
            ReturnStatus::Requested => "REQUESTED",
            ReturnStatus::Approved => "APPROVED",
            ReturnStatus::Rejected => "REJECTED",
            ReturnStatus::PickupScheduled => "PICKUP_SCHEDULED",
            ReturnStatus::PickedUp => "PICKED_UP",
            ReturnStatus::Refunded => "REFUNDED",
            ReturnStatus::Replaced => "REPLACED",
            ReturnStatus::Completed => "COMPLETED",
        }
    }

    /// Whether a request in this status blocks a new request on the same line
    pub fn is_active(&self) -> bool {
        !matches!(self, ReturnStatus::None | ReturnStatus::Rejected)
    }

    /// Whether a new request may be opened on a line with this mirror status
    pub fn allows_new_request(&self) -> bool {
        !self.is_active()
    }

    /// Statuses reachable in one step
    pub fn successors(&self) -> &'static [ReturnStatus] {
        use ReturnStatus::*;
        match self {
            None => &[Requested],
            Requested => &[Approved, Rejected],
            Approved => &[PickupScheduled, Rejected],
            PickupScheduled => &[PickedUp],
            PickedUp => &[Refunded, Replaced],
            Refunded | Replaced => &[Completed],
            Rejected | Completed => &[],
        }
    }

    /// Check a single-step transition
    pub fn can_transition_to(&self, next: ReturnStatus) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        ReturnStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| DomainError::UnknownTag {
                kind: "return status",
                value: s.to_string(),
            })
    }
}

/// Why the customer is sending the item back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnReason {
    Damaged,
    Defective,
    WrongItem,
    NotAsDescribed,
    SizeIssue,
    ChangedMind,
    Other,
}

// =============================================================================
// Return Request
// =============================================================================

/// One entry of the append-only return history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnHistoryEntry {
    pub status: ReturnStatus,
    pub actor: ActorSnapshot,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Pickup arrangement for the returned item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupDetails {
    pub scheduled_for: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
}

/// Return request for a single order line
///
/// Product, name, price and quantity are snapshotted from the order line at
/// request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: ReturnId,
    pub order_id: OrderId,
    pub line_item_id: LineItemId,
    pub customer_id: ActorId,

    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: Quantity,

    pub reason: ReturnReason,
    pub status: ReturnStatus,
    pub refund_amount: Money,
    pub comments: Option<String>,
    pub admin_notes: Option<String>,
    pub images: Vec<String>,
    pub pickup: Option<PickupDetails>,
    pub history: Vec<ReturnHistoryEntry>,

    /// Optimistic concurrency token, bumped by the store on every update
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer-provided part of a return request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDetails {
    pub comments: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Units being sent back; the whole line when absent
    #[serde(default)]
    pub quantity: Option<Quantity>,
}

impl ReturnRequest {
    fn from_line(
        order: &Order,
        line: &LineItem,
        reason: ReturnReason,
        quantity: Quantity,
        details: ReturnDetails,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id: order.id,
            line_item_id: line.id,
            customer_id: order.customer_id,
            product_id: line.product_id,
            product_name: line.name.clone(),
            unit_price: line.unit_price,
            quantity,
            reason,
            status: ReturnStatus::None,
            refund_amount: line.unit_price.times(quantity),
            comments: details.comments,
            admin_notes: None,
            images: details.images,
            pickup: None,
            history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Open a customer-initiated request in REQUESTED state
    ///
    /// # Errors
    /// `DomainError::InvalidQuantity` when more units are asked back than the line holds
    pub fn open(
        order: &Order,
        line: &LineItem,
        reason: ReturnReason,
        details: ReturnDetails,
        actor: ActorSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let quantity = match details.quantity {
            Some(quantity) if quantity > line.quantity => {
                return Err(DomainError::InvalidQuantity(format!(
                    "cannot return {} of {} units",
                    quantity, line.quantity
                )))
            },
            Some(quantity) => quantity,
            None => line.quantity,
        };
        let mut request = Self::from_line(order, line, reason, quantity, details, now);
        request.record(ReturnStatus::Requested, actor, None, now);
        Ok(request)
    }

    /// Create a request directly in APPROVED state (administrative bulk return)
    pub fn pre_approved(
        order: &Order,
        line: &LineItem,
        actor: ActorSnapshot,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut request = Self::from_line(
            order,
            line,
            ReturnReason::Other,
            line.quantity,
            ReturnDetails::default(),
            now,
        );
        request.record(ReturnStatus::Approved, actor, note, now);
        request
    }

    /// Set the status and append the matching history entry
    pub fn record(
        &mut self,
        status: ReturnStatus,
        actor: ActorSnapshot,
        note: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.status = status;
        self.history.push(ReturnHistoryEntry {
            status,
            actor,
            at,
            note,
        });
        self.updated_at = at;
    }

    /// Status of the newest history entry
    pub fn latest_status(&self) -> ReturnStatus {
        self.history.last().map(|h| h.status).unwrap_or(ReturnStatus::None)
    }

    /// Maximum refundable amount: unit price times the units returned
    pub fn max_refund(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, Role};
    use crate::entities::{NewOrder, OrderTotals};
    use crate::value_objects::{PaymentMethod, ShippingAddress};
    use rust_decimal_macros::dec;

    fn order_with_line() -> Order {
        let line = LineItem::new(
            Uuid::now_v7(),
            "Kettle",
            Quantity::new(2).unwrap(),
            Money::new(dec!(25)).unwrap(),
        );
        let totals = OrderTotals {
            items_price: Money::new(dec!(50)).unwrap(),
            tax_price: Money::zero(),
            shipping_price: Money::zero(),
            total_price: Money::new(dec!(50)).unwrap(),
        };
        Order::place(
            NewOrder {
                customer_id: Uuid::now_v7(),
                invoice_number: "INV-1".to_string(),
                items: vec![line],
                shipping_address: ShippingAddress {
                    recipient: "R".to_string(),
                    street: "S".to_string(),
                    city: "C".to_string(),
                    postal_code: "P".to_string(),
                    country: "X".to_string(),
                    phone: None,
                },
                payment_method: PaymentMethod::Card,
                totals,
                expected_delivery_at: Utc::now(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_transition_table() {
        use ReturnStatus::*;
        assert!(Requested.can_transition_to(Approved));
        assert!(Requested.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(PickupScheduled));
        assert!(!Requested.can_transition_to(PickupScheduled));
        assert!(!PickupScheduled.can_transition_to(Rejected));
        assert!(PickedUp.can_transition_to(Refunded));
        assert!(PickedUp.can_transition_to(Replaced));
        assert!(Refunded.can_transition_to(Completed));
        assert!(Completed.successors().is_empty());
        assert!(Rejected.successors().is_empty());
    }

    #[test]
    fn test_active_statuses() {
        assert!(!ReturnStatus::None.is_active());
        assert!(!ReturnStatus::Rejected.is_active());
        assert!(ReturnStatus::Requested.is_active());
        assert!(ReturnStatus::Completed.is_active());
    }

    #[test]
    fn test_open_snapshots_line_and_records_history() {
        let order = order_with_line();
        let line = &order.items[0];
        let actor = Actor::with_role(order.customer_id, "Cust", Role::Customer);

        let request = ReturnRequest::open(
            &order,
            line,
            ReturnReason::Damaged,
            ReturnDetails {
                comments: Some("cracked lid".to_string()),
                images: vec!["img://1".to_string()],
                quantity: None,
            },
            actor.snapshot(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(request.status, ReturnStatus::Requested);
        assert_eq!(request.latest_status(), ReturnStatus::Requested);
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.product_name, "Kettle");
        assert_eq!(request.refund_amount.as_decimal(), dec!(50));
        assert_eq!(request.customer_id, order.customer_id);
    }

    #[test]
    fn test_open_for_part_of_a_line() {
        let order = order_with_line();
        let line = &order.items[0];
        let actor = Actor::with_role(order.customer_id, "Cust", Role::Customer);
        let one = ReturnDetails {
            quantity: Some(Quantity::new(1).unwrap()),
            ..Default::default()
        };

        let request =
            ReturnRequest::open(&order, line, ReturnReason::SizeIssue, one, actor.snapshot(), Utc::now()).unwrap();
        assert_eq!(request.quantity.get(), 1);
        assert_eq!(request.refund_amount.as_decimal(), dec!(25));
        assert_eq!(request.max_refund().as_decimal(), dec!(25));

        let three = ReturnDetails {
            quantity: Some(Quantity::new(3).unwrap()),
            ..Default::default()
        };
        let err = ReturnRequest::open(&order, line, ReturnReason::SizeIssue, three, actor.snapshot(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn test_pre_approved_skips_requested() {
        let order = order_with_line();
        let admin = Actor::with_role(Uuid::now_v7(), "Admin", Role::SuperAdmin);
        let request =
            ReturnRequest::pre_approved(&order, &order.items[0], admin.snapshot(), None, Utc::now());
        assert_eq!(request.status, ReturnStatus::Approved);
        assert_eq!(request.history.len(), 1);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("picked_up".parse::<ReturnStatus>().unwrap(), ReturnStatus::PickedUp);
        assert!("LOST".parse::<ReturnStatus>().is_err());
    }
}
