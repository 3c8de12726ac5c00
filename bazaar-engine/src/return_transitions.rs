//! Return status transitions (pure)
//!
//! Applies the return state machine to a request and lists the side effects
//! the executor owes: restock, refund record, customer notification.

use crate::error::EngineError;
use crate::order_transitions::StockMovement;
use bazaar_domain::{ActorSnapshot, DomainError, Money, PickupDetails, ReturnRequest, ReturnStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional metadata carried by a return status change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnTransitionInput {
    /// History note
    #[serde(default)]
    pub note: Option<String>,
    /// Replaces the admin notes when present
    #[serde(default)]
    pub admin_notes: Option<String>,
    /// Refund override (REFUNDED), must not exceed the line total
    #[serde(default)]
    pub refund_amount: Option<Money>,
    /// Put the returned units back on the shelf (REFUNDED)
    #[serde(default)]
    pub restore_inventory: bool,
    /// Pickup arrangement (PICKUP_SCHEDULED)
    #[serde(default)]
    pub pickup: Option<PickupDetails>,
}

/// Outcome of a successful return transition decision
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnTransitionPlan {
    /// Status before the transition
    pub from: ReturnStatus,
    /// Status after the transition
    pub to: ReturnStatus,
    /// Next request state, history entry appended
    pub request: ReturnRequest,
    /// Units to release back to stock
    pub restock: Option<StockMovement>,
    /// Amount to record as a REFUND financial record
    pub refund: Option<Money>,
    /// Customer should be told about this transition
    pub notify_customer: bool,
}

/// Decide a return status change
///
/// # Errors
/// - `EngineError::InvalidReturnTransition` when the machine does not allow the move
/// - `EngineError::Domain(InvalidRefund)` when the refund override exceeds the line total
pub fn plan_return_transition(
    request: &ReturnRequest,
    to: ReturnStatus,
    input: &ReturnTransitionInput,
    actor: &ActorSnapshot,
    now: DateTime<Utc>,
) -> Result<ReturnTransitionPlan, EngineError> {
    let from = request.status;
    if !from.can_transition_to(to) {
        return Err(EngineError::InvalidReturnTransition { from, to });
    }

    let mut next = request.clone();
    let mut restock = None;
    let mut refund = None;

    if let Some(notes) = &input.admin_notes {
        next.admin_notes = Some(notes.clone());
    }

    match to {
        ReturnStatus::PickupScheduled => {
            if let Some(pickup) = &input.pickup {
                next.pickup = Some(pickup.clone());
            }
        },
        ReturnStatus::Refunded => {
            let amount = match input.refund_amount {
                Some(amount) => {
                    let max = request.max_refund();
                    if amount > max {
                        return Err(DomainError::InvalidRefund(format!(
                            "{} exceeds the line total {}",
                            amount, max
                        ))
                        .into());
                    }
                    amount
                },
                None => request.refund_amount,
            };
            next.refund_amount = amount;
            refund = Some(amount);
            if input.restore_inventory {
                restock = Some(StockMovement {
                    product_id: request.product_id,
                    quantity: request.quantity,
                });
            }
        },
        _ => {},
    }

    next.record(to, actor.clone(), input.note.clone(), now);

    Ok(ReturnTransitionPlan {
        from,
        to,
        request: next,
        restock,
        refund,
        notify_customer: matches!(to, ReturnStatus::Approved | ReturnStatus::Refunded),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_domain::{
        LineItem, NewOrder, Order, OrderTotals, PaymentMethod, Quantity, ReturnDetails,
        ReturnReason, ShippingAddress,
    };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn actor() -> ActorSnapshot {
        ActorSnapshot {
            id: Uuid::now_v7(),
            name: "Ops".to_string(),
            role: "SUPER_ADMIN".to_string(),
        }
    }

    fn requested() -> ReturnRequest {
        let line = LineItem::new(
            Uuid::now_v7(),
            "Boots",
            Quantity::new(2).unwrap(),
            Money::new(dec!(40)).unwrap(),
        );
        let order = Order::place(
            NewOrder {
                customer_id: Uuid::now_v7(),
                invoice_number: "INV-R".to_string(),
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
                totals: OrderTotals {
                    items_price: Money::new(dec!(80)).unwrap(),
                    tax_price: Money::zero(),
                    shipping_price: Money::zero(),
                    total_price: Money::new(dec!(80)).unwrap(),
                },
                expected_delivery_at: Utc::now(),
            },
            Utc::now(),
        )
        .unwrap();
        ReturnRequest::open(
            &order,
            &order.items[0],
            ReturnReason::SizeIssue,
            ReturnDetails::default(),
            actor(),
            Utc::now(),
        )
        .unwrap()
    }

    fn step(request: &ReturnRequest, to: ReturnStatus, input: ReturnTransitionInput) -> ReturnTransitionPlan {
        plan_return_transition(request, to, &input, &actor(), Utc::now()).unwrap()
    }

    fn walk_to_picked_up() -> ReturnRequest {
        let approved = step(&requested(), ReturnStatus::Approved, Default::default()).request;
        let scheduled = step(&approved, ReturnStatus::PickupScheduled, Default::default()).request;
        step(&scheduled, ReturnStatus::PickedUp, Default::default()).request
    }

    #[test]
    fn test_pickup_requires_approval_first() {
        let err = plan_return_transition(
            &requested(),
            ReturnStatus::PickupScheduled,
            &ReturnTransitionInput::default(),
            &actor(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidReturnTransition { .. }));
    }

    #[test]
    fn test_approval_notifies_and_appends_history() {
        let plan = step(&requested(), ReturnStatus::Approved, Default::default());
        assert!(plan.notify_customer);
        assert_eq!(plan.request.history.len(), 2);
        assert_eq!(plan.request.latest_status(), ReturnStatus::Approved);
        assert!(plan.restock.is_none() && plan.refund.is_none());
    }

    #[test]
    fn test_pickup_details_recorded() {
        let approved = step(&requested(), ReturnStatus::Approved, Default::default()).request;
        let pickup = PickupDetails {
            scheduled_for: Utc::now(),
            courier_name: Some("FastShip".to_string()),
            tracking_number: None,
        };
        let plan = step(
            &approved,
            ReturnStatus::PickupScheduled,
            ReturnTransitionInput {
                pickup: Some(pickup.clone()),
                ..Default::default()
            },
        );
        assert_eq!(plan.request.pickup, Some(pickup));
        assert!(!plan.notify_customer);
    }

    #[test]
    fn test_refund_defaults_to_line_total_and_restocks() {
        let picked = walk_to_picked_up();
        let plan = step(
            &picked,
            ReturnStatus::Refunded,
            ReturnTransitionInput {
                restore_inventory: true,
                ..Default::default()
            },
        );
        assert_eq!(plan.refund.unwrap().as_decimal(), dec!(80));
        assert_eq!(plan.restock.unwrap().quantity.get(), 2);
        assert!(plan.notify_customer);
    }

    #[test]
    fn test_refund_override_bounds() {
        let picked = walk_to_picked_up();
        let partial = step(
            &picked,
            ReturnStatus::Refunded,
            ReturnTransitionInput {
                refund_amount: Some(Money::new(dec!(25)).unwrap()),
                ..Default::default()
            },
        );
        assert_eq!(partial.request.refund_amount.as_decimal(), dec!(25));
        assert!(partial.restock.is_none());

        let err = plan_return_transition(
            &picked,
            ReturnStatus::Refunded,
            &ReturnTransitionInput {
                refund_amount: Some(Money::new(dec!(80.01)).unwrap()),
                ..Default::default()
            },
            &actor(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Domain(DomainError::InvalidRefund(_))));
    }

    #[test]
    fn test_completed_is_final() {
        let picked = walk_to_picked_up();
        let replaced = step(&picked, ReturnStatus::Replaced, Default::default()).request;
        let completed = step(&replaced, ReturnStatus::Completed, Default::default()).request;
        assert!(plan_return_transition(
            &completed,
            ReturnStatus::Rejected,
            &ReturnTransitionInput::default(),
            &actor(),
            Utc::now()
        )
        .is_err());
    }
}
