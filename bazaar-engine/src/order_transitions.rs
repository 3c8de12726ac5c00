//! Order status transitions (pure)
//!
//! Given the current order and a requested status, decide whether the move is
//! allowed and compute the next order state plus the side effects the
//! executor must carry out (stock releases, synthesized returns).
//!
//! ```text
//! CREATED → PAID → READY_TO_SHIP → SHIPPED → OUT_FOR_DELIVERY → DELIVERED
//!    ├→ PAYMENT_FAILED → PAID
//!    └→ CANCELLED (before delivery) → REFUNDED (if paid)
//! DELIVERED → RETURNED → REFUNDED
//! ```

use crate::error::EngineError;
use bazaar_domain::{
    ActorSnapshot, CancellationInfo, CourierInfo, Money, Order, OrderStatus, PaymentResult,
    ProductId, Quantity, ReturnRequest, ReturnStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional metadata carried by a status change request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransitionInput {
    /// Free-text note for the audit trail
    #[serde(default)]
    pub note: Option<String>,
    /// Cancellation reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Gateway confirmation (PAID)
    #[serde(default)]
    pub payment_result: Option<PaymentResult>,
    /// Courier details (SHIPPED, OUT_FOR_DELIVERY)
    #[serde(default)]
    pub courier: Option<CourierInfo>,
}

/// Units to put back on a product counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMovement {
    /// Product whose counter moves
    pub product_id: ProductId,
    /// Units
    pub quantity: Quantity,
}

/// Outcome of a successful order transition decision
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTransitionPlan {
    /// Status before the transition
    pub from: OrderStatus,
    /// Status after the transition
    pub to: OrderStatus,
    /// Next order state (version untouched; the store bumps it)
    pub order: Order,
    /// Stock to release once the order is saved
    pub releases: Vec<StockMovement>,
    /// Return requests created by the bulk RETURNED override
    pub synthesized_returns: Vec<ReturnRequest>,
}

/// Decide an order status change
///
/// # Errors
/// Returns a conflict-type `EngineError` when the current state does not
/// allow the requested status.
pub fn plan_order_transition(
    order: &Order,
    to: OrderStatus,
    input: &OrderTransitionInput,
    actor: &ActorSnapshot,
    now: DateTime<Utc>,
) -> Result<OrderTransitionPlan, EngineError> {
    let from = order.status;

    // Double-pay and double-delivery get their own errors even when the status matches
    if to == OrderStatus::Paid && order.is_paid {
        return Err(EngineError::AlreadyPaid);
    }
    if to == OrderStatus::Delivered && order.is_delivered {
        return Err(EngineError::AlreadyDelivered);
    }
    if from == to {
        return Err(EngineError::SameStatus(to));
    }
    if from.is_terminal() {
        return Err(EngineError::InvalidOrderTransition { from, to });
    }

    let mut next = order.clone();
    next.status = to;
    next.updated_at = now;
    let mut releases = Vec::new();
    let mut synthesized_returns = Vec::new();

    match to {
        OrderStatus::Created => return Err(EngineError::InvalidOrderTransition { from, to }),

        OrderStatus::Paid => {
            if !matches!(from, OrderStatus::Created | OrderStatus::PaymentFailed) {
                return Err(EngineError::InvalidOrderTransition { from, to });
            }
            next.is_paid = true;
            next.paid_at = Some(now);
            next.payment_result = input.payment_result.clone();
        },

        OrderStatus::PaymentFailed => {
            if from != OrderStatus::Created {
                return Err(EngineError::InvalidOrderTransition { from, to });
            }
        },

        OrderStatus::ReadyToShip
        | OrderStatus::Shipped
        | OrderStatus::OutForDelivery
        | OrderStatus::Delivered => {
            let moves_forward = match (from.fulfillment_rank(), to.fulfillment_rank()) {
                (Some(current), Some(target)) => target > current,
                _ => false,
            };
            if !moves_forward {
                return Err(EngineError::InvalidOrderTransition { from, to });
            }
            if !order.is_paid && !order.payment_method.collects_on_delivery() {
                return Err(EngineError::PaymentRequired(to));
            }
            if let Some(courier) = &input.courier {
                if matches!(to, OrderStatus::Shipped | OrderStatus::OutForDelivery) {
                    next.courier = Some(courier.clone());
                }
            }
            if to == OrderStatus::Delivered {
                next.is_delivered = true;
                next.delivered_at = Some(now);
                if !next.is_paid {
                    // Cash on delivery: collected by the courier
                    next.is_paid = true;
                    next.paid_at = Some(now);
                }
            }
        },

        OrderStatus::Cancelled => {
            if order.is_delivered {
                return Err(EngineError::CancelAfterDelivery);
            }
            if !matches!(
                from,
                OrderStatus::Created
                    | OrderStatus::Paid
                    | OrderStatus::ReadyToShip
                    | OrderStatus::Shipped
                    | OrderStatus::OutForDelivery
                    | OrderStatus::PaymentFailed
            ) {
                return Err(EngineError::InvalidOrderTransition { from, to });
            }
            next.is_cancelled = true;
            next.cancellation = Some(CancellationInfo {
                reason: input.reason.clone(),
                cancelled_at: now,
                cancelled_by: actor.id,
                refund_amount: if order.is_paid {
                    order.totals.total_price
                } else {
                    Money::zero()
                },
            });
            releases = order
                .items
                .iter()
                .map(|line| StockMovement {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .collect();
        },

        OrderStatus::Returned => {
            if from != OrderStatus::Delivered {
                return Err(EngineError::InvalidOrderTransition { from, to });
            }
            let note = input.note.clone().or_else(|| Some("Bulk return".to_string()));
            for line in next.items.iter_mut() {
                // Lines already under return control keep their own lifecycle
                if line.has_return_activity() {
                    continue;
                }
                synthesized_returns.push(ReturnRequest::pre_approved(
                    order,
                    line,
                    actor.clone(),
                    note.clone(),
                    now,
                ));
                line.return_status = ReturnStatus::Approved;
            }
        },

        OrderStatus::Refunded => {
            let allowed = from == OrderStatus::Returned
                || (from == OrderStatus::Cancelled && order.is_paid);
            if !allowed {
                return Err(EngineError::InvalidOrderTransition { from, to });
            }
        },
    }

    Ok(OrderTransitionPlan {
        from,
        to,
        order: next,
        releases,
        synthesized_returns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_domain::{
        LineItem, NewOrder, OrderTotals, PaymentMethod, ShippingAddress,
    };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn actor() -> ActorSnapshot {
        ActorSnapshot {
            id: Uuid::now_v7(),
            name: "Root".to_string(),
            role: "SUPER_ADMIN".to_string(),
        }
    }

    fn order(method: PaymentMethod) -> Order {
        let a = LineItem::new(Uuid::now_v7(), "A", Quantity::new(3).unwrap(), Money::new(dec!(10)).unwrap());
        let b = LineItem::new(Uuid::now_v7(), "B", Quantity::new(1).unwrap(), Money::new(dec!(5)).unwrap());
        Order::place(
            NewOrder {
                customer_id: Uuid::now_v7(),
                invoice_number: "INV-T".to_string(),
                items: vec![a, b],
                shipping_address: ShippingAddress {
                    recipient: "R".to_string(),
                    street: "S".to_string(),
                    city: "C".to_string(),
                    postal_code: "P".to_string(),
                    country: "X".to_string(),
                    phone: None,
                },
                payment_method: method,
                totals: OrderTotals {
                    items_price: Money::new(dec!(35)).unwrap(),
                    tax_price: Money::zero(),
                    shipping_price: Money::zero(),
                    total_price: Money::new(dec!(35)).unwrap(),
                },
                expected_delivery_at: Utc::now(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn apply(order: &Order, to: OrderStatus) -> Result<Order, EngineError> {
        plan_order_transition(order, to, &OrderTransitionInput::default(), &actor(), Utc::now())
            .map(|plan| plan.order)
    }

    #[test]
    fn test_mark_paid_sets_flag_once() {
        let created = order(PaymentMethod::Card);
        let paid = apply(&created, OrderStatus::Paid).unwrap();
        assert!(paid.is_paid && paid.paid_at.is_some());
        assert!(paid.flags_consistent());

        assert_eq!(apply(&paid, OrderStatus::Paid), Err(EngineError::AlreadyPaid));
    }

    #[test]
    fn test_prepaid_order_cannot_ship_before_payment() {
        let created = order(PaymentMethod::Card);
        assert_eq!(
            apply(&created, OrderStatus::Shipped),
            Err(EngineError::PaymentRequired(OrderStatus::Shipped))
        );
    }

    #[test]
    fn test_cod_delivery_marks_paid() {
        let created = order(PaymentMethod::CashOnDelivery);
        let shipped = apply(&created, OrderStatus::Shipped).unwrap();
        let delivered = apply(&shipped, OrderStatus::Delivered).unwrap();
        assert!(delivered.is_delivered && delivered.is_paid);
        assert!(delivered.flags_consistent());
    }

    #[test]
    fn test_fulfillment_never_moves_backwards() {
        let paid = apply(&order(PaymentMethod::Card), OrderStatus::Paid).unwrap();
        let shipped = apply(&paid, OrderStatus::Shipped).unwrap();
        assert!(matches!(
            apply(&shipped, OrderStatus::ReadyToShip),
            Err(EngineError::InvalidOrderTransition { .. })
        ));
    }

    #[test]
    fn test_cancel_releases_every_line() {
        let created = order(PaymentMethod::Card);
        let plan = plan_order_transition(
            &created,
            OrderStatus::Cancelled,
            &OrderTransitionInput {
                reason: Some("changed mind".to_string()),
                ..Default::default()
            },
            &actor(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(plan.releases.len(), 2);
        assert_eq!(plan.releases[0].quantity.get(), 3);
        assert!(plan.order.is_cancelled);
        let info = plan.order.cancellation.as_ref().unwrap();
        assert!(info.refund_amount.is_zero());
        assert_eq!(info.reason.as_deref(), Some("changed mind"));
        assert!(plan.order.flags_consistent());
    }

    #[test]
    fn test_cancel_paid_order_owes_total() {
        let paid = apply(&order(PaymentMethod::Card), OrderStatus::Paid).unwrap();
        let cancelled = apply(&paid, OrderStatus::Cancelled).unwrap();
        assert_eq!(
            cancelled.cancellation.unwrap().refund_amount.as_decimal(),
            dec!(35)
        );
    }

    #[test]
    fn test_cancel_after_delivery_conflicts() {
        let paid = apply(&order(PaymentMethod::Card), OrderStatus::Paid).unwrap();
        let delivered = apply(&paid, OrderStatus::Delivered).unwrap();
        let err = apply(&delivered, OrderStatus::Cancelled).unwrap_err();
        assert_eq!(err, EngineError::CancelAfterDelivery);
        assert!(err.is_conflict());
    }

    #[test]
    fn test_bulk_return_skips_lines_with_return_activity() {
        let paid = apply(&order(PaymentMethod::Card), OrderStatus::Paid).unwrap();
        let mut delivered = apply(&paid, OrderStatus::Delivered).unwrap();
        delivered.items[1].return_status = ReturnStatus::Refunded;

        let plan = plan_order_transition(
            &delivered,
            OrderStatus::Returned,
            &OrderTransitionInput::default(),
            &actor(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(plan.synthesized_returns.len(), 1);
        assert_eq!(plan.synthesized_returns[0].line_item_id, delivered.items[0].id);
        assert_eq!(plan.synthesized_returns[0].status, ReturnStatus::Approved);
        assert_eq!(plan.order.items[0].return_status, ReturnStatus::Approved);
        assert_eq!(plan.order.items[1].return_status, ReturnStatus::Refunded);
    }

    #[test]
    fn test_refund_paths() {
        let created = order(PaymentMethod::Card);
        let unpaid_cancel = apply(&created, OrderStatus::Cancelled).unwrap();
        assert!(apply(&unpaid_cancel, OrderStatus::Refunded).is_err());

        let paid = apply(&created, OrderStatus::Paid).unwrap();
        let paid_cancel = apply(&paid, OrderStatus::Cancelled).unwrap();
        let refunded = apply(&paid_cancel, OrderStatus::Refunded).unwrap();
        assert!(refunded.flags_consistent());
        assert!(apply(&refunded, OrderStatus::Paid).is_err());
    }

    #[test]
    fn test_same_status_is_conflict() {
        let created = order(PaymentMethod::Card);
        let failed = apply(&created, OrderStatus::PaymentFailed).unwrap();
        assert_eq!(
            apply(&failed, OrderStatus::PaymentFailed),
            Err(EngineError::SameStatus(OrderStatus::PaymentFailed))
        );
        // Payment can be retried after a failure
        assert!(apply(&failed, OrderStatus::Paid).is_ok());
    }
}
