//! Order engine: saga-style creation and the order status machine.
//!
//! # Creation flow
//!
//! ```text
//! validate → price from catalog → reserve line 1..n → insert order → audit → publish
//!                                     │ fail             │ fail
//!                                     └─ release 1..k-1  └─ release 1..n
//! ```
//!
//! Reservations are sequential; a failure at line k compensates lines 1..k-1
//! so no partial order and no lost stock survive.

use crate::approval::ApprovalHandler;
use crate::error::{require_capability, ExecError, ExecResult};
use crate::event_bus::{CommerceEvent, EventBus};
use crate::ledger::InventoryLedger;
use crate::ports::{Clock, SettingsProvider};
use async_trait::async_trait;
use bazaar_audit::{AuditAction, AuditEvent, AuditTrail};
use bazaar_domain::{
    Actor, ActorId, Capability, NewOrder, Order, OrderId, OrderStatus, PaymentMethod,
    ReturnStatus, ShippingAddress,
};
use bazaar_engine::{
    compute_totals, expected_delivery, merge_cart_lines, plan_order_transition, price_line,
    CartLine, OrderTransitionInput, OrderTransitionPlan, StockMovement,
};
use bazaar_store::{StockDecrement, Store};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

// =============================================================================
// Requests
// =============================================================================

/// Checkout request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Order status change as stored in an approval request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusCommand {
    pub status: OrderStatus,
    #[serde(flatten)]
    pub input: OrderTransitionInput,
}

// =============================================================================
// Order Engine
// =============================================================================

pub struct OrderEngine {
    store: Arc<dyn Store>,
    ledger: InventoryLedger,
    audit: Arc<AuditTrail>,
    settings: Arc<dyn SettingsProvider>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
}

impl OrderEngine {
    pub fn new(
        store: Arc<dyn Store>,
        audit: Arc<AuditTrail>,
        settings: Arc<dyn SettingsProvider>,
        clock: Arc<dyn Clock>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            ledger: InventoryLedger::new(store.clone()),
            store,
            audit,
            settings,
            clock,
            events,
        }
    }

    /// Create an order, reserving every line or none
    ///
    /// # Errors
    /// - `Unauthorized` without `PlaceOrders`
    /// - `Invalid` for an empty cart or a bad address
    /// - `NotFound` for an unknown product
    /// - `InsufficientStock` naming the first line that ran short
    pub async fn create_order(&self, actor: &Actor, request: CreateOrderRequest) -> ExecResult<Order> {
        require_capability(actor, Capability::PlaceOrders, "place orders")?;
        request.shipping_address.validate()?;
        let cart = merge_cart_lines(&request.items)?;

        let policy = self.settings.pricing_policy().await?;
        let now = self.clock.now();

        // Price everything before touching stock
        let ids: Vec<_> = cart.iter().map(|l| l.product_id).collect();
        let products = self.store.products().find_many(&ids).await?;
        let mut items = Vec::with_capacity(cart.len());
        let mut estimates = Vec::with_capacity(cart.len());
        for line in &cart {
            let product = products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or_else(|| ExecError::not_found("product", line.product_id))?;
            items.push(price_line(product, line.quantity));
            estimates.push(product.estimated_delivery_days);
        }
        let totals = compute_totals(&items, &policy)?;

        let order = Order::place(
            NewOrder {
                customer_id: actor.id,
                invoice_number: invoice_number(now),
                items,
                shipping_address: request.shipping_address,
                payment_method: request.payment_method,
                totals,
                expected_delivery_at: expected_delivery(now, estimates, policy.default_delivery_days),
            },
            now,
        )?;

        // Reserve sequentially; compensate on the first failure
        let mut reserved: Vec<StockMovement> = Vec::with_capacity(cart.len());
        for line in &cart {
            match self.ledger.reserve(line.product_id, line.quantity).await {
                Ok(StockDecrement::Applied { .. }) => reserved.push(StockMovement {
                    product_id: line.product_id,
                    quantity: line.quantity,
                }),
                Ok(_) => {},
                Err(e) => {
                    self.compensate(&reserved).await;
                    return Err(e);
                },
            }
        }

        if let Err(e) = self.store.orders().insert(&order).await {
            error!(order_id = %order.id, error = %e, "Order insert failed, releasing reservations");
            self.compensate(&reserved).await;
            return Err(e.into());
        }

        info!(
            order_id = %order.id,
            invoice = %order.invoice_number,
            customer_id = %order.customer_id,
            total = %order.totals.total_price,
            lines = order.items.len(),
            "Order created"
        );

        self.audit
            .record(
                AuditEvent::new(AuditAction::OrderCreated, actor.snapshot())
                    .with_order(order.id)
                    .with_target("Order", order.id)
                    .with_status(OrderStatus::Created)
                    .with_metadata(json!({
                        "invoice_number": order.invoice_number,
                        "total_price": order.totals.total_price,
                        "payment_method": order.payment_method,
                    }))
                    .at(now),
            )
            .await;

        self.events.send(CommerceEvent::OrderCreated {
            order_id: order.id,
            customer_id: order.customer_id,
            total: order.totals.total_price,
        });

        Ok(order)
    }

    async fn compensate(&self, reserved: &[StockMovement]) {
        if reserved.is_empty() {
            return;
        }
        warn!(lines = reserved.len(), "Compensating stock reservations");
        if let Err(e) = self.ledger.release_all(reserved).await {
            error!(error = %e, "Compensation incomplete, stock may be short");
        }
    }

    /// Decide a status change without applying it
    pub async fn preview_transition(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        input: &OrderTransitionInput,
        actor: &Actor,
    ) -> ExecResult<OrderTransitionPlan> {
        let order = self.get_order(order_id).await?;
        Ok(plan_order_transition(&order, to, input, &actor.snapshot(), self.clock.now())?)
    }

    /// Apply a status change with its side effects
    ///
    /// The order write is versioned: of two concurrent changes from the same
    /// state only one lands, the other gets `Conflict`.
    pub async fn transition_status(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        input: OrderTransitionInput,
        actor: &Actor,
    ) -> ExecResult<Order> {
        require_capability(actor, Capability::ManageOrders, "change order status")?;

        let now = self.clock.now();
        let snapshot = actor.snapshot();
        let order = self.get_order(order_id).await?;
        let plan = plan_order_transition(&order, to, &input, &snapshot, now)?;

        let mut updated = self.store.orders().update(&plan.order).await?;
        info!(
            %order_id,
            from = %plan.from,
            to = %plan.to,
            actor_id = %actor.id,
            "Order status changed"
        );

        // Administrative bulk return: one pre-approved request per idle line
        for request in &plan.synthesized_returns {
            match self.store.returns().insert(request).await {
                Ok(()) => {
                    self.audit
                        .record(
                            AuditEvent::new(AuditAction::ReturnStatusChanged, snapshot.clone())
                                .with_order(order_id)
                                .with_target("ReturnRequest", request.id)
                                .with_transition(ReturnStatus::None, ReturnStatus::Approved)
                                .with_note(input.note.clone())
                                .at(now),
                        )
                        .await;
                },
                Err(e) => {
                    error!(
                        %order_id,
                        line_item_id = %request.line_item_id,
                        error = %e,
                        "Bulk return request insert failed"
                    );
                    // No request backs the line, so its mirror goes back to NONE
                    match self
                        .store
                        .orders()
                        .set_line_return_status(
                            order_id,
                            request.line_item_id,
                            &[ReturnStatus::Approved],
                            ReturnStatus::None,
                        )
                        .await
                    {
                        Ok(reverted) => updated = reverted,
                        Err(e) => error!(
                            %order_id,
                            line_item_id = %request.line_item_id,
                            error = %e,
                            "Line return status revert failed"
                        ),
                    }
                },
            }
        }

        if !plan.releases.is_empty() {
            if let Err(e) = self.ledger.release_all(&plan.releases).await {
                error!(%order_id, error = %e, "Stock release after status change incomplete");
            }
        }

        self.audit
            .record(
                AuditEvent::new(AuditAction::OrderStatusChanged, snapshot)
                    .with_order(order_id)
                    .with_target("Order", order_id)
                    .with_transition(plan.from, plan.to)
                    .with_note(input.note.clone().or_else(|| input.reason.clone()))
                    .with_metadata(transition_metadata(&updated, &plan))
                    .at(now),
            )
            .await;

        self.events.send(CommerceEvent::OrderStatusChanged {
            order_id,
            from: plan.from,
            to: plan.to,
        });

        Ok(updated)
    }

    /// Load an order
    pub async fn get_order(&self, order_id: OrderId) -> ExecResult<Order> {
        self.store
            .orders()
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ExecError::not_found("order", order_id))
    }

    /// Orders of one customer, newest first
    pub async fn orders_for_customer(&self, customer_id: ActorId) -> ExecResult<Vec<Order>> {
        Ok(self.store.orders().find_by_customer(customer_id).await?)
    }
}

fn transition_metadata(order: &Order, plan: &OrderTransitionPlan) -> serde_json::Value {
    let mut meta = json!({ "version": order.version });
    if let Some(cancellation) = &order.cancellation {
        meta["refund_amount"] = json!(cancellation.refund_amount);
    }
    if !plan.releases.is_empty() {
        meta["released_lines"] = json!(plan.releases.len());
    }
    if !plan.synthesized_returns.is_empty() {
        meta["return_ids"] = json!(plan
            .synthesized_returns
            .iter()
            .map(|r| r.id)
            .collect::<Vec<Uuid>>());
    }
    meta
}

/// `INV-YYYYMMDD-XXXXXX`, best-effort unique
fn invoice_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("INV-{}-{}", now.format("%Y%m%d"), suffix)
}

#[async_trait]
impl ApprovalHandler for OrderEngine {
    async fn preview(&self, target_id: Uuid, payload: &serde_json::Value, actor: &Actor) -> ExecResult<()> {
        let command: OrderStatusCommand = serde_json::from_value(payload.clone())?;
        self.preview_transition(target_id, command.status, &command.input, actor)
            .await
            .map(|_| ())
    }

    async fn replay(
        &self,
        target_id: Uuid,
        payload: &serde_json::Value,
        actor: &Actor,
    ) -> ExecResult<serde_json::Value> {
        let command: OrderStatusCommand = serde_json::from_value(payload.clone())?;
        let order = self
            .transition_status(target_id, command.status, command.input, actor)
            .await?;
        Ok(serde_json::to_value(order)?)
    }
}
