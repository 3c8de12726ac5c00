//! Commerce facade
//!
//! Wires the engines, the approval gate and the shared collaborators into
//! the operation surface the daemon exposes. Privileged status changes go
//! through the [`ApprovalGate`].

use crate::approval::{ApprovalGate, GateOutcome};
use crate::error::{require_capability, ExecResult};
use crate::event_bus::EventBus;
use crate::order_engine::{CreateOrderRequest, OrderEngine, OrderStatusCommand};
use crate::ports::{Clock, NotificationPort, SettingsProvider};
use crate::return_engine::{ReturnEngine, ReturnStatusCommand};
use bazaar_audit::{AuditEvent, AuditTrail, QueryOptions};
use bazaar_domain::{
    Actor, ApprovalAction, ApprovalId, ApprovalRequest, Capability, LineItemId, Order, OrderId,
    OrderStatus, ReturnDetails, ReturnId, ReturnReason, ReturnRequest, ReturnStatus,
};
use bazaar_engine::{OrderTransitionInput, ReturnEligibility, ReturnTransitionInput};
use bazaar_store::Store;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Operation surface of the commerce core
pub struct Commerce {
    orders: Arc<OrderEngine>,
    returns: Arc<ReturnEngine>,
    gate: ApprovalGate,
    audit: Arc<AuditTrail>,
    events: Arc<EventBus>,
}

impl Commerce {
    pub fn new(
        store: Arc<dyn Store>,
        audit: Arc<AuditTrail>,
        settings: Arc<dyn SettingsProvider>,
        notifier: Arc<dyn NotificationPort>,
        clock: Arc<dyn Clock>,
        notify_timeout: Duration,
    ) -> Self {
        let events = Arc::new(EventBus::default());

        let orders = Arc::new(OrderEngine::new(
            store.clone(),
            audit.clone(),
            settings.clone(),
            clock.clone(),
            events.clone(),
        ));
        let returns = Arc::new(
            ReturnEngine::new(store.clone(), audit.clone(), settings, notifier, clock.clone(), events.clone())
                .with_notify_timeout(notify_timeout),
        );
        let gate = ApprovalGate::new(store, audit.clone(), clock, events.clone())
            .with_handler(ApprovalAction::OrderStatusChange, orders.clone())
            .with_handler(ApprovalAction::ReturnStatusChange, returns.clone());

        Self {
            orders,
            returns,
            gate,
            audit,
            events,
        }
    }

    /// Bus carrying every committed change
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Audit trail (failure counter included)
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub async fn create_order(&self, actor: &Actor, request: CreateOrderRequest) -> ExecResult<Order> {
        self.orders.create_order(actor, request).await
    }

    pub async fn transition_order_status(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        input: OrderTransitionInput,
        actor: &Actor,
    ) -> ExecResult<GateOutcome<Order>> {
        require_capability(actor, Capability::ManageOrders, "change order status")?;
        let payload = serde_json::to_value(OrderStatusCommand {
            status: to,
            input: input.clone(),
        })?;

        self.gate
            .guard(actor, ApprovalAction::OrderStatusChange, order_id, payload, move || {
                self.orders.transition_status(order_id, to, input, actor)
            })
            .await
    }

    pub async fn get_order(&self, order_id: OrderId, actor: &Actor) -> ExecResult<Order> {
        let order = self.orders.get_order(order_id).await?;
        if order.customer_id != actor.id {
            require_capability(actor, Capability::ManageOrders, "view other customers' orders")?;
        }
        Ok(order)
    }

    /// Orders placed by the actor
    pub async fn my_orders(&self, actor: &Actor) -> ExecResult<Vec<Order>> {
        self.orders.orders_for_customer(actor.id).await
    }

    // =========================================================================
    // Returns
    // =========================================================================

    pub async fn return_eligibility(&self, order_id: OrderId, actor: &Actor) -> ExecResult<Vec<ReturnEligibility>> {
        self.returns.eligibility(order_id, actor).await
    }

    pub async fn request_return(
        &self,
        order_id: OrderId,
        line_item_id: LineItemId,
        reason: ReturnReason,
        details: ReturnDetails,
        actor: &Actor,
    ) -> ExecResult<ReturnRequest> {
        self.returns
            .request_return(order_id, line_item_id, reason, details, actor)
            .await
    }

    pub async fn transition_return_status(
        &self,
        return_id: ReturnId,
        to: ReturnStatus,
        input: ReturnTransitionInput,
        actor: &Actor,
    ) -> ExecResult<GateOutcome<ReturnRequest>> {
        require_capability(actor, Capability::ManageReturns, "change return status")?;
        let payload = serde_json::to_value(ReturnStatusCommand {
            status: to,
            input: input.clone(),
        })?;

        self.gate
            .guard(actor, ApprovalAction::ReturnStatusChange, return_id, payload, move || {
                self.returns.transition_status(return_id, to, input, actor)
            })
            .await
    }

    pub async fn get_return(&self, return_id: ReturnId, actor: &Actor) -> ExecResult<ReturnRequest> {
        let request = self.returns.get_return(return_id).await?;
        if request.customer_id != actor.id {
            require_capability(actor, Capability::ManageReturns, "view other customers' returns")?;
        }
        Ok(request)
    }

    pub async fn returns_for_order(&self, order_id: OrderId, actor: &Actor) -> ExecResult<Vec<ReturnRequest>> {
        self.returns.returns_for_order(order_id, actor).await
    }

    // =========================================================================
    // Approvals
    // =========================================================================

    pub async fn approve(&self, approval_id: ApprovalId, resolver: &Actor) -> ExecResult<(ApprovalRequest, serde_json::Value)> {
        self.gate.approve(approval_id, resolver).await
    }

    pub async fn reject(
        &self,
        approval_id: ApprovalId,
        resolver: &Actor,
        reason: Option<String>,
    ) -> ExecResult<ApprovalRequest> {
        self.gate.reject(approval_id, resolver, reason).await
    }

    pub async fn pending_approvals(&self, actor: &Actor) -> ExecResult<Vec<ApprovalRequest>> {
        require_capability(actor, Capability::ResolveApprovals, "list approvals")?;
        self.gate.pending().await
    }

    pub async fn get_approval(&self, approval_id: ApprovalId, actor: &Actor) -> ExecResult<ApprovalRequest> {
        let request = self.gate.get(approval_id).await?;
        if request.requester_id() != actor.id {
            require_capability(actor, Capability::ResolveApprovals, "view approvals")?;
        }
        Ok(request)
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Audit events of an order, oldest first
    pub async fn audit_for_order(&self, order_id: OrderId, actor: &Actor) -> ExecResult<Vec<AuditEvent>> {
        require_capability(actor, Capability::ManageOrders, "read the audit trail")?;
        Ok(self.audit.query(&QueryOptions::for_order(order_id)).await?)
    }

    /// Audit events of any entity (return request, approval, product)
    pub async fn audit_for_target(&self, target_id: Uuid, limit: Option<i64>, actor: &Actor) -> ExecResult<Vec<AuditEvent>> {
        require_capability(actor, Capability::ManageOrders, "read the audit trail")?;
        let mut options = QueryOptions::for_target(target_id);
        if let Some(limit) = limit {
            options = options.limit(limit).descending();
        }
        Ok(self.audit.query(&options).await?)
    }
}
