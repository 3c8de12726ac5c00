//! Return engine: eligibility, customer requests and the return machine.
//!
//! The order line carries a mirror of its latest return status. Every write
//! moves the mirror first with a conditional update, then the request; a
//! failed request write puts the mirror back.

use crate::approval::ApprovalHandler;
use crate::error::{require_capability, ExecError, ExecResult};
use crate::event_bus::{CommerceEvent, EventBus};
use crate::ledger::InventoryLedger;
use crate::ports::{Clock, CustomerNotification, NotificationPort, SettingsProvider};
use async_trait::async_trait;
use bazaar_audit::{AuditAction, AuditEvent, AuditTrail};
use bazaar_domain::{
    Actor, Capability, FinancialRecord, LineItemId, Order, OrderId, ReturnDetails, ReturnId,
    ReturnReason, ReturnRequest, ReturnStatus,
};
use bazaar_engine::{
    evaluate_return_eligibility, plan_return_transition, ReturnEligibility, ReturnTransitionInput,
    ReturnTransitionPlan,
};
use bazaar_store::{Store, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default bound on a single customer notification
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Return status change as stored in an approval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatusCommand {
    pub status: ReturnStatus,
    #[serde(flatten)]
    pub input: ReturnTransitionInput,
}

pub struct ReturnEngine {
    store: Arc<dyn Store>,
    ledger: InventoryLedger,
    audit: Arc<AuditTrail>,
    settings: Arc<dyn SettingsProvider>,
    notifier: Arc<dyn NotificationPort>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    notify_timeout: Duration,
}

impl ReturnEngine {
    pub fn new(
        store: Arc<dyn Store>,
        audit: Arc<AuditTrail>,
        settings: Arc<dyn SettingsProvider>,
        notifier: Arc<dyn NotificationPort>,
        clock: Arc<dyn Clock>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            ledger: InventoryLedger::new(store.clone()),
            store,
            audit,
            settings,
            notifier,
            clock,
            events,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    /// Bound customer notifications by `timeout`
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    // =========================================================================
    // Eligibility
    // =========================================================================

    /// Eligibility of every line of an order at the current instant
    pub async fn eligibility(&self, order_id: OrderId, actor: &Actor) -> ExecResult<Vec<ReturnEligibility>> {
        let order = self.load_order(order_id).await?;
        ensure_owner_or_staff(actor, &order)?;

        let settings = self.settings.platform_settings().await?;
        let ids: Vec<_> = order.items.iter().map(|l| l.product_id).collect();
        let products = self.store.products().find_many(&ids).await?;
        let now = self.clock.now();

        Ok(order
            .items
            .iter()
            .map(|line| {
                let product = products.iter().find(|p| p.id == line.product_id);
                evaluate_return_eligibility(&settings, &order, line, product, now)
            })
            .collect())
    }

    // =========================================================================
    // Customer Request
    // =========================================================================

    /// Open a return request for one line
    ///
    /// Eligibility is re-evaluated here with a fresh settings snapshot; the
    /// mirror update is conditional so two concurrent requests for the same
    /// line cannot both succeed.
    pub async fn request_return(
        &self,
        order_id: OrderId,
        line_item_id: LineItemId,
        reason: ReturnReason,
        details: ReturnDetails,
        actor: &Actor,
    ) -> ExecResult<ReturnRequest> {
        let order = self.load_order(order_id).await?;
        ensure_owner_or_staff(actor, &order)?;
        let line = order
            .line(line_item_id)
            .ok_or_else(|| ExecError::not_found("line_item", line_item_id))?;

        let settings = self.settings.platform_settings().await?;
        let product = self.store.products().find_by_id(line.product_id).await?;
        let now = self.clock.now();

        let verdict = evaluate_return_eligibility(&settings, &order, line, product.as_ref(), now);
        if !verdict.eligible {
            debug!(%order_id, %line_item_id, reasons = ?verdict.reasons, "Return refused");
            return Err(ExecError::IneligibleReturn {
                line_item_id,
                reasons: verdict.reasons,
            });
        }

        let previous = line.return_status;
        let request = ReturnRequest::open(&order, line, reason, details, actor.snapshot(), now)?;

        self.store
            .orders()
            .set_line_return_status(
                order_id,
                line_item_id,
                &[ReturnStatus::None, ReturnStatus::Rejected],
                ReturnStatus::Requested,
            )
            .await
            .map_err(|e| line_conflict(e, line_item_id))?;

        if let Err(e) = self.store.returns().insert(&request).await {
            error!(%order_id, %line_item_id, error = %e, "Return insert failed, reverting line");
            self.revert_mirror(order_id, line_item_id, ReturnStatus::Requested, previous).await;
            return Err(e.into());
        }

        info!(
            return_id = %request.id,
            %order_id,
            %line_item_id,
            reason = ?request.reason,
            "Return requested"
        );

        self.audit
            .record(
                AuditEvent::new(AuditAction::ReturnRequested, actor.snapshot())
                    .with_order(order_id)
                    .with_target("ReturnRequest", request.id)
                    .with_transition(previous, ReturnStatus::Requested)
                    .with_note(request.comments.clone())
                    .with_metadata(json!({
                        "line_item_id": line_item_id,
                        "reason": request.reason,
                        "quantity": request.quantity,
                        "refund_amount": request.refund_amount,
                    }))
                    .at(now),
            )
            .await;

        self.events.send(CommerceEvent::ReturnStatusChanged {
            return_id: request.id,
            order_id,
            from: previous,
            to: ReturnStatus::Requested,
        });

        Ok(request)
    }

    // =========================================================================
    // Administrative Transitions
    // =========================================================================

    /// Decide a return status change without applying it
    pub async fn preview_transition(
        &self,
        return_id: ReturnId,
        to: ReturnStatus,
        input: &ReturnTransitionInput,
        actor: &Actor,
    ) -> ExecResult<ReturnTransitionPlan> {
        let request = self.get_return(return_id).await?;
        Ok(plan_return_transition(&request, to, input, &actor.snapshot(), self.clock.now())?)
    }

    /// Apply a return status change with its side effects
    pub async fn transition_status(
        &self,
        return_id: ReturnId,
        to: ReturnStatus,
        input: ReturnTransitionInput,
        actor: &Actor,
    ) -> ExecResult<ReturnRequest> {
        require_capability(actor, Capability::ManageReturns, "change return status")?;

        let now = self.clock.now();
        let request = self.get_return(return_id).await?;
        let plan = plan_return_transition(&request, to, &input, &actor.snapshot(), now)?;
        let (order_id, line_item_id) = (request.order_id, request.line_item_id);

        self.store
            .orders()
            .set_line_return_status(order_id, line_item_id, &[plan.from], plan.to)
            .await
            .map_err(|e| line_conflict(e, line_item_id))?;

        let updated = match self.store.returns().update(&plan.request).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(%return_id, error = %e, "Return update failed, reverting line");
                self.revert_mirror(order_id, line_item_id, plan.to, plan.from).await;
                return Err(e.into());
            },
        };

        info!(
            %return_id,
            %order_id,
            from = %plan.from,
            to = %plan.to,
            actor_id = %actor.id,
            "Return status changed"
        );

        if let Some(restock) = plan.restock {
            match self.ledger.release(restock.product_id, restock.quantity).await {
                Ok(count) => {
                    self.audit
                        .record(
                            AuditEvent::new(AuditAction::InventoryRestored, actor.snapshot())
                                .with_order(order_id)
                                .with_target("Product", restock.product_id)
                                .with_metadata(json!({
                                    "return_id": return_id,
                                    "quantity": restock.quantity,
                                    "count_in_stock": count,
                                }))
                                .at(now),
                        )
                        .await;
                },
                Err(e) => error!(%return_id, product_id = %restock.product_id, error = %e, "Restock failed"),
            }
        }

        if let Some(amount) = plan.refund {
            let record = FinancialRecord::refund(order_id, return_id, amount, now);
            if let Err(e) = self.store.financial_records().insert(&record).await {
                error!(%return_id, %order_id, amount = %amount, error = %e, "Refund record insert failed");
            }
        }

        self.audit
            .record(
                AuditEvent::new(AuditAction::ReturnStatusChanged, actor.snapshot())
                    .with_order(order_id)
                    .with_target("ReturnRequest", return_id)
                    .with_transition(plan.from, plan.to)
                    .with_note(input.note.clone())
                    .with_metadata(json!({
                        "line_item_id": line_item_id,
                        "refund_amount": plan.refund,
                        "restore_inventory": plan.restock.is_some(),
                    }))
                    .at(now),
            )
            .await;

        if plan.notify_customer {
            self.notify(&updated, plan.refund).await;
        }

        self.events.send(CommerceEvent::ReturnStatusChanged {
            return_id,
            order_id,
            from: plan.from,
            to: plan.to,
        });

        Ok(updated)
    }

    /// Best-effort, time-bounded; never fails the transition
    async fn notify(&self, request: &ReturnRequest, refund: Option<bazaar_domain::Money>) {
        let notification = CustomerNotification {
            customer_id: request.customer_id,
            order_id: request.order_id,
            return_id: request.id,
            status: request.status,
            product_name: request.product_name.clone(),
            refund_amount: refund,
        };

        match tokio::time::timeout(self.notify_timeout, self.notifier.notify(&notification)).await {
            Ok(Ok(())) => debug!(return_id = %request.id, status = %request.status, "Customer notified"),
            Ok(Err(e)) => warn!(return_id = %request.id, error = %e, "Customer notification failed"),
            Err(_) => warn!(
                return_id = %request.id,
                timeout_ms = self.notify_timeout.as_millis() as u64,
                "Customer notification timed out"
            ),
        }
    }

    async fn revert_mirror(&self, order_id: OrderId, line_item_id: LineItemId, from: ReturnStatus, to: ReturnStatus) {
        if let Err(e) = self
            .store
            .orders()
            .set_line_return_status(order_id, line_item_id, &[from], to)
            .await
        {
            error!(%order_id, %line_item_id, error = %e, "Line return status revert failed");
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Load a return request
    pub async fn get_return(&self, return_id: ReturnId) -> ExecResult<ReturnRequest> {
        self.store
            .returns()
            .find_by_id(return_id)
            .await?
            .ok_or_else(|| ExecError::not_found("return_request", return_id))
    }

    /// Return requests of an order, oldest first
    pub async fn returns_for_order(&self, order_id: OrderId, actor: &Actor) -> ExecResult<Vec<ReturnRequest>> {
        let order = self.load_order(order_id).await?;
        ensure_owner_or_staff(actor, &order)?;
        Ok(self.store.returns().find_by_order(order_id).await?)
    }

    async fn load_order(&self, order_id: OrderId) -> ExecResult<Order> {
        self.store
            .orders()
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ExecError::not_found("order", order_id))
    }
}

fn ensure_owner_or_staff(actor: &Actor, order: &Order) -> ExecResult<()> {
    if actor.id == order.customer_id || actor.can(Capability::ManageReturns) {
        Ok(())
    } else {
        Err(ExecError::Unauthorized(format!(
            "{} may not act on returns of order {}",
            actor.display_name, order.invoice_number
        )))
    }
}

fn line_conflict(e: StoreError, line_item_id: LineItemId) -> ExecError {
    match e {
        StoreError::InvalidState { message } => {
            ExecError::Conflict(format!("line {} return status changed concurrently: {}", line_item_id, message))
        },
        other => other.into(),
    }
}

#[async_trait]
impl ApprovalHandler for ReturnEngine {
    async fn preview(&self, target_id: Uuid, payload: &serde_json::Value, actor: &Actor) -> ExecResult<()> {
        let command: ReturnStatusCommand = serde_json::from_value(payload.clone())?;
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
        let command: ReturnStatusCommand = serde_json::from_value(payload.clone())?;
        let request = self
            .transition_status(target_id, command.status, command.input, actor)
            .await?;
        Ok(serde_json::to_value(request)?)
    }
}
