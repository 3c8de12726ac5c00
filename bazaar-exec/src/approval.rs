//! Approval gate for privileged transitions.
//!
//! A top-privilege actor's change runs immediately. Anyone else gets a
//! PENDING [`ApprovalRequest`] carrying the serialized command; a resolver
//! later approves (the command is replayed through the handler registered
//! for its action) or rejects it.
//!
//! At most one PENDING request exists per (action, target); the store
//! enforces it with a uniqueness constraint.

use crate::error::{require_capability, ExecError, ExecResult};
use crate::event_bus::{CommerceEvent, EventBus};
use crate::ports::Clock;
use async_trait::async_trait;
use bazaar_audit::{AuditAction, AuditEvent, AuditTrail};
use bazaar_domain::{Actor, ApprovalAction, ApprovalId, ApprovalRequest, ApprovalStatus, Capability};
use bazaar_store::{Store, StoreError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

// =============================================================================
// Handler Trait
// =============================================================================

/// Executes a parked command for one [`ApprovalAction`]
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Check that the command would currently apply, without applying it
    async fn preview(&self, target_id: Uuid, payload: &Value, actor: &Actor) -> ExecResult<()>;

    /// Apply the command as `actor`
    async fn replay(&self, target_id: Uuid, payload: &Value, actor: &Actor) -> ExecResult<Value>;
}

/// Result of passing a change through the gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome<T> {
    /// The change ran
    Applied(T),
    /// The change was parked
    PendingApproval(ApprovalRequest),
}

impl<T> GateOutcome<T> {
    /// Whether the change was parked
    pub fn is_pending(&self) -> bool {
        matches!(self, GateOutcome::PendingApproval(_))
    }
}

// =============================================================================
// Gate
// =============================================================================

pub struct ApprovalGate {
    store: Arc<dyn Store>,
    audit: Arc<AuditTrail>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    handlers: HashMap<ApprovalAction, Arc<dyn ApprovalHandler>>,
}

impl ApprovalGate {
    pub fn new(
        store: Arc<dyn Store>,
        audit: Arc<AuditTrail>,
        clock: Arc<dyn Clock>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            events,
            handlers: HashMap::new(),
        }
    }

    /// Register the executor for an action
    pub fn with_handler(mut self, action: ApprovalAction, handler: Arc<dyn ApprovalHandler>) -> Self {
        self.handlers.insert(action, handler);
        self
    }

    fn handler(&self, action: ApprovalAction) -> ExecResult<&Arc<dyn ApprovalHandler>> {
        self.handlers
            .get(&action)
            .ok_or_else(|| ExecError::Config(format!("no handler registered for {}", action)))
    }

    /// Run `privileged` directly for a top-privilege actor, otherwise park the command
    ///
    /// A parked command is previewed first so a request that could never
    /// apply is refused up front.
    pub async fn guard<T, F, Fut>(
        &self,
        actor: &Actor,
        action: ApprovalAction,
        target_id: Uuid,
        payload: Value,
        privileged: F,
    ) -> ExecResult<GateOutcome<T>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = ExecResult<T>> + Send,
    {
        if actor.is_top_privilege() {
            return privileged().await.map(GateOutcome::Applied);
        }

        let handler = self.handler(action)?;
        if let Some(existing) = self.store.approvals().find_pending_for(action, target_id).await? {
            return Err(pending_conflict(&existing));
        }
        handler.preview(target_id, &payload, actor).await?;

        let request = ApprovalRequest::pending(actor.snapshot(), action, target_id, payload, self.clock.now());
        self.store
            .approvals()
            .insert_pending(&request)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate { .. } => ExecError::Conflict(format!(
                    "a {} request for {} is already pending",
                    action, target_id
                )),
                other => other.into(),
            })?;

        info!(
            approval_id = %request.id,
            %action,
            %target_id,
            requested_by = %actor.id,
            "Approval requested"
        );

        let mut requested = self.event(AuditAction::ApprovalRequested, actor, &request);
        requested.metadata["request_data"] = request.request_data.clone();
        self.audit.record(requested).await;

        self.events.send(CommerceEvent::ApprovalRequested {
            approval_id: request.id,
            action,
            target_id,
        });

        Ok(GateOutcome::PendingApproval(request))
    }

    /// Approve a PENDING request and replay its command as `resolver`
    ///
    /// If the replay fails the request goes back to PENDING and the error is
    /// returned. When another request already holds the pending slot for the
    /// same target, the request is closed as REJECTED with the replay error
    /// as its reason instead.
    pub async fn approve(&self, approval_id: ApprovalId, resolver: &Actor) -> ExecResult<(ApprovalRequest, Value)> {
        require_capability(resolver, Capability::ResolveApprovals, "resolve approvals")?;
        let pending = self.load_pending(approval_id).await?;
        let handler = self.handler(pending.action)?;

        let mut claimed = pending.clone();
        claimed.status = ApprovalStatus::Approved;
        claimed.resolved_by = Some(resolver.snapshot());
        claimed.resolved_at = Some(self.clock.now());
        self.claim(&claimed).await?;

        let result = match handler.replay(claimed.target_id, &claimed.request_data, resolver).await {
            Ok(result) => result,
            Err(e) => {
                warn!(%approval_id, error = %e, "Approved command failed, request back to pending");
                if let Err(revert) = self
                    .store
                    .approvals()
                    .update_if_status(&pending, ApprovalStatus::Approved)
                    .await
                {
                    // Another request took the pending slot; close this one
                    warn!(%approval_id, error = %revert, "Approval revert failed, rejecting");
                    let mut rejected = claimed.clone();
                    rejected.status = ApprovalStatus::Rejected;
                    rejected.rejection_reason = Some(e.to_string());
                    match self
                        .store
                        .approvals()
                        .update_if_status(&rejected, ApprovalStatus::Approved)
                        .await
                    {
                        Ok(()) => {
                            self.audit
                                .record(
                                    self.event(AuditAction::ApprovalRejected, resolver, &rejected)
                                        .with_note(rejected.rejection_reason.clone()),
                                )
                                .await;
                        },
                        Err(e) => error!(%approval_id, error = %e, "Approval left APPROVED after failed replay"),
                    }
                }
                return Err(e);
            },
        };

        info!(%approval_id, action = %claimed.action, resolver_id = %resolver.id, "Approval approved");
        self.audit
            .record(self.event(AuditAction::ApprovalApproved, resolver, &claimed))
            .await;

        Ok((claimed, result))
    }

    /// Reject a PENDING request
    pub async fn reject(
        &self,
        approval_id: ApprovalId,
        resolver: &Actor,
        reason: Option<String>,
    ) -> ExecResult<ApprovalRequest> {
        require_capability(resolver, Capability::ResolveApprovals, "resolve approvals")?;
        let mut rejected = self.load_pending(approval_id).await?;
        rejected.status = ApprovalStatus::Rejected;
        rejected.resolved_by = Some(resolver.snapshot());
        rejected.resolved_at = Some(self.clock.now());
        rejected.rejection_reason = reason.clone();
        self.claim(&rejected).await?;

        info!(%approval_id, action = %rejected.action, resolver_id = %resolver.id, "Approval rejected");
        self.audit
            .record(self.event(AuditAction::ApprovalRejected, resolver, &rejected).with_note(reason))
            .await;

        Ok(rejected)
    }

    /// All PENDING requests, oldest first
    pub async fn pending(&self) -> ExecResult<Vec<ApprovalRequest>> {
        Ok(self.store.approvals().find_pending().await?)
    }

    /// Load a request in any status
    pub async fn get(&self, approval_id: ApprovalId) -> ExecResult<ApprovalRequest> {
        self.store
            .approvals()
            .find_by_id(approval_id)
            .await?
            .ok_or_else(|| ExecError::not_found("approval_request", approval_id))
    }

    async fn load_pending(&self, approval_id: ApprovalId) -> ExecResult<ApprovalRequest> {
        let request = self.get(approval_id).await?;
        if !request.is_pending() {
            return Err(ExecError::Conflict(format!(
                "approval {} is already {}",
                approval_id, request.status
            )));
        }
        Ok(request)
    }

    /// Move PENDING → resolved; losing a race with another resolver is a conflict
    async fn claim(&self, resolved: &ApprovalRequest) -> ExecResult<()> {
        self.store
            .approvals()
            .update_if_status(resolved, ApprovalStatus::Pending)
            .await
            .map_err(|e| match e {
                StoreError::InvalidState { .. } => {
                    ExecError::Conflict(format!("approval {} was resolved concurrently", resolved.id))
                },
                other => other.into(),
            })
    }

    fn event(&self, action: AuditAction, actor: &Actor, request: &ApprovalRequest) -> AuditEvent {
        let mut event = AuditEvent::new(action, actor.snapshot())
            .with_target("ApprovalRequest", request.id)
            .with_status(request.status)
            .at(self.clock.now());
        if request.action == ApprovalAction::OrderStatusChange {
            event = event.with_order(request.target_id);
        }
        event.with_metadata(json!({
            "action": request.action,
            "target_model": request.target_model,
            "target_id": request.target_id,
        }))
    }
}

fn pending_conflict(existing: &ApprovalRequest) -> ExecError {
    ExecError::Conflict(format!(
        "approval {} for {} {} is already pending",
        existing.id, existing.target_model, existing.target_id
    ))
}
