//! Approval requests
//!
//! Privileged transitions requested by actors without top privilege are
//! parked here until someone with `ResolveApprovals` approves or rejects them.

use crate::actor::{ActorId, ActorSnapshot};
use crate::value_objects::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an ApprovalRequest
pub type ApprovalId = Uuid;

/// Privileged operation an approval request replays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    /// Order status transition
    OrderStatusChange,
    /// Return request status transition
    ReturnStatusChange,
}

impl ApprovalAction {
    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::OrderStatusChange => "ORDER_STATUS_CHANGE",
            ApprovalAction::ReturnStatusChange => "RETURN_STATUS_CHANGE",
        }
    }

    /// Model name of the entity the action targets
    pub fn target_model(&self) -> &'static str {
        match self {
            ApprovalAction::OrderStatusChange => "Order",
            ApprovalAction::ReturnStatusChange => "ReturnRequest",
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ORDER_STATUS_CHANGE" => Ok(ApprovalAction::OrderStatusChange),
            "RETURN_STATUS_CHANGE" => Ok(ApprovalAction::ReturnStatusChange),
            _ => Err(DomainError::UnknownTag {
                kind: "approval action",
                value: s.to_string(),
            }),
        }
    }
}

/// Approval lifecycle: PENDING → APPROVED | REJECTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Waiting for a resolver
    Pending,
    /// Approved and replayed
    Approved,
    /// Rejected, target untouched
    Rejected,
}

impl ApprovalStatus {
    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            _ => Err(DomainError::UnknownTag {
                kind: "approval status",
                value: s.to_string(),
            }),
        }
    }
}

/// A parked privileged operation
///
/// `request_data` holds the replay parameters verbatim; the gate never
/// interprets it, only the handler registered for `action` does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request identifier
    pub id: ApprovalId,
    /// Who asked for the operation
    pub requested_by: ActorSnapshot,
    /// Operation to replay
    pub action: ApprovalAction,
    /// Model name of the target entity
    pub target_model: String,
    /// Target entity id
    pub target_id: Uuid,
    /// Replay parameters
    pub request_data: serde_json::Value,
    /// Lifecycle status
    pub status: ApprovalStatus,
    /// Who approved or rejected
    pub resolved_by: Option<ActorSnapshot>,
    /// Why it was rejected
    pub rejection_reason: Option<String>,
    /// When the request was created
    pub created_at: DateTime<Utc>,
    /// When it was resolved
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    /// New PENDING request
    pub fn pending(
        requested_by: ActorSnapshot,
        action: ApprovalAction,
        target_id: Uuid,
        request_data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            requested_by,
            action,
            target_model: action.target_model().to_string(),
            target_id,
            request_data,
            status: ApprovalStatus::Pending,
            resolved_by: None,
            rejection_reason: None,
            created_at: now,
            resolved_at: None,
        }
    }

    /// Requester id
    pub fn requester_id(&self) -> ActorId {
        self.requested_by.id
    }

    /// Still waiting for a resolver
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}
