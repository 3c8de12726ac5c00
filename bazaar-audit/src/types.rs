//! Audit Event Types

use bazaar_domain::{ActorSnapshot, OrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Order persisted after all reservations succeeded
    OrderCreated,
    /// Order status transition
    OrderStatusChanged,
    /// Return request opened by the customer
    ReturnRequested,
    /// Return status transition
    ReturnStatusChanged,
    /// Returned units released back to stock
    InventoryRestored,
    /// Privileged transition parked for approval
    ApprovalRequested,
    /// Parked transition approved and replayed
    ApprovalApproved,
    /// Parked transition rejected
    ApprovalRejected,
}

impl AuditAction {
    /// Stable string form (matches the serialized tag)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OrderCreated => "ORDER_CREATED",
            AuditAction::OrderStatusChanged => "ORDER_STATUS_CHANGED",
            AuditAction::ReturnRequested => "RETURN_REQUESTED",
            AuditAction::ReturnStatusChanged => "RETURN_STATUS_CHANGED",
            AuditAction::InventoryRestored => "INVENTORY_RESTORED",
            AuditAction::ApprovalRequested => "APPROVAL_REQUESTED",
            AuditAction::ApprovalApproved => "APPROVAL_APPROVED",
            AuditAction::ApprovalRejected => "APPROVAL_REJECTED",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        [
            AuditAction::OrderCreated,
            AuditAction::OrderStatusChanged,
            AuditAction::ReturnRequested,
            AuditAction::ReturnStatusChanged,
            AuditAction::InventoryRestored,
            AuditAction::ApprovalRequested,
            AuditAction::ApprovalApproved,
            AuditAction::ApprovalRejected,
        ]
        .into_iter()
        .find(|a| a.as_str() == s)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generic pointer to the entity an event is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTarget {
    /// Model name ("Order", "ReturnRequest", "ApprovalRequest", "Product")
    pub model: String,
    /// Entity id
    pub id: Uuid,
}

/// Immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    // Identity
    pub id: Uuid,

    // What it is about
    pub order_id: Option<OrderId>,
    pub target: Option<AuditTarget>,

    // What happened
    pub action: AuditAction,
    pub status_from: Option<String>,
    pub status_to: Option<String>,

    // Who did it
    pub actor: ActorSnapshot,

    // Context
    pub note: Option<String>,
    pub metadata: serde_json::Value,

    // Temporal
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Create a new event
    pub fn new(action: AuditAction, actor: ActorSnapshot) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id: None,
            target: None,
            action,
            status_from: None,
            status_to: None,
            actor,
            note: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Set order reference
    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Set generic target
    pub fn with_target(mut self, model: impl Into<String>, id: Uuid) -> Self {
        self.target = Some(AuditTarget {
            model: model.into(),
            id,
        });
        self
    }

    /// Set status transition
    pub fn with_transition(mut self, from: impl fmt::Display, to: impl fmt::Display) -> Self {
        self.status_from = Some(from.to_string());
        self.status_to = Some(to.to_string());
        self
    }

    /// Set resulting status only (creation events)
    pub fn with_status(mut self, to: impl fmt::Display) -> Self {
        self.status_to = Some(to.to_string());
        self
    }

    /// Set note
    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    /// Set metadata blob
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set creation time (clock injection)
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Audit log errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit sink unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
