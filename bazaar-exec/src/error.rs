//! Execution layer error types.

use bazaar_domain::{LineItemId, ProductId};
use bazaar_engine::{describe_reasons, IneligibilityReason};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during execution operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A product could not cover the requested quantity (nothing was kept reserved)
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Product that ran short
        product_id: ProductId,
        /// Units requested
        requested: u32,
        /// Units available at the time of the attempt
        available: u32,
    },

    /// Return eligibility check failed
    #[error("Return not eligible for line {line_item_id}: {}", describe_reasons(.reasons))]
    IneligibleReturn {
        /// Line the request was for
        line_item_id: LineItemId,
        /// Every failing condition
        reasons: Vec<IneligibilityReason>,
    },

    /// Request conflicts with the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Requested id
        id: Uuid,
    },

    /// Actor lacks the capability for the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed request
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] bazaar_store::StoreError),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] bazaar_domain::DomainError),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] bazaar_engine::EngineError),

    /// Audit read error (writes never surface)
    #[error("Audit error: {0}")]
    Audit(#[from] bazaar_audit::AuditError),

    /// Approval payload could not be encoded or decoded
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// External collaborator failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Timeout waiting for a collaborator
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Boundary-facing error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller may retry with a smaller quantity
    InsufficientStock,
    /// Carries machine-readable reasons
    IneligibleReturn,
    /// Invalid transition, double-pay, duplicate pending approval, stale write
    Conflict,
    /// Entity missing
    NotFound,
    /// Capability missing
    Unauthorized,
    /// Malformed request
    Invalid,
    /// Everything else
    Internal,
}

impl ExecError {
    /// Shorthand for a missing entity
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Classify for the boundary
    pub fn kind(&self) -> ErrorKind {
        use bazaar_store::StoreError;

        match self {
            ExecError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            ExecError::IneligibleReturn { .. } => ErrorKind::IneligibleReturn,
            ExecError::Conflict(_) => ErrorKind::Conflict,
            ExecError::NotFound { .. } => ErrorKind::NotFound,
            ExecError::Unauthorized(_) => ErrorKind::Unauthorized,
            ExecError::Invalid(_) | ExecError::Domain(_) | ExecError::Payload(_) => ErrorKind::Invalid,
            ExecError::Engine(e) if e.is_conflict() => ErrorKind::Conflict,
            ExecError::Engine(_) => ErrorKind::Invalid,
            ExecError::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            ExecError::Store(StoreError::Domain(_)) => ErrorKind::Invalid,
            ExecError::Store(e) if e.is_conflict() => ErrorKind::Conflict,
            ExecError::Store(_)
            | ExecError::Audit(_)
            | ExecError::Config(_)
            | ExecError::Collaborator(_)
            | ExecError::Timeout(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Fail with `Unauthorized` unless the actor holds `capability`
pub(crate) fn require_capability(
    actor: &bazaar_domain::Actor,
    capability: bazaar_domain::Capability,
    what: &str,
) -> ExecResult<()> {
    if actor.can(capability) {
        Ok(())
    } else {
        Err(ExecError::Unauthorized(format!("{} ({}) may not {}", actor.display_name, actor.role, what)))
    }
}
