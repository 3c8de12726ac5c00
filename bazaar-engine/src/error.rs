//! Engine errors

use bazaar_domain::{DomainError, OrderStatus, ReturnStatus};

/// Decision failures
///
/// Every variant except `Invalid` and `Domain` describes a request that
/// conflicts with the current state of the entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Transition not allowed by the order state machine
    #[error("Invalid order transition: {from} -> {to}")]
    InvalidOrderTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// Order already has the requested status
    #[error("Order is already {0}")]
    SameStatus(OrderStatus),

    /// PAID requested on an order that is already paid
    #[error("Order is already paid")]
    AlreadyPaid,

    /// DELIVERED requested on an order that is already delivered
    #[error("Order is already delivered")]
    AlreadyDelivered,

    /// CANCELLED requested after delivery
    #[error("Delivered orders cannot be cancelled")]
    CancelAfterDelivery,

    /// Fulfillment requested before payment on a prepaid order
    #[error("Order must be paid before {0}")]
    PaymentRequired(OrderStatus),

    /// Transition not allowed by the return state machine
    #[error("Invalid return transition: {from} -> {to}")]
    InvalidReturnTransition {
        /// Current status
        from: ReturnStatus,
        /// Requested status
        to: ReturnStatus,
    },

    /// Malformed input
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Domain validation failure
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// Whether the error means "the entity is not in a state that allows this"
    pub fn is_conflict(&self) -> bool {
        !matches!(self, EngineError::Invalid(_) | EngineError::Domain(_))
    }
}
