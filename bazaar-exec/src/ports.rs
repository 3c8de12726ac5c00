//! Execution layer port definitions.
//!
//! Ports define the interfaces for collaborators the core consumes but does
//! not own: platform settings, customer notifications and time.

use async_trait::async_trait;
use bazaar_domain::{ActorId, Money, OrderId, PlatformSettings, PricingPolicy, ReturnId, ReturnStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExecError;

// =============================================================================
// Settings Port
// =============================================================================

/// Source of the global settings snapshot.
///
/// Read once per operation; nothing caches the result across calls.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Returns toggle and default window
    async fn platform_settings(&self) -> Result<PlatformSettings, ExecError>;

    /// Tax, shipping and delivery defaults for checkout
    async fn pricing_policy(&self) -> Result<PricingPolicy, ExecError>;
}

// =============================================================================
// Notification Port
// =============================================================================

/// Message for the customer about their return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerNotification {
    /// Recipient
    pub customer_id: ActorId,
    /// Order the return belongs to
    pub order_id: OrderId,
    /// Return request
    pub return_id: ReturnId,
    /// Status the return just reached
    pub status: ReturnStatus,
    /// Product display name
    pub product_name: String,
    /// Refund issued (REFUNDED only)
    pub refund_amount: Option<Money>,
}

/// Port for best-effort customer notifications (email, push).
///
/// Callers bound every call with a timeout and never roll back on failure.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    /// Deliver one notification
    async fn notify(&self, notification: &CustomerNotification) -> Result<(), ExecError>;
}

// =============================================================================
// Clock Port
// =============================================================================

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}
