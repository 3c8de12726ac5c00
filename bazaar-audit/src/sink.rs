//! Audit sink port

use crate::query::QueryOptions;
use crate::types::{AuditEvent, Result};
use async_trait::async_trait;

/// Append-only storage for audit events
///
/// Implementations must never update or delete an appended event.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one event
    async fn append(&self, event: &AuditEvent) -> Result<()>;

    /// Read events matching `options`
    async fn query(&self, options: &QueryOptions) -> Result<Vec<AuditEvent>>;
}
