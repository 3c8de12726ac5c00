//! Best-effort audit trail
//!
//! Audit writes happen after the primary change has been persisted. A failed
//! write is logged and counted, never returned to the caller.

use crate::query::QueryOptions;
use crate::sink::AuditSink;
use crate::types::{AuditEvent, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Fire-and-forget front of an [`AuditSink`]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    failures: AtomicU64,
}

impl AuditTrail {
    /// Wrap a sink
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            failures: AtomicU64::new(0),
        }
    }

    /// Append an event, swallowing and reporting any failure
    pub async fn record(&self, event: AuditEvent) {
        match self.sink.append(&event).await {
            Ok(()) => {
                debug!(
                    event_id = %event.id,
                    action = %event.action,
                    order_id = ?event.order_id,
                    "Audit event recorded"
                );
            },
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    event_id = %event.id,
                    action = %event.action,
                    order_id = ?event.order_id,
                    error = %e,
                    "Audit event dropped"
                );
            },
        }
    }

    /// Read events (errors do propagate here)
    pub async fn query(&self, options: &QueryOptions) -> Result<Vec<AuditEvent>> {
        self.sink.query(options).await
    }

    /// Number of events dropped since startup
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
