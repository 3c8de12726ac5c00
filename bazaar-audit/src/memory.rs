//! In-memory audit sink
//!
//! Used for tests and development. `set_unavailable` makes every append fail
//! so callers can prove audit failures never break the primary operation.

use crate::query::QueryOptions;
use crate::sink::AuditSink;
use crate::types::{AuditError, AuditEvent, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// In-memory append-only audit log
#[derive(Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
    unavailable: AtomicBool,
}

impl MemoryAuditSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent appends fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether nothing was stored yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored event, in append order
    pub fn all(&self) -> Vec<AuditEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, event: &AuditEvent) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuditError::Unavailable("memory sink switched off".to_string()));
        }
        let mut events = self
            .events
            .write()
            .map_err(|_| AuditError::Unavailable("memory sink lock poisoned".to_string()))?;
        events.push(event.clone());
        Ok(())
    }

    async fn query(&self, options: &QueryOptions) -> Result<Vec<AuditEvent>> {
        let events = self
            .events
            .read()
            .map_err(|_| AuditError::Unavailable("memory sink lock poisoned".to_string()))?;

        // Append order is creation order
        let mut found: Vec<AuditEvent> = events.iter().filter(|e| options.matches(e)).cloned().collect();
        if options.descending {
            found.reverse();
        }
        if let Some(limit) = options.limit {
            found.truncate(usize::try_from(limit.max(0)).unwrap_or(0));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuditAction;
    use bazaar_domain::ActorSnapshot;
    use uuid::Uuid;

    fn event(order_id: Uuid) -> AuditEvent {
        AuditEvent::new(
            AuditAction::OrderStatusChanged,
            ActorSnapshot {
                id: Uuid::now_v7(),
                name: "ops".to_string(),
                role: "ADMIN".to_string(),
            },
        )
        .with_order(order_id)
    }

    #[tokio::test]
    async fn test_append_and_query_with_limit() {
        let sink = MemoryAuditSink::new();
        let order_id = Uuid::now_v7();
        for _ in 0..3 {
            sink.append(&event(order_id)).await.unwrap();
        }
        sink.append(&event(Uuid::now_v7())).await.unwrap();

        let all = sink.query(&QueryOptions::for_order(order_id)).await.unwrap();
        assert_eq!(all.len(), 3);

        let newest = sink
            .query(&QueryOptions::for_order(order_id).descending().limit(1))
            .await
            .unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].id, all[2].id);
    }

    #[tokio::test]
    async fn test_unavailable_sink_errors() {
        let sink = MemoryAuditSink::new();
        sink.set_unavailable(true);
        assert!(sink.append(&event(Uuid::now_v7())).await.is_err());
        assert!(sink.is_empty());
    }
}
