//! Audit Querying

use crate::types::{AuditAction, AuditEvent};
use bazaar_domain::OrderId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Query options for reading audit events
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Filter by order reference
    pub order_id: Option<OrderId>,

    /// Filter by generic target id
    pub target_id: Option<Uuid>,

    /// Filter by action
    pub action: Option<AuditAction>,

    /// Start time (inclusive)
    pub from_time: Option<DateTime<Utc>>,

    /// End time (exclusive)
    pub to_time: Option<DateTime<Utc>>,

    /// Limit results
    pub limit: Option<i64>,

    /// Newest first when set
    pub descending: bool,
}

impl QueryOptions {
    /// All events, oldest first
    pub fn new() -> Self {
        Self::default()
    }

    /// Events of one order
    pub fn for_order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Self::default()
        }
    }

    /// Events about one target entity
    pub fn for_target(target_id: Uuid) -> Self {
        Self {
            target_id: Some(target_id),
            ..Self::default()
        }
    }

    /// Filter by action
    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Filter by time range
    pub fn time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from_time = Some(from);
        self.to_time = Some(to);
        self
    }

    /// Limit results
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sort descending by time
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// In-process filter (memory sink)
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(order_id) = self.order_id {
            if event.order_id != Some(order_id) {
                return false;
            }
        }
        if let Some(target_id) = self.target_id {
            if event.target.as_ref().map(|t| t.id) != Some(target_id) {
                return false;
            }
        }
        if let Some(action) = self.action {
            if event.action != action {
                return false;
            }
        }
        if let Some(from) = self.from_time {
            if event.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to_time {
            if event.created_at >= to {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_domain::ActorSnapshot;

    fn event(order_id: OrderId, action: AuditAction) -> AuditEvent {
        AuditEvent::new(
            action,
            ActorSnapshot {
                id: Uuid::now_v7(),
                name: "sys".to_string(),
                role: "SYSTEM".to_string(),
            },
        )
        .with_order(order_id)
    }

    #[test]
    fn test_matches_order_and_action() {
        let order_id = Uuid::now_v7();
        let opts = QueryOptions::for_order(order_id).action(AuditAction::OrderCreated);

        assert!(opts.matches(&event(order_id, AuditAction::OrderCreated)));
        assert!(!opts.matches(&event(order_id, AuditAction::OrderStatusChanged)));
        assert!(!opts.matches(&event(Uuid::now_v7(), AuditAction::OrderCreated)));
    }

    #[test]
    fn test_matches_target() {
        let target = Uuid::now_v7();
        let e = event(Uuid::now_v7(), AuditAction::ReturnStatusChanged).with_target("ReturnRequest", target);
        assert!(QueryOptions::for_target(target).matches(&e));
        assert!(!QueryOptions::for_target(Uuid::now_v7()).matches(&e));
    }
}
