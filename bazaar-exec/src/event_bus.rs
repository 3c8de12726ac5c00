//! Event bus for in-process commerce notifications.
//!
//! Engines publish after their primary write has been persisted; the daemon
//! and tests subscribe. Uses tokio broadcast channels for fan-out to multiple
//! receivers. Publishing never fails and never blocks.

use bazaar_domain::{
    ActorId, ApprovalAction, ApprovalId, Money, OrderId, OrderStatus, ReturnId, ReturnStatus,
};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

// =============================================================================
// Event Types
// =============================================================================

/// Events that flow through the commerce event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum CommerceEvent {
    /// Order persisted with every line reserved
    OrderCreated {
        order_id: OrderId,
        customer_id: ActorId,
        total: Money,
    },

    /// Order status changed
    OrderStatusChanged {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Return request opened or moved
    ReturnStatusChanged {
        return_id: ReturnId,
        order_id: OrderId,
        from: ReturnStatus,
        to: ReturnStatus,
    },

    /// Transition parked for a resolver
    ApprovalRequested {
        approval_id: ApprovalId,
        action: ApprovalAction,
        target_id: Uuid,
    },
}

// =============================================================================
// Event Bus
// =============================================================================

/// Event bus for commerce-wide communication.
pub struct EventBus {
    sender: broadcast::Sender<CommerceEvent>,
}

impl EventBus {
    /// Bus buffering up to `capacity` events per slow receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a committed change; returns how many receivers got it.
    pub fn send(&self, event: CommerceEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!("Commerce event dropped, no receivers");
                0
            },
        }
    }

    /// Subscribe to events sent after this call.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// A receiver fell behind and the bus dropped events for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lagged(pub u64);

impl fmt::Display for Lagged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receiver lagged, missed {} events", self.0)
    }
}

/// Receiver for commerce events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<CommerceEvent>,
}

impl EventReceiver {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Result<CommerceEvent, Lagged>> {
        match self.receiver.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => Some(Err(Lagged(count))),
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Result<CommerceEvent, Lagged>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => None,
            Err(broadcast::error::TryRecvError::Lagged(count)) => Some(Err(Lagged(count))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_event() -> CommerceEvent {
        CommerceEvent::OrderStatusChanged {
            order_id: Uuid::now_v7(),
            from: OrderStatus::Created,
            to: OrderStatus::Paid,
        }
    }

    #[tokio::test]
    async fn test_fan_out() {
        let bus = EventBus::new(10);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.send(status_event()), 2);
        assert!(matches!(a.recv().await, Some(Ok(CommerceEvent::OrderStatusChanged { .. }))));
        assert!(matches!(b.recv().await, Some(Ok(CommerceEvent::OrderStatusChanged { .. }))));
    }

    #[test]
    fn test_send_without_receivers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.send(status_event()), 0);
    }

    #[test]
    fn test_lag_is_reported() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.send(status_event());
        }
        assert_eq!(rx.try_recv(), Some(Err(Lagged(3))));
    }
}
