//! Audit Trail Module
//!
//! Provides an append-only audit log with:
//! - One immutable event per meaningful transition (at-least-once)
//! - Actor snapshots (id, display name, role) instead of live references
//! - Best-effort writes: failures are logged and counted, never propagated
//!
//! # Usage
//!
//! ```rust
//! use bazaar_audit::{AuditAction, AuditEvent, AuditTrail, MemoryAuditSink, QueryOptions};
//! use bazaar_domain::Actor;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example() {
//! let trail = AuditTrail::new(Arc::new(MemoryAuditSink::new()));
//! let order_id = Uuid::now_v7();
//!
//! trail
//!     .record(
//!         AuditEvent::new(AuditAction::OrderStatusChanged, Actor::system().snapshot())
//!             .with_order(order_id)
//!             .with_transition("CREATED", "PAID"),
//!     )
//!     .await;
//!
//! let events = trail.query(&QueryOptions::for_order(order_id)).await.unwrap();
//! assert_eq!(events.len(), 1);
//! # }
//! ```

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod query;
pub mod sink;
pub mod trail;
pub mod types;

pub use memory::MemoryAuditSink;
#[cfg(feature = "postgres")]
pub use postgres::PgAuditSink;
pub use query::QueryOptions;
pub use sink::AuditSink;
pub use trail::AuditTrail;
pub use types::{AuditAction, AuditError, AuditEvent, AuditTarget};
