//! Bazaar Daemon Library
//!
//! Runtime host for the Bazaar commerce core.
//!
//! # Architecture
//!
//! ```text
//! HTTP client → API Server → Commerce → OrderEngine / ReturnEngine
//!                               │              │
//!                          ApprovalGate   InventoryLedger
//!                               │              │
//!                          AuditTrail ──── Store (memory | postgres)
//!                               │
//!                          Event Bus → Daemon event loop (logging)
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **API**: HTTP endpoints, caller identity from upstream headers
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaard::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_memory(config);
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;

#[cfg(feature = "postgres")]
pub mod db;

// Re-exports for convenience
pub use api::{create_router, ApiState};
pub use config::{ApiConfig, CommerceConfig, Config, Environment};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
