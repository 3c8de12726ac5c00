//! Bazaar Execution Layer
//!
//! Carries out the engine's decisions against the store, with compensation,
//! auditing and notifications.
//!
//! # Components
//!
//! - [`InventoryLedger`]: atomic stock reservation and release
//! - [`OrderEngine`]: order creation saga and status machine
//! - [`ReturnEngine`]: eligibility, return requests, return machine
//! - [`ApprovalGate`]: park, approve and reject privileged changes
//! - [`Commerce`]: facade wiring all of the above
//!
//! # Ports
//!
//! External collaborators are reached through traits in [`ports`]:
//! settings, customer notifications and the clock. [`stub`] has in-memory
//! versions for tests and local runs.

#![warn(clippy::all)]

pub mod approval;
pub mod commerce;
pub mod error;
pub mod event_bus;
pub mod ledger;
pub mod order_engine;
pub mod ports;
pub mod return_engine;
pub mod stub;

pub use approval::{ApprovalGate, ApprovalHandler, GateOutcome};
pub use commerce::Commerce;
pub use error::{ErrorKind, ExecError, ExecResult};
pub use event_bus::{CommerceEvent, EventBus, EventReceiver, Lagged};
pub use ledger::InventoryLedger;
pub use order_engine::{CreateOrderRequest, OrderEngine, OrderStatusCommand};
pub use ports::{Clock, CustomerNotification, NotificationPort, SettingsProvider};
pub use return_engine::{ReturnEngine, ReturnStatusCommand, DEFAULT_NOTIFY_TIMEOUT};
pub use stub::{FixedClock, LogNotifier, RecordingNotifier, StaticSettings, SystemClock};
