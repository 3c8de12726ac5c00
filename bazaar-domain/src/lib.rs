//! Bazaar Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains entities, value objects, lifecycle enums and actor capabilities.

#![warn(clippy::all)]

// Public modules
pub mod actor;
pub mod approval;
pub mod entities;
pub mod finance;
pub mod returns;
pub mod settings;
pub mod value_objects;

// Re-export commonly used types
pub use actor::{Actor, ActorId, ActorSnapshot, Capability, CapabilitySet, Role};
pub use approval::{ApprovalAction, ApprovalId, ApprovalRequest, ApprovalStatus};
pub use entities::{
    CancellationInfo, CourierInfo, InventoryCounter, LineItem, LineItemId, NewOrder, Order,
    OrderId, OrderStatus, OrderTotals, PaymentResult, Product, ProductId, ReturnPolicy,
};
pub use finance::{FinancialRecord, FinancialRecordKind, RecordReference};
pub use returns::{
    PickupDetails, ReturnDetails, ReturnHistoryEntry, ReturnId, ReturnReason, ReturnRequest,
    ReturnStatus,
};
pub use settings::{PlatformSettings, PricingPolicy, DEFAULT_DELIVERY_DAYS, DEFAULT_RETURN_WINDOW_DAYS};
pub use value_objects::{DomainError, Money, PaymentMethod, Quantity, ShippingAddress};
