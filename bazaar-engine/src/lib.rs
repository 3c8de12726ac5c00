//! Bazaar Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes input → Returns decisions for the executor to carry out.
//!
//! # Modules
//!
//! - [`pricing`]: cart merging, line snapshots, totals
//! - [`delivery`]: expected delivery date
//! - [`order_transitions`]: order state machine and its side effects
//! - [`return_transitions`]: return state machine and its side effects
//! - [`eligibility`]: per-line return eligibility

#![warn(clippy::all)]

pub mod delivery;
pub mod eligibility;
mod error;
pub mod order_transitions;
pub mod pricing;
pub mod return_transitions;

pub use delivery::expected_delivery;
pub use eligibility::{describe_reasons, evaluate_return_eligibility, IneligibilityReason, ReturnEligibility};
pub use error::EngineError;
pub use order_transitions::{
    plan_order_transition, OrderTransitionInput, OrderTransitionPlan, StockMovement,
};
pub use pricing::{compute_totals, merge_cart_lines, price_line, CartLine};
pub use return_transitions::{plan_return_transition, ReturnTransitionInput, ReturnTransitionPlan};
