//! Return eligibility (pure)
//!
//! A line is eligible when all of the following hold:
//! - returns are enabled platform-wide
//! - the order was delivered
//! - the product is returnable (default: yes)
//! - `now <= delivered_at + window` (inclusive; product window, else platform default)
//! - the line has no active return request
//!
//! Every failing condition is reported, not just the first.

use bazaar_domain::{LineItem, LineItemId, Order, PlatformSettings, Product, ReturnStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable reason a line cannot be returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IneligibilityReason {
    /// Returns are switched off platform-wide
    ReturnsDisabled,
    /// The order has not been delivered yet
    NotDelivered,
    /// The product's policy forbids returns
    NotReturnable,
    /// The return window has closed
    WindowExpired {
        /// Last instant a return could be requested
        window_ends_at: DateTime<Utc>,
    },
    /// The line already has a return in progress or finished
    ActiveReturnExists {
        /// Status of that return
        status: ReturnStatus,
    },
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibilityReason::ReturnsDisabled => f.write_str("returns are currently disabled"),
            IneligibilityReason::NotDelivered => f.write_str("order has not been delivered yet"),
            IneligibilityReason::NotReturnable => f.write_str("product is not returnable"),
            IneligibilityReason::WindowExpired { window_ends_at } => {
                write!(f, "return window closed at {}", window_ends_at.format("%Y-%m-%d %H:%M UTC"))
            },
            IneligibilityReason::ActiveReturnExists { status } => {
                write!(f, "line already has a return in status {}", status)
            },
        }
    }
}

/// Human-readable list, `; `-separated
pub fn describe_reasons(reasons: &[IneligibilityReason]) -> String {
    reasons.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Eligibility verdict for one order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnEligibility {
    /// Line the verdict applies to
    pub line_item_id: LineItemId,
    /// True when `reasons` is empty
    pub eligible: bool,
    /// Every failing condition
    pub reasons: Vec<IneligibilityReason>,
    /// Window end, known once the order is delivered
    pub window_ends_at: Option<DateTime<Utc>>,
}

/// Evaluate whether a line can be returned at `now`
///
/// `product` is the current catalog entry; when the product is gone the
/// platform defaults apply.
pub fn evaluate_return_eligibility(
    settings: &PlatformSettings,
    order: &Order,
    line: &LineItem,
    product: Option<&Product>,
    now: DateTime<Utc>,
) -> ReturnEligibility {
    let mut reasons = Vec::new();

    if !settings.returns_enabled {
        reasons.push(IneligibilityReason::ReturnsDisabled);
    }

    if product.map(Product::is_returnable) == Some(false) {
        reasons.push(IneligibilityReason::NotReturnable);
    }

    let window_days = product
        .and_then(Product::return_window_days)
        .unwrap_or(settings.default_return_window_days);

    let window_ends_at = match (order.is_delivered, order.delivered_at) {
        (true, Some(delivered_at)) => {
            let ends = delivered_at + Duration::days(i64::from(window_days));
            if now > ends {
                reasons.push(IneligibilityReason::WindowExpired { window_ends_at: ends });
            }
            Some(ends)
        },
        _ => {
            reasons.push(IneligibilityReason::NotDelivered);
            None
        },
    };

    if !line.return_status.allows_new_request() {
        reasons.push(IneligibilityReason::ActiveReturnExists {
            status: line.return_status,
        });
    }

    ReturnEligibility {
        line_item_id: line.id,
        eligible: reasons.is_empty(),
        reasons,
        window_ends_at,
    }
}
