//! Platform settings snapshots
//!
//! Settings are read per call from a provider and passed down as plain
//! values. Nothing in the core reads them from a global.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Default return window when neither product nor platform sets one
pub const DEFAULT_RETURN_WINDOW_DAYS: u32 = 7;

/// Default delivery estimate when no product carries one
pub const DEFAULT_DELIVERY_DAYS: u32 = 5;

/// Global platform toggles relevant to the order/return lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// Master switch for customer returns
    pub returns_enabled: bool,
    /// Window used when the product has no policy of its own
    pub default_return_window_days: u32,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            returns_enabled: true,
            default_return_window_days: DEFAULT_RETURN_WINDOW_DAYS,
        }
    }
}

/// Checkout pricing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Tax rate applied to the items price (0.15 = 15%)
    pub tax_rate: Decimal,
    /// Items price at or above which shipping is free
    pub free_shipping_threshold: Decimal,
    /// Flat shipping fee below the threshold
    pub shipping_fee: Decimal,
    /// Delivery estimate used when no product has one
    pub default_delivery_days: u32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: dec!(0.15),
            free_shipping_threshold: dec!(100),
            shipping_fee: dec!(10),
            default_delivery_days: DEFAULT_DELIVERY_DAYS,
        }
    }
}
