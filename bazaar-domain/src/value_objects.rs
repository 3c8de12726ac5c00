//! Value Objects for the Bazaar domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Domain errors for value object and entity validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Money amounts cannot be negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Quantities must be positive
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Shipping address is incomplete
    #[error("Invalid shipping address: {0}")]
    InvalidAddress(String),

    /// Order request is malformed (empty, duplicate lines, ...)
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// Line item does not belong to the order
    #[error("Unknown line item: {0}")]
    UnknownLineItem(uuid::Uuid),

    /// Refund amount outside of the allowed range
    #[error("Invalid refund amount: {0}")]
    InvalidRefund(String),

    /// Unknown status / role / tag string
    #[error("Unknown {kind}: {value}")]
    UnknownTag {
        /// What was being parsed (status, role, ...)
        kind: &'static str,
        /// The rejected value
        value: String,
    },
}

// =============================================================================
// Money
// =============================================================================

/// Money represents a non-negative amount rounded to cents
///
/// # Invariants
/// - Must be >= 0
/// - Always carries at most 2 decimal places
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Create a new Money amount with validation
    ///
    /// The value is rounded half away from zero to 2 decimal places.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAmount` if value < 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value < Decimal::ZERO {
            return Err(DomainError::InvalidAmount(format!(
                "Amount must not be negative, got {}",
                value
            )));
        }
        Ok(Self(round_cents(value)))
    }

    /// Zero amount
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Multiply by a quantity (line total)
    pub fn times(&self, quantity: Quantity) -> Money {
        Self(round_cents(self.0 * Decimal::from(quantity.get())))
    }

    /// Multiply by a non-negative rate (e.g. tax rate), rounding to cents
    pub fn apply_rate(&self, rate: Decimal) -> Money {
        Self(round_cents(self.0 * rate.max(Decimal::ZERO)))
    }

    /// Check if amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Quantity of units of a product
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Create a new Quantity with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidQuantity` if value == 0
    pub fn new(value: u32) -> Result<Self, DomainError> {
        if value == 0 {
            return Err(DomainError::InvalidQuantity("Quantity must be positive".to_string()));
        }
        Ok(Self(value))
    }

    /// Get the underlying unit count
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Sum two quantities (used when merging duplicate lines)
    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(other.0))
    }
}

impl TryFrom<u32> for Quantity {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Quantity::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Shipping Address
// =============================================================================

/// Destination of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    /// Recipient full name
    pub recipient: String,
    /// Street and number
    pub street: String,
    /// City
    pub city: String,
    /// Postal code
    pub postal_code: String,
    /// Country name or ISO code
    pub country: String,
    /// Contact phone for the courier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Validate that all mandatory fields are present
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAddress` naming the first blank field
    pub fn validate(&self) -> Result<(), DomainError> {
        let fields = [
            ("recipient", &self.recipient),
            ("street", &self.street),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidAddress(format!("{} is required", name)));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer intends to pay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Paid to the courier on delivery
    CashOnDelivery,
    /// Card payment through the gateway
    Card,
    /// Wallet payment through the gateway
    Wallet,
    /// Manual bank transfer
    BankTransfer,
}

impl PaymentMethod {
    /// Whether payment is collected at delivery time
    pub fn collects_on_delivery(&self) -> bool {
        matches!(self, PaymentMethod::CashOnDelivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rejects_negative() {
        assert!(Money::new(dec!(-0.01)).is_err());
        assert!(Money::new(dec!(0)).is_ok());
    }

    #[test]
    fn test_money_rounds_to_cents() {
        let m = Money::new(dec!(10.005)).unwrap();
        assert_eq!(m.as_decimal(), dec!(10.01));
        assert_eq!(m.to_string(), "10.01");
    }

    #[test]
    fn test_money_times_quantity() {
        let unit = Money::new(dec!(19.99)).unwrap();
        let qty = Quantity::new(3).unwrap();
        assert_eq!(unit.times(qty).as_decimal(), dec!(59.97));
    }

    #[test]
    fn test_money_apply_rate() {
        let items = Money::new(dec!(59.97)).unwrap();
        // 15% of 59.97 = 8.9955 -> 9.00
        assert_eq!(items.apply_rate(dec!(0.15)).as_decimal(), dec!(9.00));
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [dec!(1.10), dec!(2.20), dec!(3.30)]
            .into_iter()
            .map(|d| Money::new(d).unwrap())
            .sum();
        assert_eq!(total.as_decimal(), dec!(6.60));
    }

    #[test]
    fn test_money_deserialize_validates() {
        let bad: Result<Money, _> = serde_json::from_str("\"-5\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_quantity_zero_rejected() {
        assert!(Quantity::new(0).is_err());
        assert_eq!(Quantity::new(4).unwrap().get(), 4);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }

    #[test]
    fn test_address_validation() {
        let mut address = ShippingAddress {
            recipient: "Ada Lovelace".to_string(),
            street: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            postal_code: "N1".to_string(),
            country: "UK".to_string(),
            phone: None,
        };
        assert!(address.validate().is_ok());

        address.city = "   ".to_string();
        assert_eq!(
            address.validate(),
            Err(DomainError::InvalidAddress("city is required".to_string()))
        );
    }

    #[test]
    fn test_cash_on_delivery() {
        assert!(PaymentMethod::CashOnDelivery.collects_on_delivery());
        assert!(!PaymentMethod::Card.collects_on_delivery());
    }
}
