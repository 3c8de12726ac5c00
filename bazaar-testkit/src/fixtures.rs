//! Actor, address and product fixtures.

use bazaar_domain::{Actor, Money, Product, ReturnPolicy, Role, ShippingAddress};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Customer with a fresh id
pub fn customer(name: &str) -> Actor {
    Actor::with_role(Uuid::now_v7(), name, Role::Customer)
}

/// Seller with a fresh id
pub fn seller(name: &str) -> Actor {
    Actor::with_role(Uuid::now_v7(), name, Role::Seller)
}

/// Admin: manages orders and returns, but goes through approval
pub fn admin(name: &str) -> Actor {
    Actor::with_role(Uuid::now_v7(), name, Role::Admin)
}

/// Top-privilege actor
pub fn super_admin(name: &str) -> Actor {
    Actor::with_role(Uuid::now_v7(), name, Role::SuperAdmin)
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        recipient: "Ana Costa".to_string(),
        street: "12 Harbour Road".to_string(),
        city: "Porto".to_string(),
        postal_code: "4000-123".to_string(),
        country: "PT".to_string(),
        phone: None,
    }
}

/// Product description for [`crate::Harness::seed`]
#[derive(Debug, Clone)]
pub struct ProductSpec {
    pub name: String,
    pub price: Decimal,
    /// `None` disables stock tracking
    pub stock: Option<u32>,
    pub return_policy: Option<ReturnPolicy>,
    pub estimated_delivery_days: Option<u32>,
}

impl ProductSpec {
    pub fn new(name: &str, price: Decimal, stock: u32) -> Self {
        Self {
            name: name.to_string(),
            price,
            stock: Some(stock),
            return_policy: None,
            estimated_delivery_days: None,
        }
    }

    pub fn untracked(mut self) -> Self {
        self.stock = None;
        self
    }

    pub fn return_policy(mut self, returnable: bool, window_days: Option<u32>) -> Self {
        self.return_policy = Some(ReturnPolicy {
            returnable,
            window_days,
        });
        self
    }

    pub fn delivery_days(mut self, days: u32) -> Self {
        self.estimated_delivery_days = Some(days);
        self
    }

    pub fn build(self) -> Product {
        let price = Money::new(self.price).unwrap_or_else(|_| Money::zero());
        let mut product = Product::new(self.name, price, self.stock.unwrap_or(0));
        if self.stock.is_none() {
            product.stock = bazaar_domain::InventoryCounter::untracked();
        }
        product.return_policy = self.return_policy;
        product.estimated_delivery_days = self.estimated_delivery_days;
        product
    }
}

/// Tracked product with default policies
pub fn product(name: &str, price: Decimal, stock: u32) -> Product {
    ProductSpec::new(name, price, stock).build()
}

/// Tracked product with an explicit return policy
pub fn product_with_policy(name: &str, price: Decimal, stock: u32, returnable: bool, window_days: Option<u32>) -> Product {
    ProductSpec::new(name, price, stock)
        .return_policy(returnable, window_days)
        .build()
}
