//! Checkout pricing (pure functions)
//!
//! Prices always come from the catalog, never from the client.
//!
//! ```text
//! items    = Σ unit_price × quantity
//! tax      = round(items × tax_rate)
//! shipping = 0 if items >= free_shipping_threshold else shipping_fee
//! total    = items + tax + shipping
//! ```

use crate::error::EngineError;
use bazaar_domain::{LineItem, Money, OrderTotals, PricingPolicy, Product, ProductId, Quantity};
use serde::{Deserialize, Serialize};

/// One requested cart line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product to buy
    pub product_id: ProductId,
    /// Units requested
    pub quantity: Quantity,
}

/// Merge duplicate product lines, keeping first-seen order
///
/// # Errors
/// Returns `EngineError::Invalid` for an empty cart
pub fn merge_cart_lines(lines: &[CartLine]) -> Result<Vec<CartLine>, EngineError> {
    if lines.is_empty() {
        return Err(EngineError::Invalid("Order has no items".to_string()));
    }

    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(*line),
        }
    }
    Ok(merged)
}

/// Snapshot catalog name and price into an order line
pub fn price_line(product: &Product, quantity: Quantity) -> LineItem {
    LineItem::new(product.id, product.name.clone(), quantity, product.price)
}

/// Compute order totals from priced lines
///
/// # Errors
/// Returns `EngineError::Invalid` if the policy carries a negative amount
pub fn compute_totals(items: &[LineItem], policy: &PricingPolicy) -> Result<OrderTotals, EngineError> {
    let items_price: Money = items.iter().map(LineItem::line_total).sum();
    let tax_price = items_price.apply_rate(policy.tax_rate);

    let shipping_price = if items_price.as_decimal() >= policy.free_shipping_threshold {
        Money::zero()
    } else {
        Money::new(policy.shipping_fee)
            .map_err(|e| EngineError::Invalid(format!("shipping fee: {}", e)))?
    };

    Ok(OrderTotals {
        items_price,
        tax_price,
        shipping_price,
        total_price: items_price + tax_price + shipping_price,
    })
}
