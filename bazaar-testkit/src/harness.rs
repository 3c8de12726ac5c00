//! In-memory harness wiring the whole commerce core.

use crate::fixtures::{address, super_admin};
use anyhow::{anyhow, Result};
use bazaar_audit::{AuditTrail, MemoryAuditSink};
use bazaar_domain::{
    Actor, Order, OrderId, OrderStatus, PaymentMethod, PaymentResult, PlatformSettings, PricingPolicy,
    Product, ProductId, Quantity,
};
use bazaar_engine::{CartLine, OrderTransitionInput};
use bazaar_exec::{
    Commerce, CreateOrderRequest, FixedClock, GateOutcome, RecordingNotifier, StaticSettings,
};
use bazaar_store::{MemoryStore, Store};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

/// Everything a scenario test needs, backed by memory
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub audit_sink: Arc<MemoryAuditSink>,
    pub settings: Arc<StaticSettings>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<FixedClock>,
    pub commerce: Arc<Commerce>,
    /// Top-privilege operator used by the fast-forward helpers
    pub operator: Actor,
}

impl Harness {
    /// Harness with default settings, clock frozen at 2024-03-01 09:00 UTC
    pub fn new() -> Self {
        Self::with_settings(PlatformSettings::default())
    }

    pub fn with_settings(platform: PlatformSettings) -> Self {
        let start: DateTime<Utc> = Utc
            .with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);

        let store = Arc::new(MemoryStore::new());
        let audit_sink = Arc::new(MemoryAuditSink::new());
        let settings = Arc::new(StaticSettings::new(platform, PricingPolicy::default()));
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(FixedClock::new(start));

        let commerce = Arc::new(Commerce::new(
            store.clone(),
            Arc::new(AuditTrail::new(audit_sink.clone())),
            settings.clone(),
            notifier.clone(),
            clock.clone(),
            std::time::Duration::from_millis(200),
        ));

        Self {
            store,
            audit_sink,
            settings,
            notifier,
            clock,
            commerce,
            operator: super_admin("Operator"),
        }
    }

    /// Persist a product
    pub async fn seed(&self, product: Product) -> Result<ProductId> {
        let id = product.id;
        self.store.products().save(&product).await?;
        Ok(id)
    }

    /// Current stock of a tracked product
    pub fn stock(&self, id: ProductId) -> Option<u32> {
        self.store.stock_of(id)
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    /// Place an order paid by card
    pub async fn place(&self, customer: &Actor, lines: &[(ProductId, u32)]) -> Result<Order> {
        let items = lines
            .iter()
            .map(|(product_id, qty)| {
                Ok(CartLine {
                    product_id: *product_id,
                    quantity: Quantity::new(*qty)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self
            .commerce
            .create_order(
                customer,
                CreateOrderRequest {
                    items,
                    shipping_address: address(),
                    payment_method: PaymentMethod::Card,
                },
            )
            .await?)
    }

    /// Apply a status change as the operator
    pub async fn set_status(&self, order_id: OrderId, to: OrderStatus) -> Result<Order> {
        let input = if to == OrderStatus::Paid {
            OrderTransitionInput {
                payment_result: Some(PaymentResult {
                    provider: "card".to_string(),
                    reference: format!("pay-{}", order_id),
                    payer_email: None,
                }),
                ..Default::default()
            }
        } else {
            OrderTransitionInput::default()
        };

        match self
            .commerce
            .transition_order_status(order_id, to, input, &self.operator)
            .await?
        {
            GateOutcome::Applied(order) => Ok(order),
            GateOutcome::PendingApproval(_) => Err(anyhow!("operator change was parked")),
        }
    }

    /// Pay, ship and deliver an order at the current clock instant
    pub async fn deliver(&self, order_id: OrderId) -> Result<Order> {
        self.set_status(order_id, OrderStatus::Paid).await?;
        self.set_status(order_id, OrderStatus::Shipped).await?;
        self.set_status(order_id, OrderStatus::Delivered).await
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
