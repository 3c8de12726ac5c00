//! Financial records
//!
//! Written only as a side effect of a refund.

use crate::entities::OrderId;
use crate::value_objects::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinancialRecordKind {
    /// Money returned to a customer
    Refund,
}

impl FinancialRecordKind {
    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            FinancialRecordKind::Refund => "REFUND",
        }
    }
}

/// Polymorphic pointer to the record's origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReference {
    /// Model name ("ReturnRequest")
    pub model: String,
    /// Entity id
    pub id: Uuid,
}

/// Ledger entry for a money movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialRecord {
    /// Record identifier
    pub id: Uuid,
    /// Movement kind
    pub kind: FinancialRecordKind,
    /// Amount moved
    pub amount: Money,
    /// Order the money belongs to
    pub order_id: OrderId,
    /// Entity that caused the movement
    pub reference: RecordReference,
    /// When it was recorded
    pub created_at: DateTime<Utc>,
}

impl FinancialRecord {
    /// Refund issued for a return request
    pub fn refund(order_id: OrderId, return_id: Uuid, amount: Money, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind: FinancialRecordKind::Refund,
            amount,
            order_id,
            reference: RecordReference {
                model: "ReturnRequest".to_string(),
                id: return_id,
            },
            created_at: now,
        }
    }
}
