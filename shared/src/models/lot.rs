//! Purchase lot models
//!
//! A lot is a batch of animals bought together and tracked as one
//! cost-bearing unit. Its accumulated book cost is the purchase price plus
//! freight, commission, health, feed and other operational costs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchased batch of animals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLot {
    pub id: Uuid,
    /// Unique lot code (e.g., "LOT-2025-0001")
    pub lot_code: String,
    pub initial_quantity: i32,
    pub current_quantity: i32,
    /// Running count of deaths registered against this lot
    pub death_count: i32,
    pub purchase_value: Decimal,
    pub freight_cost: Decimal,
    pub commission: Decimal,
    pub health_cost: Decimal,
    pub feed_cost: Decimal,
    pub operational_cost: Decimal,
    pub status: LotStatus,
    pub cycle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseLot {
    /// Accumulated book cost of the lot
    pub fn total_cost(&self) -> Decimal {
        self.purchase_value
            + self.freight_cost
            + self.commission
            + self.health_cost
            + self.feed_cost
            + self.operational_cost
    }

    /// Book value of one head at current head-count, zero for an empty lot
    pub fn book_cost_per_head(&self) -> Decimal {
        if self.current_quantity > 0 {
            self.total_cost() / Decimal::from(self.current_quantity)
        } else {
            Decimal::ZERO
        }
    }
}

/// Lot lifecycle status; lots are soft-archived, never destroyed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Active,
    Archived,
}

impl std::fmt::Display for LotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LotStatus::Active => write!(f, "active"),
            LotStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Generate a lot code
pub fn generate_lot_code(year: i32, sequence: i32) -> String {
    format!("LOT-{}-{:04}", year, sequence)
}
