//! Mortality models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable journal entry for a registered loss event. Created exactly once
/// per registration; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortalityRecord {
    pub id: Uuid,
    /// Canonical lot reference: the first occupant of the pen at registration
    pub lot_id: Uuid,
    pub pen_id: Uuid,
    pub quantity: i32,
    pub death_date: NaiveDate,
    pub cause: String,
    /// Precise weighted-average loss computed at time of death
    pub estimated_loss: Decimal,
    pub notes: Option<String>,
    pub cycle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Per-lot share of a mortality loss
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotLossShare {
    pub lot_id: Uuid,
    pub lot_code: String,
    /// Share of the pen's head-count held by this lot, in percent
    pub percentage: Decimal,
    /// Portion of the total loss carried by this lot
    pub value: Decimal,
    /// Head removed from this lot by largest-remainder allocation
    pub heads_removed: i32,
}

/// Outcome of the weighted-average loss computation for a pen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MortalityCalculation {
    pub pen_id: Uuid,
    pub quantity: i32,
    pub total_heads: i32,
    pub total_value: Decimal,
    pub average_cost_per_head: Decimal,
    pub total_loss: Decimal,
    pub lots_affected: Vec<LotLossShare>,
}

/// Result of a mortality registration
#[derive(Debug, Clone, Serialize)]
pub struct MortalityRegistration {
    pub calculation: MortalityCalculation,
    pub record: MortalityRecord,
    /// Whether the loss was folded into the month's accrual statement
    pub integrated: bool,
}

/// Ex-post mortality reporting row for one lot.
///
/// `estimated_loss` here is the simplified uniform-cost estimate
/// (total cost / initial head-count x deaths), intentionally distinct from
/// the precise per-event loss stored on [`MortalityRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotMortalitySummary {
    pub lot_code: String,
    pub death_count: i32,
    pub initial_quantity: i32,
    pub mortality_rate: Decimal,
    pub estimated_loss: Decimal,
    /// Pen numbers the lot is (or was) allocated to
    pub pens: Vec<String>,
}

/// Aggregate mortality statistics over a filtered set of lots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortalitySummary {
    pub total_deaths: i32,
    pub total_animals: i32,
    pub mortality_rate: Decimal,
    pub estimated_total_loss: Decimal,
}

/// History query response: per-lot rows plus the aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortalityHistory {
    pub records: Vec<LotMortalitySummary>,
    pub summary: MortalitySummary,
}
