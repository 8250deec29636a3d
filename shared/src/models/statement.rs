//! Accrual statement models
//!
//! One statement per calendar month (optionally scoped to a production
//! cycle), recognizing revenue and expense when earned/incurred, independent
//! of cash timing. Upserts are additive: each event increments the existing
//! numeric fields rather than replacing the statement.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monthly accrual income statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualStatement {
    pub id: Uuid,
    /// First day of the statement month
    pub reference_month: NaiveDate,
    pub cycle_id: Option<Uuid>,
    pub gross_revenue: Decimal,
    /// Revenue deductions, mortality losses among them
    pub deductions: Decimal,
    pub net_revenue: Decimal,
    pub animal_cost: Decimal,
    pub feed_cost: Decimal,
    pub health_cost: Decimal,
    pub labor_cost: Decimal,
    pub other_costs: Decimal,
    pub total_costs: Decimal,
    pub gross_profit: Decimal,
    pub operational_profit: Decimal,
    pub net_profit: Decimal,
    pub net_margin: Decimal,
    pub status: StatementStatus,
    pub created_at: DateTime<Utc>,
}

impl AccrualStatement {
    /// Zero-initialized statement for a period, ready for the first increment
    pub fn empty(reference_month: NaiveDate, cycle_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference_month,
            cycle_id,
            gross_revenue: Decimal::ZERO,
            deductions: Decimal::ZERO,
            net_revenue: Decimal::ZERO,
            animal_cost: Decimal::ZERO,
            feed_cost: Decimal::ZERO,
            health_cost: Decimal::ZERO,
            labor_cost: Decimal::ZERO,
            other_costs: Decimal::ZERO,
            total_costs: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            operational_profit: Decimal::ZERO,
            net_profit: Decimal::ZERO,
            net_margin: Decimal::ZERO,
            status: StatementStatus::Draft,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatementStatus {
    Draft,
    Reviewing,
    Approved,
    Closed,
}

/// Accrual expense buckets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CostBucket {
    Animal,
    Feed,
    Health,
    Labor,
    Other,
}

/// Additive increments applied to a period statement in one upsert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementDelta {
    pub gross_revenue: Decimal,
    pub deductions: Decimal,
    pub net_revenue: Decimal,
    pub animal_cost: Decimal,
    pub feed_cost: Decimal,
    pub health_cost: Decimal,
    pub labor_cost: Decimal,
    pub other_costs: Decimal,
    pub total_costs: Decimal,
    pub gross_profit: Decimal,
    pub operational_profit: Decimal,
    pub net_profit: Decimal,
}

impl StatementDelta {
    /// Recognized revenue flows straight through to every profit line
    pub fn revenue(amount: Decimal) -> Self {
        Self {
            gross_revenue: amount,
            net_revenue: amount,
            gross_profit: amount,
            operational_profit: amount,
            net_profit: amount,
            ..Self::default()
        }
    }

    /// An incurred cost reduces every profit line below its bucket
    pub fn cost(bucket: CostBucket, amount: Decimal) -> Self {
        let mut delta = Self {
            total_costs: amount,
            gross_profit: -amount,
            operational_profit: -amount,
            net_profit: -amount,
            ..Self::default()
        };
        match bucket {
            CostBucket::Animal => delta.animal_cost = amount,
            CostBucket::Feed => delta.feed_cost = amount,
            CostBucket::Health => delta.health_cost = amount,
            CostBucket::Labor => delta.labor_cost = amount,
            CostBucket::Other => delta.other_costs = amount,
        }
        delta
    }

    /// A mortality loss is a revenue deduction carried down to net profit
    pub fn mortality(loss: Decimal) -> Self {
        Self {
            deductions: loss,
            net_revenue: -loss,
            gross_profit: -loss,
            operational_profit: -loss,
            net_profit: -loss,
            ..Self::default()
        }
    }

    /// Apply the increments to a statement in place
    pub fn apply_to(&self, statement: &mut AccrualStatement) {
        statement.gross_revenue += self.gross_revenue;
        statement.deductions += self.deductions;
        statement.net_revenue += self.net_revenue;
        statement.animal_cost += self.animal_cost;
        statement.feed_cost += self.feed_cost;
        statement.health_cost += self.health_cost;
        statement.labor_cost += self.labor_cost;
        statement.other_costs += self.other_costs;
        statement.total_costs += self.total_costs;
        statement.gross_profit += self.gross_profit;
        statement.operational_profit += self.operational_profit;
        statement.net_profit += self.net_profit;
        statement.net_margin = if statement.net_revenue.is_zero() {
            Decimal::ZERO
        } else {
            statement.net_profit / statement.net_revenue * Decimal::from(100)
        };
    }
}
