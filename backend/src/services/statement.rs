//! Monthly accrual statement aggregation
//!
//! One statement per calendar month, optionally scoped to a production
//! cycle. Every revenue, cost or mortality event applies an additive delta;
//! the statement is created zero-initialized on the first increment.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{AccrualStatement, CostBucket, Period, StatementDelta};

use crate::error::{AppError, AppResult};
use crate::storage::{FeedlotStore, StatementStore};

/// Accrual statement service
#[derive(Clone)]
pub struct AccrualStatementService {
    store: Arc<dyn FeedlotStore>,
}

impl AccrualStatementService {
    pub fn new(store: Arc<dyn FeedlotStore>) -> Self {
        Self { store }
    }

    /// Apply an additive increment to a period statement
    pub async fn apply(
        &self,
        period: Period,
        cycle_id: Option<Uuid>,
        delta: StatementDelta,
    ) -> AppResult<AccrualStatement> {
        let statement = self
            .store
            .apply_statement_delta(period.first_day(), cycle_id, delta)
            .await?;
        tracing::debug!(
            period = %period,
            net_profit = %statement.net_profit,
            "Accrual statement updated"
        );
        Ok(statement)
    }

    /// Recognize revenue for a period
    pub async fn record_revenue(
        &self,
        period: Period,
        cycle_id: Option<Uuid>,
        amount: Decimal,
    ) -> AppResult<AccrualStatement> {
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("amount", "Revenue must be positive"));
        }
        self.apply(period, cycle_id, StatementDelta::revenue(amount))
            .await
    }

    /// Recognize an incurred cost for a period
    pub async fn record_cost(
        &self,
        period: Period,
        cycle_id: Option<Uuid>,
        bucket: CostBucket,
        amount: Decimal,
    ) -> AppResult<AccrualStatement> {
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("amount", "Cost must be positive"));
        }
        self.apply(period, cycle_id, StatementDelta::cost(bucket, amount))
            .await
    }

    /// The statement for a period, if any event has touched it
    pub async fn statement(
        &self,
        period: Period,
        cycle_id: Option<Uuid>,
    ) -> AppResult<Option<AccrualStatement>> {
        self.store
            .statement_for_month(period.first_day(), cycle_id)
            .await
    }
}
