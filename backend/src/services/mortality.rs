//! Mortality loss calculation and registration
//!
//! When animals die in a pen shared by several lots, the book cost of the
//! pen's occupants is averaged and the loss distributed proportionally to
//! each lot's share of the head-count. The removed head are allocated with
//! the largest-remainder rule so they always sum to the registered death
//! count, and the loss value is allocated the same way down to the cent.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::{
    LotLossShare, LotMortalitySummary, MortalityCalculation, MortalityHistory, MortalityRecord,
    MortalityRegistration, MortalitySummary, PenOccupant,
};

use crate::error::{AppError, AppResult};
use crate::services::allocation::largest_remainder;
use crate::storage::{
    FeedlotStore, LotRemoval, MortalityCommit, MortalityFilter, MortalityStore, OccupancyStore,
};

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

fn default_integrate() -> bool {
    true
}

/// Input for registering a mortality event
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterMortalityInput {
    pub pen_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub date: NaiveDate,
    pub cause: String,
    pub notes: Option<String>,
    pub cycle_id: Option<Uuid>,
    /// Fold the loss into the month's accrual statement (default true)
    #[serde(default = "default_integrate")]
    pub integrate_financial: bool,
}

/// Mortality service: loss previews, registrations and history reporting
#[derive(Clone)]
pub struct MortalityService {
    store: Arc<dyn FeedlotStore>,
    retry_attempts: u32,
}

impl MortalityService {
    pub fn new(store: Arc<dyn FeedlotStore>) -> Self {
        Self {
            store,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    /// Override the bounded retry used when the occupancy snapshot changes
    /// between computation and commit
    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    /// Read-only preview of the loss a death count would cause in a pen.
    /// Never mutates; two consecutive calls with no intervening mutation
    /// return identical results.
    pub async fn calculate_mortality_loss(
        &self,
        pen_id: Uuid,
        quantity: i32,
    ) -> AppResult<MortalityCalculation> {
        let occupants = self.store.active_occupants(pen_id).await?;
        let calculation = compute_allocation(pen_id, quantity, &occupants)?;

        tracing::info!(
            %pen_id,
            quantity,
            total_loss = %calculation.total_loss,
            average_cost_per_head = %calculation.average_cost_per_head,
            lots = calculation.lots_affected.len(),
            "Mortality loss calculated"
        );
        Ok(calculation)
    }

    /// Register a mortality event: allocate the loss across the pen's lots,
    /// decrement head-counts, append the journal record and (unless opted
    /// out) deduct the loss from the month's accrual statement — atomically.
    pub async fn register_mortality(
        &self,
        input: RegisterMortalityInput,
    ) -> AppResult<MortalityRegistration> {
        input
            .validate()
            .map_err(|e| AppError::validation("quantity", e.to_string()))?;

        let cause = if input.cause.trim().is_empty() {
            "unknown".to_string()
        } else {
            input.cause.trim().to_string()
        };

        let mut attempt = 0;
        loop {
            // Fresh snapshot each attempt; the commit re-verifies it under
            // the transaction and reports a conflict when it went stale
            let occupants = self.store.active_occupants(input.pen_id).await?;
            let calculation = compute_allocation(input.pen_id, input.quantity, &occupants)?;

            let removals = calculation
                .lots_affected
                .iter()
                .zip(&occupants)
                .map(|(share, occupant)| LotRemoval {
                    link_id: occupant.link_id,
                    lot_id: occupant.lot_id,
                    heads: share.heads_removed,
                    loss_share: share.value,
                    expected_link_quantity: occupant.quantity,
                })
                .collect();

            let commit = MortalityCommit {
                pen_id: input.pen_id,
                quantity: input.quantity,
                death_date: input.date,
                cause: cause.clone(),
                notes: input.notes.clone(),
                cycle_id: input.cycle_id,
                total_loss: calculation.total_loss,
                removals,
                integrate_statement: input.integrate_financial,
            };

            match self.store.commit_mortality(commit).await {
                Ok(record) => {
                    tracing::info!(
                        record_id = %record.id,
                        total_loss = %calculation.total_loss,
                        integrated = input.integrate_financial,
                        "Mortality registered"
                    );
                    return Ok(MortalityRegistration {
                        calculation,
                        record,
                        integrated: input.integrate_financial,
                    });
                }
                Err(err) if err.is_retryable() && attempt < self.retry_attempts => {
                    attempt += 1;
                    tracing::warn!(
                        pen_id = %input.pen_id,
                        attempt,
                        "Occupancy changed during mortality registration, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Loss events matching the filter, ordered by death date
    pub async fn mortality_records(
        &self,
        filter: &MortalityFilter,
    ) -> AppResult<Vec<MortalityRecord>> {
        self.store.mortality_records(filter).await
    }

    /// Ex-post mortality history: per-lot rates and the simplified
    /// uniform-cost loss estimate (total cost / initial head x deaths).
    /// Deliberately not the precise per-event weighted loss recorded at
    /// registration time.
    pub async fn mortality_history(&self, filter: &MortalityFilter) -> AppResult<MortalityHistory> {
        let lots = self.store.lots_with_deaths(filter).await?;

        let mut records = Vec::with_capacity(lots.len());
        let mut total_deaths = 0i32;
        let mut total_animals = 0i32;
        let mut estimated_total_loss = Decimal::ZERO;

        for entry in lots {
            let lot = entry.lot;
            let initial = Decimal::from(lot.initial_quantity);
            let deaths = Decimal::from(lot.death_count);
            let cost_per_head = if lot.initial_quantity > 0 {
                lot.total_cost() / initial
            } else {
                Decimal::ZERO
            };
            let mortality_rate = if lot.initial_quantity > 0 {
                deaths / initial * Decimal::from(100)
            } else {
                Decimal::ZERO
            };
            let estimated_loss = cost_per_head * deaths;

            total_deaths += lot.death_count;
            total_animals += lot.initial_quantity;
            estimated_total_loss += estimated_loss;

            records.push(LotMortalitySummary {
                lot_code: lot.lot_code,
                death_count: lot.death_count,
                initial_quantity: lot.initial_quantity,
                mortality_rate,
                estimated_loss,
                pens: entry.pen_numbers,
            });
        }

        let mortality_rate = if total_animals > 0 {
            Decimal::from(total_deaths) / Decimal::from(total_animals) * Decimal::from(100)
        } else {
            Decimal::ZERO
        };

        Ok(MortalityHistory {
            records,
            summary: MortalitySummary {
                total_deaths,
                total_animals,
                mortality_rate,
                estimated_total_loss,
            },
        })
    }
}

/// The weighted-average loss computation (steps 1-4 of a registration).
/// Pure with respect to the occupant snapshot it is given.
fn compute_allocation(
    pen_id: Uuid,
    quantity: i32,
    occupants: &[PenOccupant],
) -> AppResult<MortalityCalculation> {
    if quantity <= 0 {
        return Err(AppError::validation(
            "quantity",
            "Death count must be positive",
        ));
    }
    if occupants.is_empty() {
        return Err(AppError::NoOccupants { pen_id });
    }

    let total_heads: i64 = occupants.iter().map(|o| o.quantity as i64).sum();
    if total_heads == 0 {
        return Err(AppError::ZeroOccupancy { pen_id });
    }
    if quantity as i64 > total_heads {
        return Err(AppError::validation(
            "quantity",
            format!(
                "Cannot register {} deaths in a pen holding {} head",
                quantity, total_heads
            ),
        ));
    }

    let total_value: Decimal = occupants
        .iter()
        .map(|o| Decimal::from(o.quantity) * o.book_cost_per_head)
        .sum();
    let average_cost_per_head = total_value / Decimal::from(total_heads);
    let total_loss = (average_cost_per_head * Decimal::from(quantity))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    let weights: Vec<i64> = occupants.iter().map(|o| o.quantity as i64).collect();
    let heads = largest_remainder(quantity as i64, &weights);
    let loss_cents = (total_loss * Decimal::from(100))
        .to_i64()
        .ok_or_else(|| AppError::validation("quantity", "Loss value out of range"))?;
    let values = largest_remainder(loss_cents, &weights);

    let lots_affected = occupants
        .iter()
        .zip(heads.iter().zip(&values))
        .map(|(occupant, (head_share, value_cents))| LotLossShare {
            lot_id: occupant.lot_id,
            lot_code: occupant.lot_code.clone(),
            percentage: Decimal::from(occupant.quantity) / Decimal::from(total_heads)
                * Decimal::from(100),
            value: Decimal::new(*value_cents, 2),
            heads_removed: *head_share as i32,
        })
        .collect();

    Ok(MortalityCalculation {
        pen_id,
        quantity,
        total_heads: total_heads as i32,
        total_value,
        average_cost_per_head,
        total_loss,
        lots_affected,
    })
}
