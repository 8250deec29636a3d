//! In-memory implementation of the storage ports
//!
//! A single mutex over the whole state gives every port operation the same
//! all-or-nothing semantics as a database transaction: validations run
//! first, mutations only after every check has passed. Used by the test
//! suite and as a reference for the port contracts.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared::{
    validate_head_count, validate_lot_allocation, validate_pen_capacity, AccrualStatement,
    AnalysisLineItem, AnalysisStatus, IntegratedAnalysis, LedgerTransaction, LinkStatus,
    MortalityRecord, NewLedgerTransaction, OccupancyLink, Pen, PenOccupant, PurchaseLot,
    StatementDelta,
};

use crate::error::{AppError, AppResult};
use crate::storage::{
    AnalysisStore, LedgerStore, LotWithPens, MortalityCommit, MortalityFilter, MortalityStore,
    OccupancyStore, StatementStore,
};

#[derive(Default)]
struct Inner {
    pens: HashMap<Uuid, Pen>,
    lots: HashMap<Uuid, PurchaseLot>,
    /// Insertion order preserved; occupant listings and allocation
    /// tie-breaking follow it
    links: Vec<OccupancyLink>,
    mortality: Vec<MortalityRecord>,
    statements: Vec<AccrualStatement>,
    transactions: Vec<LedgerTransaction>,
    analyses: BTreeMap<NaiveDate, (IntegratedAnalysis, Vec<AnalysisLineItem>)>,
}

/// In-memory feedlot store
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding helpers (occupancy CRUD proper is outside the engine; these
    // uphold the pen-capacity and lot head-count invariants)
    // ------------------------------------------------------------------

    pub async fn insert_pen(&self, pen: Pen) {
        self.inner.lock().await.pens.insert(pen.id, pen);
    }

    pub async fn insert_lot(&self, lot: PurchaseLot) {
        self.inner.lock().await.lots.insert(lot.id, lot);
    }

    /// Allocate head of a lot into a pen, creating an active occupancy link
    pub async fn allocate_to_pen(
        &self,
        lot_id: Uuid,
        pen_id: Uuid,
        quantity: i32,
    ) -> AppResult<OccupancyLink> {
        let mut inner = self.inner.lock().await;

        validate_head_count(quantity).map_err(|m| AppError::validation("quantity", m))?;
        let pen = inner
            .pens
            .get(&pen_id)
            .ok_or_else(|| AppError::NotFound("Pen".to_string()))?;
        let lot = inner
            .lots
            .get(&lot_id)
            .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;

        let pen_occupied: i32 = inner
            .links
            .iter()
            .filter(|l| l.pen_id == pen_id && l.status == LinkStatus::Active)
            .map(|l| l.quantity)
            .sum();
        validate_pen_capacity(pen.capacity, pen_occupied, quantity)
            .map_err(|m| AppError::validation("quantity", m))?;

        let lot_allocated: i32 = inner
            .links
            .iter()
            .filter(|l| l.lot_id == lot_id && l.status == LinkStatus::Active)
            .map(|l| l.quantity)
            .sum();
        validate_lot_allocation(lot.current_quantity, lot_allocated, quantity)
            .map_err(|m| AppError::validation("quantity", m))?;

        let link = OccupancyLink {
            id: Uuid::new_v4(),
            lot_id,
            pen_id,
            quantity,
            status: LinkStatus::Active,
            allocated_at: Utc::now(),
        };
        inner.links.push(link.clone());
        Ok(link)
    }

    /// Snapshot of a lot, for assertions on head-count mutations
    pub async fn lot(&self, lot_id: Uuid) -> Option<PurchaseLot> {
        self.inner.lock().await.lots.get(&lot_id).cloned()
    }

    /// Snapshot of an occupancy link
    pub async fn link(&self, link_id: Uuid) -> Option<OccupancyLink> {
        self.inner
            .lock()
            .await
            .links
            .iter()
            .find(|l| l.id == link_id)
            .cloned()
    }
}

fn month_key(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn apply_delta(
    statements: &mut Vec<AccrualStatement>,
    month: NaiveDate,
    cycle_id: Option<Uuid>,
    delta: &StatementDelta,
) -> AccrualStatement {
    let idx = match statements
        .iter()
        .position(|s| s.reference_month == month && s.cycle_id == cycle_id)
    {
        Some(idx) => idx,
        None => {
            statements.push(AccrualStatement::empty(month, cycle_id));
            statements.len() - 1
        }
    };
    delta.apply_to(&mut statements[idx]);
    statements[idx].clone()
}

#[async_trait]
impl OccupancyStore for MemoryStore {
    async fn active_occupants(&self, pen_id: Uuid) -> AppResult<Vec<PenOccupant>> {
        let inner = self.inner.lock().await;
        let occupants = inner
            .links
            .iter()
            .filter(|l| l.pen_id == pen_id && l.status == LinkStatus::Active)
            .filter_map(|l| {
                inner.lots.get(&l.lot_id).map(|lot| PenOccupant {
                    link_id: l.id,
                    lot_id: lot.id,
                    lot_code: lot.lot_code.clone(),
                    quantity: l.quantity,
                    book_cost_per_head: lot.book_cost_per_head(),
                })
            })
            .collect();
        Ok(occupants)
    }

    async fn commit_mortality(&self, commit: MortalityCommit) -> AppResult<MortalityRecord> {
        let mut inner = self.inner.lock().await;

        let first_lot = commit
            .removals
            .first()
            .map(|r| r.lot_id)
            .ok_or_else(|| AppError::validation("removals", "No lots to allocate the loss to"))?;

        // Validate the whole commit before touching anything
        for removal in &commit.removals {
            let link = inner
                .links
                .iter()
                .find(|l| l.id == removal.link_id && l.status == LinkStatus::Active)
                .ok_or_else(|| {
                    AppError::Conflict(format!(
                        "Occupancy link {} is no longer active",
                        removal.link_id
                    ))
                })?;
            if link.quantity != removal.expected_link_quantity {
                return Err(AppError::Conflict(format!(
                    "Occupancy of link {} changed from {} to {}",
                    removal.link_id, removal.expected_link_quantity, link.quantity
                )));
            }
            let lot = inner
                .lots
                .get(&removal.lot_id)
                .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;
            if link.quantity < removal.heads || lot.current_quantity < removal.heads {
                return Err(AppError::Conflict(format!(
                    "Lot {} no longer holds {} head",
                    lot.lot_code, removal.heads
                )));
            }
        }

        let now = Utc::now();
        for removal in &commit.removals {
            if let Some(link) = inner.links.iter_mut().find(|l| l.id == removal.link_id) {
                link.quantity -= removal.heads;
                if link.quantity == 0 {
                    link.status = LinkStatus::Closed;
                }
            }
            if let Some(lot) = inner.lots.get_mut(&removal.lot_id) {
                lot.current_quantity -= removal.heads;
                lot.death_count += removal.heads;
                lot.updated_at = now;
            }
        }

        let record = MortalityRecord {
            id: Uuid::new_v4(),
            lot_id: first_lot,
            pen_id: commit.pen_id,
            quantity: commit.quantity,
            death_date: commit.death_date,
            cause: commit.cause.clone(),
            estimated_loss: commit.total_loss,
            notes: commit.notes.clone(),
            cycle_id: commit.cycle_id,
            created_at: now,
        };
        inner.mortality.push(record.clone());

        if commit.integrate_statement {
            let month = month_key(commit.death_date);
            let delta = StatementDelta::mortality(commit.total_loss);
            apply_delta(&mut inner.statements, month, commit.cycle_id, &delta);
        }

        Ok(record)
    }
}

#[async_trait]
impl MortalityStore for MemoryStore {
    async fn mortality_records(
        &self,
        filter: &MortalityFilter,
    ) -> AppResult<Vec<MortalityRecord>> {
        let inner = self.inner.lock().await;
        let mut records: Vec<MortalityRecord> = inner
            .mortality
            .iter()
            .filter(|r| filter.start_date.map_or(true, |d| r.death_date >= d))
            .filter(|r| filter.end_date.map_or(true, |d| r.death_date <= d))
            .filter(|r| filter.pen_id.map_or(true, |p| r.pen_id == p))
            .filter(|r| filter.cycle_id.map_or(true, |c| r.cycle_id == Some(c)))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.death_date);
        Ok(records)
    }

    async fn lots_with_deaths(&self, filter: &MortalityFilter) -> AppResult<Vec<LotWithPens>> {
        let inner = self.inner.lock().await;
        let mut rows = Vec::new();
        let mut lots: Vec<&PurchaseLot> = inner
            .lots
            .values()
            .filter(|lot| lot.death_count > 0)
            .filter(|lot| filter.cycle_id.map_or(true, |c| lot.cycle_id == Some(c)))
            .filter(|lot| match (filter.start_date, filter.end_date) {
                (Some(start), Some(end)) => {
                    let updated = lot.updated_at.date_naive();
                    updated >= start && updated <= end
                }
                _ => true,
            })
            .collect();
        lots.sort_by(|a, b| a.lot_code.cmp(&b.lot_code));

        for lot in lots {
            let pen_numbers = inner
                .links
                .iter()
                .filter(|l| l.lot_id == lot.id)
                .filter_map(|l| inner.pens.get(&l.pen_id).map(|p| p.pen_number.clone()))
                .collect();
            rows.push(LotWithPens {
                lot: lot.clone(),
                pen_numbers,
            });
        }
        Ok(rows)
    }
}

#[async_trait]
impl StatementStore for MemoryStore {
    async fn statement_for_month(
        &self,
        month: NaiveDate,
        cycle_id: Option<Uuid>,
    ) -> AppResult<Option<AccrualStatement>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .statements
            .iter()
            .find(|s| s.reference_month == month && s.cycle_id == cycle_id)
            .cloned())
    }

    async fn apply_statement_delta(
        &self,
        month: NaiveDate,
        cycle_id: Option<Uuid>,
        delta: StatementDelta,
    ) -> AppResult<AccrualStatement> {
        let mut inner = self.inner.lock().await;
        Ok(apply_delta(&mut inner.statements, month, cycle_id, &delta))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn append_transaction(
        &self,
        transaction: NewLedgerTransaction,
    ) -> AppResult<LedgerTransaction> {
        let mut inner = self.inner.lock().await;
        let row = LedgerTransaction {
            id: Uuid::new_v4(),
            reference_date: transaction.reference_date,
            description: transaction.description,
            amount: transaction.amount,
            category: transaction.category,
            impacts_cash: transaction.impacts_cash,
            cash_flow_date: transaction.cash_flow_date,
            cash_flow_type: transaction.cash_flow_type,
            cycle_id: transaction.cycle_id,
            created_at: Utc::now(),
        };
        inner.transactions.push(row.clone());
        Ok(row)
    }

    async fn transactions_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cycle_id: Option<Uuid>,
    ) -> AppResult<Vec<LedgerTransaction>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<LedgerTransaction> = inner
            .transactions
            .iter()
            .filter(|t| t.reference_date >= start && t.reference_date <= end)
            .filter(|t| cycle_id.map_or(true, |c| t.cycle_id == Some(c)))
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.reference_date);
        Ok(rows)
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn replace_analysis(
        &self,
        analysis: IntegratedAnalysis,
        items: Vec<AnalysisLineItem>,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .analyses
            .insert(analysis.reference_month, (analysis, items));
        Ok(())
    }

    async fn analysis_by_month(
        &self,
        month: NaiveDate,
    ) -> AppResult<Option<(IntegratedAnalysis, Vec<AnalysisLineItem>)>> {
        let inner = self.inner.lock().await;
        Ok(inner.analyses.get(&month).cloned())
    }

    async fn analyses_by_year(
        &self,
        year: i32,
    ) -> AppResult<Vec<(IntegratedAnalysis, Vec<AnalysisLineItem>)>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .analyses
            .values()
            .filter(|(a, _)| a.reference_year == year)
            .cloned()
            .collect())
    }

    async fn set_analysis_status(
        &self,
        month: NaiveDate,
        status: AnalysisStatus,
    ) -> AppResult<IntegratedAnalysis> {
        let mut inner = self.inner.lock().await;
        let (analysis, _) = inner
            .analyses
            .get_mut(&month)
            .ok_or_else(|| AppError::NotFound("Integrated analysis".to_string()))?;
        if status < analysis.status {
            return Err(AppError::Conflict(format!(
                "Analysis status cannot regress from {:?} to {:?}",
                analysis.status, status
            )));
        }
        analysis.status = status;
        Ok(analysis.clone())
    }
}
