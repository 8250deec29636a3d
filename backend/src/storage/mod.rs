//! Storage ports for the engine
//!
//! The services never talk to a database client directly; they are handed an
//! implementation of these traits. [`memory::MemoryStore`] backs the test
//! suite, [`postgres::PgStore`] is the production implementation.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    AccrualStatement, AnalysisLineItem, AnalysisStatus, IntegratedAnalysis, LedgerTransaction,
    MortalityRecord, NewLedgerTransaction, PenOccupant, PurchaseLot, StatementDelta,
};

use crate::error::AppResult;

/// Head-count and value removed from one lot by a mortality commit
#[derive(Debug, Clone)]
pub struct LotRemoval {
    pub link_id: Uuid,
    pub lot_id: Uuid,
    pub heads: i32,
    pub loss_share: Decimal,
    /// Link quantity the allocation was computed from; the commit rejects
    /// the write with a conflict when the live quantity differs
    pub expected_link_quantity: i32,
}

/// The atomic write of a mortality registration: lot/link decrements, the
/// journal record, and (optionally) the accrual statement increment. Either
/// everything is applied or nothing is.
#[derive(Debug, Clone)]
pub struct MortalityCommit {
    pub pen_id: Uuid,
    pub quantity: i32,
    pub death_date: NaiveDate,
    pub cause: String,
    pub notes: Option<String>,
    pub cycle_id: Option<Uuid>,
    pub total_loss: Decimal,
    pub removals: Vec<LotRemoval>,
    /// Fold the loss into the month's accrual statement inside the same
    /// transaction
    pub integrate_statement: bool,
}

/// Filters for mortality range queries
#[derive(Debug, Clone, Default)]
pub struct MortalityFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub pen_id: Option<Uuid>,
    pub cycle_id: Option<Uuid>,
}

/// A lot that has registered deaths, with the pens it occupies
#[derive(Debug, Clone)]
pub struct LotWithPens {
    pub lot: PurchaseLot,
    pub pen_numbers: Vec<String>,
}

/// Read model over pen occupancy plus the mortality commit entry point
#[async_trait]
pub trait OccupancyStore: Send + Sync {
    /// Active occupants of a pen. Empty for an unoccupied pen, never an
    /// error; links whose status is not active are excluded.
    async fn active_occupants(&self, pen_id: Uuid) -> AppResult<Vec<PenOccupant>>;

    /// Apply a mortality registration atomically. Returns the appended
    /// journal record, or a conflict when the occupancy snapshot the
    /// allocation was computed from has changed.
    async fn commit_mortality(&self, commit: MortalityCommit) -> AppResult<MortalityRecord>;
}

/// Append-only mortality journal queries
#[async_trait]
pub trait MortalityStore: Send + Sync {
    /// Loss events matching the filter, ordered by death date
    async fn mortality_records(&self, filter: &MortalityFilter)
        -> AppResult<Vec<MortalityRecord>>;

    /// Lots with at least one registered death, for ex-post rate reporting
    async fn lots_with_deaths(&self, filter: &MortalityFilter) -> AppResult<Vec<LotWithPens>>;
}

/// Monthly accrual statement persistence
#[async_trait]
pub trait StatementStore: Send + Sync {
    async fn statement_for_month(
        &self,
        month: NaiveDate,
        cycle_id: Option<Uuid>,
    ) -> AppResult<Option<AccrualStatement>>;

    /// Additive upsert: create the statement zero-initialized when absent,
    /// then apply the increments in one atomic step.
    async fn apply_statement_delta(
        &self,
        month: NaiveDate,
        cycle_id: Option<Uuid>,
        delta: StatementDelta,
    ) -> AppResult<AccrualStatement>;
}

/// Financial ledger access
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append_transaction(
        &self,
        transaction: NewLedgerTransaction,
    ) -> AppResult<LedgerTransaction>;

    /// Transactions whose reference date falls inside the inclusive range,
    /// optionally scoped to a production cycle
    async fn transactions_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cycle_id: Option<Uuid>,
    ) -> AppResult<Vec<LedgerTransaction>>;
}

/// Integrated analysis persistence
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Full-replace persistence for a period: any prior analysis and line
    /// items for the month are overwritten in one atomic step.
    async fn replace_analysis(
        &self,
        analysis: IntegratedAnalysis,
        items: Vec<AnalysisLineItem>,
    ) -> AppResult<()>;

    async fn analysis_by_month(
        &self,
        month: NaiveDate,
    ) -> AppResult<Option<(IntegratedAnalysis, Vec<AnalysisLineItem>)>>;

    /// Stored analyses of a year, ascending by month
    async fn analyses_by_year(
        &self,
        year: i32,
    ) -> AppResult<Vec<(IntegratedAnalysis, Vec<AnalysisLineItem>)>>;

    async fn set_analysis_status(
        &self,
        month: NaiveDate,
        status: AnalysisStatus,
    ) -> AppResult<IntegratedAnalysis>;
}

/// Everything the engine needs from the storage layer
pub trait FeedlotStore:
    OccupancyStore + MortalityStore + StatementStore + LedgerStore + AnalysisStore
{
}

impl<T> FeedlotStore for T where
    T: OccupancyStore + MortalityStore + StatementStore + LedgerStore + AnalysisStore
{
}
