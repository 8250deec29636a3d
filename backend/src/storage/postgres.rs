//! PostgreSQL implementation of the storage ports
//!
//! Mutation-bearing operations run inside serializable transactions with
//! row locks on the occupancy rows they re-read; statement upserts lean on
//! `INSERT ... ON CONFLICT` so the additive increment is a single atomic
//! statement; regeneration of an analysis period is serialized through a
//! per-period advisory lock.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use shared::{
    AccrualStatement, AnalysisLineItem, AnalysisStatus, CashFlowType, IntegratedAnalysis,
    LedgerTransaction, MortalityRecord, NewLedgerTransaction, PenOccupant, PurchaseLot,
    StatementDelta, StatementStatus, TransactionCategory,
};

use crate::error::{AppError, AppResult};
use crate::storage::{
    AnalysisStore, LedgerStore, LotWithPens, MortalityCommit, MortalityFilter, MortalityStore,
    OccupancyStore, StatementStore,
};

/// PostgreSQL-backed feedlot store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema migrations under `backend/migrations`
    pub async fn run_migrations(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Enum <-> text mappings (schema stores statuses and categories as text)
// ----------------------------------------------------------------------

fn link_is_active(status: &str) -> bool {
    status == "active"
}

fn parse_statement_status(s: &str) -> AppResult<StatementStatus> {
    match s {
        "draft" => Ok(StatementStatus::Draft),
        "reviewing" => Ok(StatementStatus::Reviewing),
        "approved" => Ok(StatementStatus::Approved),
        "closed" => Ok(StatementStatus::Closed),
        other => Err(AppError::Internal(anyhow!(
            "unknown statement status: {other}"
        ))),
    }
}

fn analysis_status_str(status: AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Draft => "draft",
        AnalysisStatus::Reviewing => "reviewing",
        AnalysisStatus::Approved => "approved",
        AnalysisStatus::Closed => "closed",
    }
}

fn parse_analysis_status(s: &str) -> AppResult<AnalysisStatus> {
    match s {
        "draft" => Ok(AnalysisStatus::Draft),
        "reviewing" => Ok(AnalysisStatus::Reviewing),
        "approved" => Ok(AnalysisStatus::Approved),
        "closed" => Ok(AnalysisStatus::Closed),
        other => Err(AppError::Internal(anyhow!(
            "unknown analysis status: {other}"
        ))),
    }
}

fn parse_lot_status(s: &str) -> AppResult<shared::LotStatus> {
    match s {
        "active" => Ok(shared::LotStatus::Active),
        "archived" => Ok(shared::LotStatus::Archived),
        other => Err(AppError::Internal(anyhow!("unknown lot status: {other}"))),
    }
}

fn parse_category(s: &str) -> AppResult<TransactionCategory> {
    match s {
        "cattle_sales" => Ok(TransactionCategory::CattleSales),
        "cattle_acquisition" => Ok(TransactionCategory::CattleAcquisition),
        "feed_costs" => Ok(TransactionCategory::FeedCosts),
        "veterinary_costs" => Ok(TransactionCategory::VeterinaryCosts),
        "labor_costs" => Ok(TransactionCategory::LaborCosts),
        "administrative" => Ok(TransactionCategory::Administrative),
        "infrastructure" => Ok(TransactionCategory::Infrastructure),
        "operational_costs" => Ok(TransactionCategory::OperationalCosts),
        "depreciation" => Ok(TransactionCategory::Depreciation),
        "mortality" => Ok(TransactionCategory::Mortality),
        "biological_adjustment" => Ok(TransactionCategory::BiologicalAdjustment),
        other => Err(AppError::Internal(anyhow!("unknown category: {other}"))),
    }
}

fn cash_flow_type_str(cf: CashFlowType) -> &'static str {
    match cf {
        CashFlowType::Operating => "operating",
        CashFlowType::Investing => "investing",
        CashFlowType::Financing => "financing",
    }
}

fn parse_cash_flow_type(s: &str) -> AppResult<CashFlowType> {
    match s {
        "operating" => Ok(CashFlowType::Operating),
        "investing" => Ok(CashFlowType::Investing),
        "financing" => Ok(CashFlowType::Financing),
        other => Err(AppError::Internal(anyhow!(
            "unknown cash flow type: {other}"
        ))),
    }
}

// ----------------------------------------------------------------------
// Row mappings
// ----------------------------------------------------------------------

fn map_lot(row: &PgRow) -> AppResult<PurchaseLot> {
    Ok(PurchaseLot {
        id: row.try_get("id")?,
        lot_code: row.try_get("lot_code")?,
        initial_quantity: row.try_get("initial_quantity")?,
        current_quantity: row.try_get("current_quantity")?,
        death_count: row.try_get("death_count")?,
        purchase_value: row.try_get("purchase_value")?,
        freight_cost: row.try_get("freight_cost")?,
        commission: row.try_get("commission")?,
        health_cost: row.try_get("health_cost")?,
        feed_cost: row.try_get("feed_cost")?,
        operational_cost: row.try_get("operational_cost")?,
        status: parse_lot_status(row.try_get::<String, _>("status")?.as_str())?,
        cycle_id: row.try_get("cycle_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_mortality_record(row: &PgRow) -> AppResult<MortalityRecord> {
    Ok(MortalityRecord {
        id: row.try_get("id")?,
        lot_id: row.try_get("lot_id")?,
        pen_id: row.try_get("pen_id")?,
        quantity: row.try_get("quantity")?,
        death_date: row.try_get("death_date")?,
        cause: row.try_get("cause")?,
        estimated_loss: row.try_get("estimated_loss")?,
        notes: row.try_get("notes")?,
        cycle_id: row.try_get("cycle_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_statement(row: &PgRow) -> AppResult<AccrualStatement> {
    Ok(AccrualStatement {
        id: row.try_get("id")?,
        reference_month: row.try_get("reference_month")?,
        cycle_id: row.try_get("cycle_id")?,
        gross_revenue: row.try_get("gross_revenue")?,
        deductions: row.try_get("deductions")?,
        net_revenue: row.try_get("net_revenue")?,
        animal_cost: row.try_get("animal_cost")?,
        feed_cost: row.try_get("feed_cost")?,
        health_cost: row.try_get("health_cost")?,
        labor_cost: row.try_get("labor_cost")?,
        other_costs: row.try_get("other_costs")?,
        total_costs: row.try_get("total_costs")?,
        gross_profit: row.try_get("gross_profit")?,
        operational_profit: row.try_get("operational_profit")?,
        net_profit: row.try_get("net_profit")?,
        net_margin: row.try_get("net_margin")?,
        status: parse_statement_status(row.try_get::<String, _>("status")?.as_str())?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_analysis(row: &PgRow) -> AppResult<IntegratedAnalysis> {
    Ok(IntegratedAnalysis {
        id: row.try_get("id")?,
        reference_month: row.try_get("reference_month")?,
        reference_year: row.try_get("reference_year")?,
        cycle_id: row.try_get("cycle_id")?,
        total_revenue: row.try_get("total_revenue")?,
        total_expenses: row.try_get("total_expenses")?,
        net_income: row.try_get("net_income")?,
        cash_receipts: row.try_get("cash_receipts")?,
        cash_payments: row.try_get("cash_payments")?,
        net_cash_flow: row.try_get("net_cash_flow")?,
        non_cash_items: row.try_get("non_cash_items")?,
        depreciation: row.try_get("depreciation")?,
        mortality_loss: row.try_get("mortality_loss")?,
        biological_asset_change: row.try_get("biological_asset_change")?,
        reconciliation_difference: row.try_get("reconciliation_difference")?,
        status: parse_analysis_status(row.try_get::<String, _>("status")?.as_str())?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_line_item(row: &PgRow) -> AppResult<AnalysisLineItem> {
    let cash_flow_type = row
        .try_get::<Option<String>, _>("cash_flow_type")?
        .map(|s| parse_cash_flow_type(&s))
        .transpose()?;
    Ok(AnalysisLineItem {
        id: row.try_get("id")?,
        analysis_id: row.try_get("analysis_id")?,
        category: parse_category(row.try_get::<String, _>("category")?.as_str())?,
        description: row.try_get("description")?,
        amount: row.try_get("amount")?,
        impacts_cash: row.try_get("impacts_cash")?,
        cash_flow_type,
    })
}

fn map_transaction(row: &PgRow) -> AppResult<LedgerTransaction> {
    let cash_flow_type = row
        .try_get::<Option<String>, _>("cash_flow_type")?
        .map(|s| parse_cash_flow_type(&s))
        .transpose()?;
    Ok(LedgerTransaction {
        id: row.try_get("id")?,
        reference_date: row.try_get("reference_date")?,
        description: row.try_get("description")?,
        amount: row.try_get("amount")?,
        category: parse_category(row.try_get::<String, _>("category")?.as_str())?,
        impacts_cash: row.try_get("impacts_cash")?,
        cash_flow_date: row.try_get("cash_flow_date")?,
        cash_flow_type,
        cycle_id: row.try_get("cycle_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// One advisory-lock key per analysis month
fn period_lock_key(month: NaiveDate) -> i64 {
    month.year() as i64 * 100 + month.month() as i64
}

const STATEMENT_UPSERT: &str = r#"
    INSERT INTO accrual_statements (
        id, reference_month, cycle_id,
        gross_revenue, deductions, net_revenue,
        animal_cost, feed_cost, health_cost, labor_cost, other_costs, total_costs,
        gross_profit, operational_profit, net_profit, net_margin, status
    )
    VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
        CASE WHEN $6 = 0 THEN 0 ELSE $15 / $6 * 100 END, 'draft'
    )
    ON CONFLICT (reference_month, COALESCE(cycle_id, '00000000-0000-0000-0000-000000000000'::uuid))
    DO UPDATE SET
        gross_revenue = accrual_statements.gross_revenue + EXCLUDED.gross_revenue,
        deductions = accrual_statements.deductions + EXCLUDED.deductions,
        net_revenue = accrual_statements.net_revenue + EXCLUDED.net_revenue,
        animal_cost = accrual_statements.animal_cost + EXCLUDED.animal_cost,
        feed_cost = accrual_statements.feed_cost + EXCLUDED.feed_cost,
        health_cost = accrual_statements.health_cost + EXCLUDED.health_cost,
        labor_cost = accrual_statements.labor_cost + EXCLUDED.labor_cost,
        other_costs = accrual_statements.other_costs + EXCLUDED.other_costs,
        total_costs = accrual_statements.total_costs + EXCLUDED.total_costs,
        gross_profit = accrual_statements.gross_profit + EXCLUDED.gross_profit,
        operational_profit = accrual_statements.operational_profit + EXCLUDED.operational_profit,
        net_profit = accrual_statements.net_profit + EXCLUDED.net_profit,
        net_margin = CASE
            WHEN accrual_statements.net_revenue + EXCLUDED.net_revenue = 0 THEN 0
            ELSE (accrual_statements.net_profit + EXCLUDED.net_profit)
                 / (accrual_statements.net_revenue + EXCLUDED.net_revenue) * 100
        END
    RETURNING *
"#;

fn bind_statement_upsert<'q>(
    month: NaiveDate,
    cycle_id: Option<Uuid>,
    delta: &StatementDelta,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(STATEMENT_UPSERT)
        .bind(Uuid::new_v4())
        .bind(month)
        .bind(cycle_id)
        .bind(delta.gross_revenue)
        .bind(delta.deductions)
        .bind(delta.net_revenue)
        .bind(delta.animal_cost)
        .bind(delta.feed_cost)
        .bind(delta.health_cost)
        .bind(delta.labor_cost)
        .bind(delta.other_costs)
        .bind(delta.total_costs)
        .bind(delta.gross_profit)
        .bind(delta.operational_profit)
        .bind(delta.net_profit)
}

#[async_trait]
impl OccupancyStore for PgStore {
    async fn active_occupants(&self, pen_id: Uuid) -> AppResult<Vec<PenOccupant>> {
        let rows = sqlx::query(
            r#"
            SELECT ol.id AS link_id, l.id AS lot_id, l.lot_code, ol.quantity,
                   CASE WHEN l.current_quantity > 0
                        THEN (l.purchase_value + l.freight_cost + l.commission
                              + l.health_cost + l.feed_cost + l.operational_cost)
                             / l.current_quantity
                        ELSE 0
                   END AS book_cost_per_head
            FROM occupancy_links ol
            JOIN purchase_lots l ON l.id = ol.lot_id
            WHERE ol.pen_id = $1 AND ol.status = 'active'
            ORDER BY ol.allocated_at, ol.id
            "#,
        )
        .bind(pen_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PenOccupant {
                    link_id: row.try_get("link_id")?,
                    lot_id: row.try_get("lot_id")?,
                    lot_code: row.try_get("lot_code")?,
                    quantity: row.try_get("quantity")?,
                    book_cost_per_head: row.try_get::<Decimal, _>("book_cost_per_head")?,
                })
            })
            .collect()
    }

    async fn commit_mortality(&self, commit: MortalityCommit) -> AppResult<MortalityRecord> {
        let first_lot = commit
            .removals
            .first()
            .map(|r| r.lot_id)
            .ok_or_else(|| AppError::validation("removals", "No lots to allocate the loss to"))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // Re-read the occupancy rows under lock and verify the snapshot the
        // allocation was computed from still holds
        for removal in &commit.removals {
            let row = sqlx::query(
                r#"
                SELECT ol.quantity, ol.status, l.current_quantity
                FROM occupancy_links ol
                JOIN purchase_lots l ON l.id = ol.lot_id
                WHERE ol.id = $1
                FOR UPDATE OF ol, l
                "#,
            )
            .bind(removal.link_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Occupancy link".to_string()))?;

            let quantity: i32 = row.try_get("quantity")?;
            let status: String = row.try_get("status")?;
            let current_quantity: i32 = row.try_get("current_quantity")?;

            if !link_is_active(&status) || quantity != removal.expected_link_quantity {
                return Err(AppError::Conflict(format!(
                    "Occupancy of link {} changed during the computation",
                    removal.link_id
                )));
            }
            if quantity < removal.heads || current_quantity < removal.heads {
                return Err(AppError::Conflict(format!(
                    "Lot {} no longer holds {} head",
                    removal.lot_id, removal.heads
                )));
            }
        }

        for removal in &commit.removals {
            sqlx::query(
                r#"
                UPDATE occupancy_links
                SET quantity = quantity - $2,
                    status = CASE WHEN quantity - $2 = 0 THEN 'closed' ELSE status END
                WHERE id = $1
                "#,
            )
            .bind(removal.link_id)
            .bind(removal.heads)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                UPDATE purchase_lots
                SET current_quantity = current_quantity - $2,
                    death_count = death_count + $2,
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(removal.lot_id)
            .bind(removal.heads)
            .execute(&mut *tx)
            .await?;
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
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO mortality_records
                (id, lot_id, pen_id, quantity, death_date, cause, estimated_loss,
                 notes, cycle_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.lot_id)
        .bind(record.pen_id)
        .bind(record.quantity)
        .bind(record.death_date)
        .bind(&record.cause)
        .bind(record.estimated_loss)
        .bind(&record.notes)
        .bind(record.cycle_id)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        if commit.integrate_statement {
            let month = NaiveDate::from_ymd_opt(
                commit.death_date.year(),
                commit.death_date.month(),
                1,
            )
            .unwrap_or(commit.death_date);
            let delta = StatementDelta::mortality(commit.total_loss);
            bind_statement_upsert(month, commit.cycle_id, &delta)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(record)
    }
}

#[async_trait]
impl MortalityStore for PgStore {
    async fn mortality_records(
        &self,
        filter: &MortalityFilter,
    ) -> AppResult<Vec<MortalityRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, lot_id, pen_id, quantity, death_date, cause, estimated_loss,
                   notes, cycle_id, created_at
            FROM mortality_records
            WHERE ($1::date IS NULL OR death_date >= $1)
              AND ($2::date IS NULL OR death_date <= $2)
              AND ($3::uuid IS NULL OR pen_id = $3)
              AND ($4::uuid IS NULL OR cycle_id = $4)
            ORDER BY death_date, created_at
            "#,
        )
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.pen_id)
        .bind(filter.cycle_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_mortality_record).collect()
    }

    async fn lots_with_deaths(&self, filter: &MortalityFilter) -> AppResult<Vec<LotWithPens>> {
        let rows = sqlx::query(
            r#"
            SELECT l.*,
                   COALESCE(
                       array_agg(DISTINCT p.pen_number)
                           FILTER (WHERE p.pen_number IS NOT NULL),
                       '{}'
                   ) AS pen_numbers
            FROM purchase_lots l
            LEFT JOIN occupancy_links ol ON ol.lot_id = l.id
            LEFT JOIN pens p ON p.id = ol.pen_id
            WHERE l.death_count > 0
              AND ($1::uuid IS NULL OR l.cycle_id = $1)
              AND ($2::date IS NULL OR l.updated_at::date >= $2)
              AND ($3::date IS NULL OR l.updated_at::date <= $3)
            GROUP BY l.id
            ORDER BY l.lot_code
            "#,
        )
        .bind(filter.cycle_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(LotWithPens {
                    lot: map_lot(row)?,
                    pen_numbers: row.try_get::<Vec<String>, _>("pen_numbers")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl StatementStore for PgStore {
    async fn statement_for_month(
        &self,
        month: NaiveDate,
        cycle_id: Option<Uuid>,
    ) -> AppResult<Option<AccrualStatement>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM accrual_statements
            WHERE reference_month = $1 AND cycle_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(month)
        .bind(cycle_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_statement).transpose()
    }

    async fn apply_statement_delta(
        &self,
        month: NaiveDate,
        cycle_id: Option<Uuid>,
        delta: StatementDelta,
    ) -> AppResult<AccrualStatement> {
        let row = bind_statement_upsert(month, cycle_id, &delta)
            .fetch_one(&self.pool)
            .await?;
        map_statement(&row)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn append_transaction(
        &self,
        transaction: NewLedgerTransaction,
    ) -> AppResult<LedgerTransaction> {
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
        sqlx::query(
            r#"
            INSERT INTO ledger_transactions
                (id, reference_date, description, amount, category, impacts_cash,
                 cash_flow_date, cash_flow_type, cycle_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(row.id)
        .bind(row.reference_date)
        .bind(&row.description)
        .bind(row.amount)
        .bind(row.category.as_str())
        .bind(row.impacts_cash)
        .bind(row.cash_flow_date)
        .bind(row.cash_flow_type.map(cash_flow_type_str))
        .bind(row.cycle_id)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(row)
    }

    async fn transactions_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cycle_id: Option<Uuid>,
    ) -> AppResult<Vec<LedgerTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, reference_date, description, amount, category, impacts_cash,
                   cash_flow_date, cash_flow_type, cycle_id, created_at
            FROM ledger_transactions
            WHERE reference_date >= $1 AND reference_date <= $2
              AND ($3::uuid IS NULL OR cycle_id = $3)
            ORDER BY reference_date, created_at
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_transaction).collect()
    }
}

#[async_trait]
impl AnalysisStore for PgStore {
    async fn replace_analysis(
        &self,
        analysis: IntegratedAnalysis,
        items: Vec<AnalysisLineItem>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent regenerations of the same period
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(period_lock_key(analysis.reference_month))
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM integrated_analyses WHERE reference_month = $1")
            .bind(analysis.reference_month)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO integrated_analyses
                (id, reference_month, reference_year, cycle_id,
                 total_revenue, total_expenses, net_income,
                 cash_receipts, cash_payments, net_cash_flow,
                 non_cash_items, depreciation, mortality_loss,
                 biological_asset_change, reconciliation_difference,
                 status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17)
            "#,
        )
        .bind(analysis.id)
        .bind(analysis.reference_month)
        .bind(analysis.reference_year)
        .bind(analysis.cycle_id)
        .bind(analysis.total_revenue)
        .bind(analysis.total_expenses)
        .bind(analysis.net_income)
        .bind(analysis.cash_receipts)
        .bind(analysis.cash_payments)
        .bind(analysis.net_cash_flow)
        .bind(analysis.non_cash_items)
        .bind(analysis.depreciation)
        .bind(analysis.mortality_loss)
        .bind(analysis.biological_asset_change)
        .bind(analysis.reconciliation_difference)
        .bind(analysis_status_str(analysis.status))
        .bind(analysis.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO analysis_line_items
                    (id, analysis_id, category, description, amount, impacts_cash,
                     cash_flow_type)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(item.analysis_id)
            .bind(item.category.as_str())
            .bind(&item.description)
            .bind(item.amount)
            .bind(item.impacts_cash)
            .bind(item.cash_flow_type.map(cash_flow_type_str))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn analysis_by_month(
        &self,
        month: NaiveDate,
    ) -> AppResult<Option<(IntegratedAnalysis, Vec<AnalysisLineItem>)>> {
        let row = sqlx::query("SELECT * FROM integrated_analyses WHERE reference_month = $1")
            .bind(month)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let analysis = map_analysis(&row)?;
        let items = self.line_items(analysis.id).await?;
        Ok(Some((analysis, items)))
    }

    async fn analyses_by_year(
        &self,
        year: i32,
    ) -> AppResult<Vec<(IntegratedAnalysis, Vec<AnalysisLineItem>)>> {
        let rows = sqlx::query(
            "SELECT * FROM integrated_analyses WHERE reference_year = $1 ORDER BY reference_month",
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let analysis = map_analysis(row)?;
            let items = self.line_items(analysis.id).await?;
            out.push((analysis, items));
        }
        Ok(out)
    }

    async fn set_analysis_status(
        &self,
        month: NaiveDate,
        status: AnalysisStatus,
    ) -> AppResult<IntegratedAnalysis> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT * FROM integrated_analyses WHERE reference_month = $1 FOR UPDATE",
        )
        .bind(month)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Integrated analysis".to_string()))?;
        let mut analysis = map_analysis(&row)?;

        if status < analysis.status {
            return Err(AppError::Conflict(format!(
                "Analysis status cannot regress from {:?} to {:?}",
                analysis.status, status
            )));
        }

        sqlx::query("UPDATE integrated_analyses SET status = $2 WHERE reference_month = $1")
            .bind(month)
            .bind(analysis_status_str(status))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        analysis.status = status;
        Ok(analysis)
    }
}

impl PgStore {
    async fn line_items(&self, analysis_id: Uuid) -> AppResult<Vec<AnalysisLineItem>> {
        let rows = sqlx::query(
            "SELECT * FROM analysis_line_items WHERE analysis_id = $1 ORDER BY category, description",
        )
        .bind(analysis_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_line_item).collect()
    }
}
