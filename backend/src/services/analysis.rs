//! Integrated financial analysis: accrual vs. cash reconciliation
//!
//! Generation is a destructive full replace for the period: the stored
//! analysis and its line items are recomputed from the ledger and the
//! mortality journal, never incremented. The reconciliation difference
//! (net income minus net cash flow) is explained entirely by the non-cash
//! items of the period; that equality holds by construction and is the core
//! invariant of the subsystem.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use shared::{
    AnalysisComparison, AnalysisComparisonRow, AnalysisDashboard, AnalysisLineItem, AnalysisResult,
    AnalysisStatus, CashFlowBreakdown, CashFlowBucket, CashFlowType, CategoryBreakdown,
    ComparisonSummary, DashboardSummary, IntegratedAnalysis, LedgerTransaction, MonthlyTrend,
    NonCashBreakdown, Period, QualityMetrics, Reconciliation, TransactionCategory,
};

use crate::error::{AppError, AppResult};
use crate::storage::{
    AnalysisStore, FeedlotStore, LedgerStore, MortalityFilter, MortalityStore,
};

fn default_true() -> bool {
    true
}

/// Input for generating (or regenerating) a period analysis
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateAnalysisInput {
    pub year: i32,
    pub month: u32,
    /// Include depreciation, mortality and biological adjustments
    /// (default true); false produces a cash-only pass-through analysis
    #[serde(default = "default_true")]
    pub include_non_cash_items: bool,
    pub cycle_id: Option<Uuid>,
}

/// Range of periods for a comparison query
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CompareRange {
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
}

/// Cash flow reconciler over the financial ledger and mortality journal
#[derive(Clone)]
pub struct AnalysisService {
    store: Arc<dyn FeedlotStore>,
}

impl AnalysisService {
    pub fn new(store: Arc<dyn FeedlotStore>) -> Self {
        Self { store }
    }

    /// Generate the integrated analysis for a period, replacing any prior
    /// one. Deterministic: unchanged underlying transactions produce an
    /// identical analysis. A closed analysis refuses regeneration.
    pub async fn generate_analysis(
        &self,
        input: GenerateAnalysisInput,
    ) -> AppResult<AnalysisResult> {
        let period = Period::new(input.year, input.month)
            .ok_or_else(|| AppError::validation("month", "Month must be between 1 and 12"))?;
        let month = period.first_day();

        let existing = self.store.analysis_by_month(month).await?;
        let (id, created_at, status) = match &existing {
            Some((analysis, _)) => {
                if analysis.status == AnalysisStatus::Closed {
                    return Err(AppError::Conflict(format!(
                        "Analysis for {} is closed and cannot be regenerated",
                        period
                    )));
                }
                (analysis.id, analysis.created_at, analysis.status)
            }
            None => (Uuid::new_v4(), Utc::now(), AnalysisStatus::Draft),
        };

        let transactions = self
            .store
            .transactions_in_period(month, period.last_day(), input.cycle_id)
            .await?;
        let include_non_cash = input.include_non_cash_items;

        let mortality_loss = if include_non_cash {
            let filter = MortalityFilter {
                start_date: Some(month),
                end_date: Some(period.last_day()),
                pen_id: None,
                cycle_id: input.cycle_id,
            };
            self.store
                .mortality_records(&filter)
                .await?
                .iter()
                .map(|r| r.estimated_loss)
                .sum()
        } else {
            Decimal::ZERO
        };

        let considered: Vec<&LedgerTransaction> = transactions
            .iter()
            .filter(|t| t.impacts_cash || include_non_cash)
            .collect();

        let total_revenue: Decimal = considered
            .iter()
            .filter(|t| t.amount > Decimal::ZERO)
            .map(|t| t.amount)
            .sum();
        let accrual_expenses: Decimal = considered
            .iter()
            .filter(|t| t.amount < Decimal::ZERO)
            .map(|t| -t.amount)
            .sum();
        let total_expenses = accrual_expenses + mortality_loss;
        let net_income = total_revenue - total_expenses;

        let cash_receipts: Decimal = considered
            .iter()
            .filter(|t| t.impacts_cash && t.amount > Decimal::ZERO)
            .map(|t| t.amount)
            .sum();
        let cash_payments: Decimal = considered
            .iter()
            .filter(|t| t.impacts_cash && t.amount < Decimal::ZERO)
            .map(|t| -t.amount)
            .sum();
        let net_cash_flow = cash_receipts - cash_payments;

        let depreciation: Decimal = considered
            .iter()
            .filter(|t| !t.impacts_cash && t.category == TransactionCategory::Depreciation)
            .map(|t| t.amount.abs())
            .sum();
        let biological_asset_change: Decimal = considered
            .iter()
            .filter(|t| !t.impacts_cash && t.category == TransactionCategory::BiologicalAdjustment)
            .map(|t| t.amount)
            .sum();

        // Signed sum of every accrual-only entry; subtracting it from the
        // mortality total makes the reconciliation identity hold for any
        // transaction mix, not just the three canonical explainers
        let signed_non_cash: Decimal = considered
            .iter()
            .filter(|t| !t.impacts_cash)
            .map(|t| t.amount)
            .sum();
        let non_cash_items = mortality_loss - signed_non_cash;
        let reconciliation_difference = net_income - net_cash_flow;

        let analysis = IntegratedAnalysis {
            id,
            reference_month: month,
            reference_year: period.year,
            cycle_id: input.cycle_id,
            total_revenue,
            total_expenses,
            net_income,
            cash_receipts,
            cash_payments,
            net_cash_flow,
            non_cash_items,
            depreciation,
            mortality_loss,
            biological_asset_change,
            reconciliation_difference,
            status,
            created_at,
        };

        let items = build_line_items(&analysis, period, &considered, mortality_loss);
        self.store.replace_analysis(analysis.clone(), items.clone()).await?;

        tracing::info!(
            period = %period,
            net_income = %net_income,
            net_cash_flow = %net_cash_flow,
            reconciliation_difference = %reconciliation_difference,
            "Integrated analysis generated"
        );

        Ok(assemble_result(analysis, items))
    }

    /// The stored analysis for a period; absence is an error for reads
    pub async fn get_analysis_by_period(&self, year: i32, month: u32) -> AppResult<AnalysisResult> {
        let period = Period::new(year, month)
            .ok_or_else(|| AppError::validation("month", "Month must be between 1 and 12"))?;
        let (analysis, items) = self
            .store
            .analysis_by_month(period.first_day())
            .await?
            .ok_or_else(|| AppError::NotFound("Integrated analysis".to_string()))?;
        Ok(assemble_result(analysis, items))
    }

    /// All stored analyses of a year, ascending by month
    pub async fn get_analyses_by_year(&self, year: i32) -> AppResult<Vec<AnalysisResult>> {
        let analyses = self.store.analyses_by_year(year).await?;
        Ok(analyses
            .into_iter()
            .map(|(analysis, items)| assemble_result(analysis, items))
            .collect())
    }

    /// Walk a month range and compare the analyses stored in it
    pub async fn compare_analyses(&self, range: CompareRange) -> AppResult<AnalysisComparison> {
        let start = Period::new(range.start_year, range.start_month)
            .ok_or_else(|| AppError::validation("start_month", "Month must be between 1 and 12"))?;
        let end = Period::new(range.end_year, range.end_month)
            .ok_or_else(|| AppError::validation("end_month", "Month must be between 1 and 12"))?;
        if end < start {
            return Err(AppError::validation(
                "range",
                "End period precedes start period",
            ));
        }

        let mut periods = Vec::new();
        let mut current = start;
        while current <= end {
            if let Some((analysis, _)) =
                self.store.analysis_by_month(current.first_day()).await?
            {
                periods.push(AnalysisComparisonRow {
                    period: current.to_string(),
                    analysis,
                });
            }
            current = current.next();
        }

        let count = Decimal::from(periods.len() as i64);
        let total_revenue: Decimal = periods.iter().map(|p| p.analysis.total_revenue).sum();
        let total_expenses: Decimal = periods.iter().map(|p| p.analysis.total_expenses).sum();
        let total_net_income: Decimal = periods.iter().map(|p| p.analysis.net_income).sum();
        let total_cash_flow: Decimal = periods.iter().map(|p| p.analysis.net_cash_flow).sum();

        let average = |total: Decimal| {
            if count.is_zero() {
                Decimal::ZERO
            } else {
                total / count
            }
        };

        Ok(AnalysisComparison {
            summary: ComparisonSummary {
                total_revenue,
                total_expenses,
                total_net_income,
                total_cash_flow,
                average_monthly_revenue: average(total_revenue),
                average_monthly_expenses: average(total_expenses),
                average_monthly_net_income: average(total_net_income),
                average_monthly_cash_flow: average(total_cash_flow),
            },
            periods,
        })
    }

    /// Consolidated yearly dashboard over stored analyses
    pub async fn get_dashboard(&self, year: i32) -> AppResult<AnalysisDashboard> {
        let analyses = self.store.analyses_by_year(year).await?;
        if analyses.is_empty() {
            return Err(AppError::NotFound(format!("Analyses for year {}", year)));
        }
        let analyses: Vec<IntegratedAnalysis> =
            analyses.into_iter().map(|(analysis, _)| analysis).collect();

        let total_revenue: Decimal = analyses.iter().map(|a| a.total_revenue).sum();
        let total_expenses: Decimal = analyses.iter().map(|a| a.total_expenses).sum();
        let total_net_income: Decimal = analyses.iter().map(|a| a.net_income).sum();
        let total_cash_flow: Decimal = analyses.iter().map(|a| a.net_cash_flow).sum();
        let total_non_cash_items: Decimal = analyses.iter().map(|a| a.non_cash_items).sum();
        let total_abs_difference: Decimal = analyses
            .iter()
            .map(|a| a.reconciliation_difference.abs())
            .sum();

        let ratio = |num: Decimal, den: Decimal| {
            if den.is_zero() {
                Decimal::ZERO
            } else {
                num / den
            }
        };

        let trends = analyses
            .iter()
            .map(|a| MonthlyTrend {
                month: chrono::Datelike::month(&a.reference_month),
                revenue: a.total_revenue,
                expenses: a.total_expenses,
                net_income: a.net_income,
                cash_flow: a.net_cash_flow,
                reconciliation_difference: a.reconciliation_difference,
            })
            .collect();

        Ok(AnalysisDashboard {
            summary: DashboardSummary {
                total_revenue,
                total_expenses,
                total_net_income,
                total_cash_flow,
                total_non_cash_items,
                net_margin: ratio(total_net_income, total_revenue) * Decimal::from(100),
                cash_flow_margin: ratio(total_cash_flow, total_revenue) * Decimal::from(100),
            },
            trends,
            breakdown: CategoryBreakdown {
                cash_revenue: analyses.iter().map(|a| a.cash_receipts).sum(),
                cash_expenses: analyses.iter().map(|a| a.cash_payments).sum(),
                depreciation: analyses.iter().map(|a| a.depreciation).sum(),
                biological_changes: analyses
                    .iter()
                    .map(|a| a.biological_asset_change.abs())
                    .sum(),
                mortality: analyses.iter().map(|a| a.mortality_loss).sum(),
            },
            quality_metrics: QualityMetrics {
                cash_conversion_rate: ratio(total_cash_flow, total_net_income),
                non_cash_portion: ratio(total_non_cash_items, total_revenue),
                reconciliation_accuracy: Decimal::ONE
                    - ratio(total_abs_difference, total_net_income),
            },
        })
    }

    /// Advance the lifecycle status of a stored analysis (monotonic)
    pub async fn set_status(
        &self,
        year: i32,
        month: u32,
        status: AnalysisStatus,
    ) -> AppResult<IntegratedAnalysis> {
        let period = Period::new(year, month)
            .ok_or_else(|| AppError::validation("month", "Month must be between 1 and 12"))?;
        self.store
            .set_analysis_status(period.first_day(), status)
            .await
    }
}

/// One audit line per contributing category, deterministic across
/// regenerations (ids derive from the stable analysis id)
fn build_line_items(
    analysis: &IntegratedAnalysis,
    period: Period,
    considered: &[&LedgerTransaction],
    mortality_loss: Decimal,
) -> Vec<AnalysisLineItem> {
    type GroupKey = (&'static str, bool, Option<CashFlowType>);
    let mut groups: BTreeMap<GroupKey, (TransactionCategory, Decimal)> = BTreeMap::new();

    for transaction in considered {
        let key = (
            transaction.category.as_str(),
            transaction.impacts_cash,
            transaction.cash_flow_type,
        );
        let entry = groups
            .entry(key)
            .or_insert((transaction.category, Decimal::ZERO));
        entry.1 += transaction.amount;
    }

    let mut items: Vec<AnalysisLineItem> = groups
        .into_iter()
        .map(|((name, impacts_cash, cash_flow_type), (category, amount))| AnalysisLineItem {
            id: Uuid::new_v5(
                &analysis.id,
                format!("{}|{}|{:?}", name, impacts_cash, cash_flow_type).as_bytes(),
            ),
            analysis_id: analysis.id,
            category,
            description: format!("{} for {}", name, period),
            amount,
            impacts_cash,
            cash_flow_type,
        })
        .collect();

    if !mortality_loss.is_zero() {
        items.push(AnalysisLineItem {
            id: Uuid::new_v5(&analysis.id, b"mortality|journal"),
            analysis_id: analysis.id,
            category: TransactionCategory::Mortality,
            description: format!("Mortality losses for {}", period),
            amount: -mortality_loss,
            impacts_cash: false,
            cash_flow_type: None,
        });
    }

    items
}

/// Derive the report breakdowns from a stored analysis and its line items
fn assemble_result(analysis: IntegratedAnalysis, items: Vec<AnalysisLineItem>) -> AnalysisResult {
    let mut breakdown = CashFlowBreakdown::default();
    for item in items.iter().filter(|i| i.impacts_cash) {
        let bucket = match item.cash_flow_type {
            Some(CashFlowType::Operating) => &mut breakdown.operating,
            Some(CashFlowType::Investing) => &mut breakdown.investing,
            Some(CashFlowType::Financing) => &mut breakdown.financing,
            None => continue,
        };
        accumulate(bucket, item.amount);
    }

    let non_cash_breakdown = NonCashBreakdown {
        depreciation: analysis.depreciation,
        mortality: analysis.mortality_loss,
        biological_adjustments: analysis.biological_asset_change,
        other: analysis.non_cash_items
            - (analysis.depreciation + analysis.mortality_loss
                - analysis.biological_asset_change),
    };
    let reconciliation = Reconciliation {
        net_income: analysis.net_income,
        non_cash_adjustments: analysis.non_cash_items,
        net_cash_flow: analysis.net_cash_flow,
        difference: analysis.reconciliation_difference,
    };

    AnalysisResult {
        analysis,
        items,
        cash_flow_breakdown: breakdown,
        non_cash_breakdown,
        reconciliation,
    }
}

fn accumulate(bucket: &mut CashFlowBucket, amount: Decimal) {
    if amount > Decimal::ZERO {
        bucket.receipts += amount;
    } else {
        bucket.payments += -amount;
    }
    bucket.net += amount;
}
