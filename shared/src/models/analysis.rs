//! Integrated financial analysis models
//!
//! The integrated analysis reconciles the accrual view of a month against
//! its realized cash flow. The gap between net income and net cash flow must
//! be explained entirely by non-cash items: depreciation, mortality losses
//! and the biological-asset fair-value adjustment.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CashFlowType, TransactionCategory};

/// Accrual vs. cash reconciliation for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegratedAnalysis {
    pub id: Uuid,
    /// First day of the analysed month
    pub reference_month: NaiveDate,
    pub reference_year: i32,
    pub cycle_id: Option<Uuid>,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
    pub cash_receipts: Decimal,
    pub cash_payments: Decimal,
    pub net_cash_flow: Decimal,
    /// Signed non-cash subtotal: depreciation + mortality - biological change
    pub non_cash_items: Decimal,
    pub depreciation: Decimal,
    pub mortality_loss: Decimal,
    pub biological_asset_change: Decimal,
    /// net_income - net_cash_flow; equals -non_cash_items by construction
    pub reconciliation_difference: Decimal,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
}

/// Analysis lifecycle; progresses monotonically, closed is terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Draft,
    Reviewing,
    Approved,
    Closed,
}

/// Per-category audit line persisted alongside an analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisLineItem {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub category: TransactionCategory,
    pub description: String,
    pub amount: Decimal,
    pub impacts_cash: bool,
    pub cash_flow_type: Option<CashFlowType>,
}

/// Receipts, payments and net for one cash-flow classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowBucket {
    pub receipts: Decimal,
    pub payments: Decimal,
    pub net: Decimal,
}

/// Direct-method cash flow breakdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowBreakdown {
    pub operating: CashFlowBucket,
    pub investing: CashFlowBucket,
    pub financing: CashFlowBucket,
}

/// Non-cash explainers of the reconciliation difference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonCashBreakdown {
    pub depreciation: Decimal,
    pub mortality: Decimal,
    pub biological_adjustments: Decimal,
    /// Residual non-cash entries outside the three canonical explainers
    pub other: Decimal,
}

/// Accrual-to-cash bridge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub net_income: Decimal,
    pub non_cash_adjustments: Decimal,
    pub net_cash_flow: Decimal,
    pub difference: Decimal,
}

/// Full analysis payload returned by the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis: IntegratedAnalysis,
    pub items: Vec<AnalysisLineItem>,
    pub cash_flow_breakdown: CashFlowBreakdown,
    pub non_cash_breakdown: NonCashBreakdown,
    pub reconciliation: Reconciliation,
}

/// One row of a period comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisComparisonRow {
    pub period: String,
    pub analysis: IntegratedAnalysis,
}

/// Comparison of stored analyses across a month range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisComparison {
    pub periods: Vec<AnalysisComparisonRow>,
    pub summary: ComparisonSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub total_net_income: Decimal,
    pub total_cash_flow: Decimal,
    pub average_monthly_revenue: Decimal,
    pub average_monthly_expenses: Decimal,
    pub average_monthly_net_income: Decimal,
    pub average_monthly_cash_flow: Decimal,
}

/// Consolidated yearly dashboard over stored analyses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDashboard {
    pub summary: DashboardSummary,
    pub trends: Vec<MonthlyTrend>,
    pub breakdown: CategoryBreakdown,
    pub quality_metrics: QualityMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub total_net_income: Decimal,
    pub total_cash_flow: Decimal,
    pub total_non_cash_items: Decimal,
    pub net_margin: Decimal,
    pub cash_flow_margin: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyTrend {
    pub month: u32,
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub net_income: Decimal,
    pub cash_flow: Decimal,
    pub reconciliation_difference: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub cash_revenue: Decimal,
    pub cash_expenses: Decimal,
    pub depreciation: Decimal,
    pub biological_changes: Decimal,
    pub mortality: Decimal,
}

/// Data-quality signals over the year's reconciliations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Net cash flow over net income
    pub cash_conversion_rate: Decimal,
    /// Non-cash subtotal over revenue
    pub non_cash_portion: Decimal,
    /// 1 - sum of absolute reconciliation differences over net income
    pub reconciliation_accuracy: Decimal,
}
