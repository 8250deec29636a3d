//! Financial ledger transaction models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the financial ledger. Revenue carries a positive amount,
/// expense a negative one; `impacts_cash` separates realized cash movement
/// from accrual-only entries such as depreciation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub reference_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub category: TransactionCategory,
    pub impacts_cash: bool,
    pub cash_flow_date: Option<NaiveDate>,
    pub cash_flow_type: Option<CashFlowType>,
    pub cycle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Ledger transaction awaiting its id and timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLedgerTransaction {
    pub reference_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub category: TransactionCategory,
    pub impacts_cash: bool,
    pub cash_flow_date: Option<NaiveDate>,
    pub cash_flow_type: Option<CashFlowType>,
    pub cycle_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    CattleSales,
    CattleAcquisition,
    FeedCosts,
    VeterinaryCosts,
    LaborCosts,
    Administrative,
    Infrastructure,
    OperationalCosts,
    Depreciation,
    Mortality,
    BiologicalAdjustment,
}

impl TransactionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::CattleSales => "cattle_sales",
            TransactionCategory::CattleAcquisition => "cattle_acquisition",
            TransactionCategory::FeedCosts => "feed_costs",
            TransactionCategory::VeterinaryCosts => "veterinary_costs",
            TransactionCategory::LaborCosts => "labor_costs",
            TransactionCategory::Administrative => "administrative",
            TransactionCategory::Infrastructure => "infrastructure",
            TransactionCategory::OperationalCosts => "operational_costs",
            TransactionCategory::Depreciation => "depreciation",
            TransactionCategory::Mortality => "mortality",
            TransactionCategory::BiologicalAdjustment => "biological_adjustment",
        }
    }
}

/// Direct-method cash flow classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowType {
    Operating,
    Investing,
    Financing,
}
