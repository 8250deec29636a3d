//! Integrated analysis tests
//!
//! Coverage of the accrual/cash reconciler:
//! - Full-month reconciliation with cash, non-cash and mortality inputs
//! - The reconciliation identity (difference explained by non-cash items)
//! - Deterministic regeneration and the closed-analysis guard
//! - Status lifecycle monotonicity
//! - Comparison and dashboard aggregation

use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use rust_decimal::Decimal;
use uuid::Uuid;

use feedlot_backend::error::AppError;
use feedlot_backend::services::{
    AnalysisService, CompareRange, GenerateAnalysisInput, MortalityService,
    RegisterMortalityInput,
};
use feedlot_backend::storage::{LedgerStore, MemoryStore};
use shared::{
    generate_lot_code, AnalysisStatus, CashFlowType, LotStatus, NewLedgerTransaction, Pen,
    PenStatus, PurchaseLot, TransactionCategory,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn generate_input(year: i32, month: u32) -> GenerateAnalysisInput {
    GenerateAnalysisInput {
        year,
        month,
        include_non_cash_items: true,
        cycle_id: None,
    }
}

async fn append(
    store: &MemoryStore,
    reference_date: NaiveDate,
    amount: Decimal,
    category: TransactionCategory,
    impacts_cash: bool,
    cash_flow_type: Option<CashFlowType>,
) {
    store
        .append_transaction(NewLedgerTransaction {
            reference_date,
            description: format!("{} entry", category.as_str()),
            amount,
            category,
            impacts_cash,
            cash_flow_date: impacts_cash.then_some(reference_date),
            cash_flow_type,
            cycle_id: None,
        })
        .await
        .unwrap();
}

/// Seed March 2025: a cattle sale, feed costs, depreciation of 1,500, a
/// biological fair-value gain of 2,500, and one registered death worth 6,000
async fn seed_march(store: &Arc<MemoryStore>) {
    append(
        store,
        date(2025, 3, 5),
        dec("100000"),
        TransactionCategory::CattleSales,
        true,
        Some(CashFlowType::Operating),
    )
    .await;
    append(
        store,
        date(2025, 3, 10),
        dec("-40000"),
        TransactionCategory::FeedCosts,
        true,
        Some(CashFlowType::Operating),
    )
    .await;
    append(
        store,
        date(2025, 3, 20),
        dec("-1500"),
        TransactionCategory::Depreciation,
        false,
        None,
    )
    .await;
    append(
        store,
        date(2025, 3, 25),
        dec("2500"),
        TransactionCategory::BiologicalAdjustment,
        false,
        None,
    )
    .await;

    // One death in a 10-head lot with a 6,000/head book cost
    let pen = Pen {
        id: Uuid::new_v4(),
        pen_number: "A-01".to_string(),
        capacity: 10,
        status: PenStatus::Occupied,
        created_at: Utc::now(),
    };
    let lot = PurchaseLot {
        id: Uuid::new_v4(),
        lot_code: generate_lot_code(2025, 1),
        initial_quantity: 10,
        current_quantity: 10,
        death_count: 0,
        purchase_value: dec("60000"),
        freight_cost: Decimal::ZERO,
        commission: Decimal::ZERO,
        health_cost: Decimal::ZERO,
        feed_cost: Decimal::ZERO,
        operational_cost: Decimal::ZERO,
        status: LotStatus::Active,
        cycle_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let (pen_id, lot_id) = (pen.id, lot.id);
    store.insert_pen(pen).await;
    store.insert_lot(lot).await;
    store.allocate_to_pen(lot_id, pen_id, 10).await.unwrap();

    MortalityService::new(store.clone())
        .register_mortality(RegisterMortalityInput {
            pen_id,
            quantity: 1,
            date: date(2025, 3, 14),
            cause: "pneumonia".to_string(),
            notes: None,
            cycle_id: None,
            integrate_financial: true,
        })
        .await
        .unwrap();
}

/// Seed a month holding only two cash operating entries
async fn seed_cash_month(store: &MemoryStore, month: u32, revenue: Decimal, expense: Decimal) {
    append(
        store,
        date(2025, month, 3),
        revenue,
        TransactionCategory::CattleSales,
        true,
        Some(CashFlowType::Operating),
    )
    .await;
    append(
        store,
        date(2025, month, 9),
        -expense,
        TransactionCategory::OperationalCosts,
        true,
        Some(CashFlowType::Operating),
    )
    .await;
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn reconciles_accrual_against_cash_for_a_month() {
    let store = Arc::new(MemoryStore::new());
    seed_march(&store).await;
    let service = AnalysisService::new(store.clone());

    let result = service.generate_analysis(generate_input(2025, 3)).await.unwrap();
    let a = &result.analysis;

    assert_eq!(a.total_revenue, dec("102500"));
    assert_eq!(a.total_expenses, dec("47500.00"));
    assert_eq!(a.net_income, dec("55000.00"));
    assert_eq!(a.cash_receipts, dec("100000"));
    assert_eq!(a.cash_payments, dec("40000"));
    assert_eq!(a.net_cash_flow, dec("60000"));
    assert_eq!(a.depreciation, dec("1500"));
    assert_eq!(a.mortality_loss, dec("6000.00"));
    assert_eq!(a.biological_asset_change, dec("2500"));
    assert_eq!(a.non_cash_items, dec("5000.00"));
    assert_eq!(a.reconciliation_difference, dec("-5000.00"));

    // The difference is explained entirely by the non-cash items
    assert_eq!(a.reconciliation_difference, -a.non_cash_items);
    assert_eq!(result.reconciliation.net_income, a.net_income);
    assert_eq!(result.reconciliation.difference, a.reconciliation_difference);

    // Direct-method breakdown over the cash entries
    assert_eq!(result.cash_flow_breakdown.operating.receipts, dec("100000"));
    assert_eq!(result.cash_flow_breakdown.operating.payments, dec("40000"));
    assert_eq!(result.cash_flow_breakdown.operating.net, dec("60000"));
    assert_eq!(result.non_cash_breakdown.mortality, dec("6000.00"));
    assert_eq!(result.non_cash_breakdown.other, Decimal::ZERO);

    // One audit line per category plus the mortality line
    assert_eq!(result.items.len(), 5);
    assert!(result.items.iter().all(|i| i.analysis_id == a.id));
}

#[tokio::test]
async fn cash_only_analysis_collapses_to_cash_flow() {
    let store = Arc::new(MemoryStore::new());
    seed_march(&store).await;
    let service = AnalysisService::new(store.clone());

    let mut input = generate_input(2025, 3);
    input.include_non_cash_items = false;
    let result = service.generate_analysis(input).await.unwrap();
    let a = &result.analysis;

    assert_eq!(a.total_revenue, dec("100000"));
    assert_eq!(a.total_expenses, dec("40000"));
    assert_eq!(a.net_income, a.net_cash_flow);
    assert_eq!(a.mortality_loss, Decimal::ZERO);
    assert_eq!(a.non_cash_items, Decimal::ZERO);
    assert_eq!(a.reconciliation_difference, Decimal::ZERO);
}

// ============================================================================
// Regeneration
// ============================================================================

#[tokio::test]
async fn regeneration_is_deterministic() {
    let store = Arc::new(MemoryStore::new());
    seed_march(&store).await;
    let service = AnalysisService::new(store.clone());

    let first = service.generate_analysis(generate_input(2025, 3)).await.unwrap();
    let second = service.generate_analysis(generate_input(2025, 3)).await.unwrap();

    // Identity, timestamps and every line item id survive the regeneration
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn closed_analysis_refuses_regeneration() {
    let store = Arc::new(MemoryStore::new());
    seed_march(&store).await;
    let service = AnalysisService::new(store.clone());

    service.generate_analysis(generate_input(2025, 3)).await.unwrap();
    service
        .set_status(2025, 3, AnalysisStatus::Closed)
        .await
        .unwrap();

    let err = service
        .generate_analysis(generate_input(2025, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn status_progresses_monotonically() {
    let store = Arc::new(MemoryStore::new());
    seed_march(&store).await;
    let service = AnalysisService::new(store.clone());

    service.generate_analysis(generate_input(2025, 3)).await.unwrap();
    service
        .set_status(2025, 3, AnalysisStatus::Approved)
        .await
        .unwrap();

    // Regression is a conflict, re-asserting the current status is not
    let err = service
        .set_status(2025, 3, AnalysisStatus::Draft)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let analysis = service
        .set_status(2025, 3, AnalysisStatus::Approved)
        .await
        .unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Approved);
}

#[tokio::test]
async fn missing_analysis_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let service = AnalysisService::new(store.clone());

    let err = service.get_analysis_by_period(2025, 3).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = service
        .set_status(2025, 3, AnalysisStatus::Reviewing)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn stored_analysis_is_returned_with_breakdowns() {
    let store = Arc::new(MemoryStore::new());
    seed_march(&store).await;
    let service = AnalysisService::new(store.clone());

    let generated = service.generate_analysis(generate_input(2025, 3)).await.unwrap();
    let fetched = service.get_analysis_by_period(2025, 3).await.unwrap();
    assert_eq!(
        serde_json::to_value(&generated).unwrap(),
        serde_json::to_value(&fetched).unwrap()
    );
}

// ============================================================================
// Comparison
// ============================================================================

#[tokio::test]
async fn comparison_walks_the_range_and_averages() {
    let store = Arc::new(MemoryStore::new());
    seed_cash_month(&store, 3, dec("10000"), dec("4000")).await;
    seed_cash_month(&store, 5, dec("20000"), dec("6000")).await;
    let service = AnalysisService::new(store.clone());
    service.generate_analysis(generate_input(2025, 3)).await.unwrap();
    service.generate_analysis(generate_input(2025, 5)).await.unwrap();

    let comparison = service
        .compare_analyses(CompareRange {
            start_year: 2025,
            start_month: 3,
            end_year: 2025,
            end_month: 5,
        })
        .await
        .unwrap();

    // April holds no analysis and is skipped
    assert_eq!(comparison.periods.len(), 2);
    assert_eq!(comparison.periods[0].period, "2025-03");
    assert_eq!(comparison.periods[1].period, "2025-05");
    assert_eq!(comparison.summary.total_revenue, dec("30000"));
    assert_eq!(comparison.summary.total_net_income, dec("20000"));
    assert_eq!(comparison.summary.average_monthly_revenue, dec("15000"));
    assert_eq!(comparison.summary.average_monthly_net_income, dec("10000"));
}

#[tokio::test]
async fn comparison_rejects_inverted_range() {
    let store = Arc::new(MemoryStore::new());
    let service = AnalysisService::new(store);

    let err = service
        .compare_analyses(CompareRange {
            start_year: 2025,
            start_month: 6,
            end_year: 2025,
            end_month: 3,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn empty_comparison_range_averages_to_zero() {
    let store = Arc::new(MemoryStore::new());
    let service = AnalysisService::new(store);

    let comparison = service
        .compare_analyses(CompareRange {
            start_year: 2024,
            start_month: 1,
            end_year: 2024,
            end_month: 3,
        })
        .await
        .unwrap();
    assert!(comparison.periods.is_empty());
    assert_eq!(comparison.summary.average_monthly_revenue, Decimal::ZERO);
}

// ============================================================================
// Dashboard
// ============================================================================

#[tokio::test]
async fn dashboard_aggregates_the_year() {
    let store = Arc::new(MemoryStore::new());
    seed_march(&store).await;
    seed_cash_month(&store, 5, dec("10000"), dec("4000")).await;
    let service = AnalysisService::new(store.clone());
    service.generate_analysis(generate_input(2025, 3)).await.unwrap();
    service.generate_analysis(generate_input(2025, 5)).await.unwrap();

    let dashboard = service.get_dashboard(2025).await.unwrap();

    let s = &dashboard.summary;
    assert_eq!(s.total_revenue, dec("112500"));
    assert_eq!(s.total_expenses, dec("51500.00"));
    assert_eq!(s.total_net_income, dec("61000.00"));
    assert_eq!(s.total_cash_flow, dec("66000"));
    assert_eq!(s.total_non_cash_items, dec("5000.00"));
    assert_eq!(
        s.net_margin,
        dec("61000.00") / dec("112500") * dec("100")
    );

    assert_eq!(dashboard.trends.len(), 2);
    assert_eq!(dashboard.trends[0].month, 3);
    assert_eq!(dashboard.trends[1].month, 5);

    let b = &dashboard.breakdown;
    assert_eq!(b.cash_revenue, dec("110000"));
    assert_eq!(b.cash_expenses, dec("44000"));
    assert_eq!(b.depreciation, dec("1500"));
    assert_eq!(b.biological_changes, dec("2500"));
    assert_eq!(b.mortality, dec("6000.00"));

    let q = &dashboard.quality_metrics;
    assert_eq!(q.cash_conversion_rate, dec("66000") / dec("61000.00"));
    assert_eq!(
        q.reconciliation_accuracy,
        Decimal::ONE - dec("5000.00") / dec("61000.00")
    );
}

#[tokio::test]
async fn dashboard_for_an_empty_year_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let service = AnalysisService::new(store);

    let err = service.get_dashboard(2031).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Reconciliation identity
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For any transaction mix, the gap between net income and net cash flow
    /// equals minus the non-cash subtotal, and the audit lines sum to net
    /// income
    #[test]
    fn difference_is_explained_by_non_cash_items(
        entries in proptest::collection::vec(
            (-50_000i64..50_000, any::<bool>(), 0usize..4),
            1..20,
        ),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let outcome: Result<(), TestCaseError> = rt.block_on(async move {
            let store = Arc::new(MemoryStore::new());
            let categories = [
                TransactionCategory::CattleSales,
                TransactionCategory::OperationalCosts,
                TransactionCategory::Depreciation,
                TransactionCategory::BiologicalAdjustment,
            ];
            for (idx, (amount, impacts_cash, category)) in entries.iter().enumerate() {
                append(
                    &store,
                    date(2025, 7, (idx % 28) as u32 + 1),
                    Decimal::from(*amount),
                    categories[*category],
                    *impacts_cash,
                    impacts_cash.then_some(CashFlowType::Operating),
                )
                .await;
            }

            let service = AnalysisService::new(store.clone());
            let result = service.generate_analysis(generate_input(2025, 7)).await.unwrap();
            let a = &result.analysis;

            prop_assert_eq!(
                a.reconciliation_difference,
                a.net_income - a.net_cash_flow
            );
            prop_assert_eq!(a.reconciliation_difference, -a.non_cash_items);
            let item_sum: Decimal = result.items.iter().map(|i| i.amount).sum();
            prop_assert_eq!(item_sum, a.net_income);
            Ok(())
        });
        outcome?;
    }
}
