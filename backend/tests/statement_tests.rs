//! Accrual statement tests
//!
//! Coverage of the additive monthly upsert:
//! - Zero-initialized creation on first touch
//! - Revenue and cost recognition flowing through the profit lines
//! - Cycle scoping
//! - Net margin recomputation, including the zero-revenue guard

use std::str::FromStr;
use std::sync::Arc;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use rust_decimal::Decimal;
use uuid::Uuid;

use feedlot_backend::error::AppError;
use feedlot_backend::services::AccrualStatementService;
use feedlot_backend::storage::MemoryStore;
use shared::{CostBucket, Period, StatementDelta};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn service() -> AccrualStatementService {
    AccrualStatementService::new(Arc::new(MemoryStore::new()))
}

fn march() -> Period {
    Period::new(2025, 3).unwrap()
}

// ============================================================================
// Recognition
// ============================================================================

#[tokio::test]
async fn revenue_and_costs_flow_through_profit_lines() {
    let service = service();

    service
        .record_revenue(march(), None, dec("100000"))
        .await
        .unwrap();
    service
        .record_cost(march(), None, CostBucket::Feed, dec("30000"))
        .await
        .unwrap();
    let statement = service
        .record_cost(march(), None, CostBucket::Health, dec("5000"))
        .await
        .unwrap();

    assert_eq!(statement.gross_revenue, dec("100000"));
    assert_eq!(statement.net_revenue, dec("100000"));
    assert_eq!(statement.feed_cost, dec("30000"));
    assert_eq!(statement.health_cost, dec("5000"));
    assert_eq!(statement.total_costs, dec("35000"));
    assert_eq!(statement.gross_profit, dec("65000"));
    assert_eq!(statement.net_profit, dec("65000"));
    assert_eq!(statement.net_margin, dec("65"));
}

#[tokio::test]
async fn upserts_accumulate_instead_of_replacing() {
    let service = service();

    let first = service
        .record_revenue(march(), None, dec("40000"))
        .await
        .unwrap();
    let second = service
        .record_revenue(march(), None, dec("20000"))
        .await
        .unwrap();

    // Same statement row, incremented
    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.gross_revenue, dec("60000"));
}

#[tokio::test]
async fn mortality_delta_is_a_revenue_deduction() {
    let service = service();

    service
        .record_revenue(march(), None, dec("100000"))
        .await
        .unwrap();
    let statement = service
        .apply(march(), None, StatementDelta::mortality(dec("12000")))
        .await
        .unwrap();

    assert_eq!(statement.gross_revenue, dec("100000"));
    assert_eq!(statement.deductions, dec("12000"));
    assert_eq!(statement.net_revenue, dec("88000"));
    assert_eq!(statement.net_profit, dec("88000"));
    assert_eq!(statement.net_margin, dec("100"));
}

#[tokio::test]
async fn zero_net_revenue_yields_zero_margin() {
    let service = service();

    service
        .record_revenue(march(), None, dec("5000"))
        .await
        .unwrap();
    let statement = service
        .apply(march(), None, StatementDelta::mortality(dec("5000")))
        .await
        .unwrap();

    assert_eq!(statement.net_revenue, Decimal::ZERO);
    assert_eq!(statement.net_margin, Decimal::ZERO);
}

// ============================================================================
// Scoping
// ============================================================================

#[tokio::test]
async fn cycle_scoped_statements_are_independent() {
    let service = service();
    let cycle = Some(Uuid::new_v4());

    service
        .record_revenue(march(), cycle, dec("70000"))
        .await
        .unwrap();
    service
        .record_revenue(march(), None, dec("30000"))
        .await
        .unwrap();

    let scoped = service.statement(march(), cycle).await.unwrap().unwrap();
    let global = service.statement(march(), None).await.unwrap().unwrap();
    assert_eq!(scoped.gross_revenue, dec("70000"));
    assert_eq!(global.gross_revenue, dec("30000"));
    assert_ne!(scoped.id, global.id);
}

#[tokio::test]
async fn untouched_month_has_no_statement() {
    let service = service();
    assert!(service.statement(march(), None).await.unwrap().is_none());
}

// ============================================================================
// Input validation
// ============================================================================

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let service = service();

    for amount in [Decimal::ZERO, dec("-1")] {
        let err = service
            .record_revenue(march(), None, amount)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        let err = service
            .record_cost(march(), None, CostBucket::Other, amount)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
    assert!(service.statement(march(), None).await.unwrap().is_none());
}

// ============================================================================
// Invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After any mix of events, total costs equal the bucket sum and the
    /// profit lines stay consistent with revenue and costs
    #[test]
    fn statement_lines_stay_internally_consistent(
        revenues in proptest::collection::vec(1i64..100_000, 0..5),
        costs in proptest::collection::vec((0usize..5, 1i64..50_000), 0..8),
        losses in proptest::collection::vec(1i64..20_000, 0..4),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let outcome: Result<(), TestCaseError> = rt.block_on(async move {
            let service = service();
            let buckets = [
                CostBucket::Animal,
                CostBucket::Feed,
                CostBucket::Health,
                CostBucket::Labor,
                CostBucket::Other,
            ];

            for amount in &revenues {
                service
                    .record_revenue(march(), None, Decimal::from(*amount))
                    .await
                    .unwrap();
            }
            for (bucket, amount) in &costs {
                service
                    .record_cost(march(), None, buckets[*bucket], Decimal::from(*amount))
                    .await
                    .unwrap();
            }
            for loss in &losses {
                service
                    .apply(march(), None, StatementDelta::mortality(Decimal::from(*loss)))
                    .await
                    .unwrap();
            }

            if revenues.is_empty() && costs.is_empty() && losses.is_empty() {
                prop_assert!(service.statement(march(), None).await.unwrap().is_none());
                return Ok(());
            }

            let s = service.statement(march(), None).await.unwrap().unwrap();
            let bucket_sum =
                s.animal_cost + s.feed_cost + s.health_cost + s.labor_cost + s.other_costs;
            prop_assert_eq!(s.total_costs, bucket_sum);
            prop_assert_eq!(s.net_revenue, s.gross_revenue - s.deductions);
            prop_assert_eq!(s.gross_profit, s.net_revenue - s.total_costs);
            prop_assert_eq!(s.net_profit, s.gross_profit);
            Ok(())
        });
        outcome?;
    }
}
