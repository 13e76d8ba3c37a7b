//! FIFO batch ledger tests
//!
//! Selection order, split lots, eligibility and the quantity invariants of
//! consuming batches oldest first.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    apply_allocations, available_quantity, fifo_cost, select_fifo, Batch, BatchStatus, FifoOptions,
    LedgerError, OwnershipType,
};
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::days(n)
}

fn batch(id: i64, qty: &str, cost: &str, received_day: i64) -> Batch {
    Batch::new(id, format!("BATCH-{:06}", id), 1, 1, dec(qty), dec(cost), day(received_day))
}

fn options() -> FifoOptions {
    FifoOptions::at(day(30))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 100 @ 10 on day 1 and 50 @ 12 on day 2; drawing 120 costs 1,240
    #[test]
    fn test_worked_example() {
        let batches = vec![batch(1, "100", "10", 1), batch(2, "50", "12", 2)];

        let plan = select_fifo(&batches, dec("120"), options()).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].batch_id, plan[0].quantity), (1, dec("100")));
        assert_eq!((plan[1].batch_id, plan[1].quantity), (2, dec("20")));
        assert_eq!(fifo_cost(&plan).unwrap().total_cost, dec("1240"));
    }

    /// Input order does not matter, received date does
    #[test]
    fn test_oldest_batch_first_regardless_of_input_order() {
        let batches = vec![batch(7, "10", "5", 5), batch(3, "10", "4", 2), batch(9, "10", "6", 8)];

        let plan = select_fifo(&batches, dec("15"), options()).unwrap();

        let ids: Vec<i64> = plan.iter().map(|a| a.batch_id).collect();
        assert_eq!(ids, vec![3, 7]);
    }

    /// Same received timestamp falls back to batch id
    #[test]
    fn test_tie_broken_by_batch_id() {
        let batches = vec![batch(12, "5", "1", 3), batch(4, "5", "2", 3)];

        let plan = select_fifo(&batches, dec("6"), options()).unwrap();

        assert_eq!(plan[0].batch_id, 4);
        assert_eq!(plan[0].quantity, dec("5"));
        assert_eq!(plan[1].batch_id, 12);
        assert_eq!(plan[1].quantity, dec("1"));
    }

    /// Shortage reports requested and available, nothing is changed
    #[test]
    fn test_insufficient_stock() {
        let batches = vec![batch(1, "30", "2", 1), batch(2, "20", "2", 2)];

        let err = select_fifo(&batches, dec("60"), options()).unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                requested: dec("60"),
                available: dec("50"),
            }
        );
        assert!(batches.iter().all(|b| b.quantity_available == b.quantity_original));
    }

    #[test]
    fn test_non_positive_request_rejected() {
        let batches = vec![batch(1, "30", "2", 1)];

        assert!(matches!(
            select_fifo(&batches, Decimal::ZERO, options()),
            Err(LedgerError::NonPositiveQuantity(_))
        ));
        assert!(select_fifo(&batches, dec("-1"), options()).is_err());
    }

    /// Expired lots are skipped unless the ledger is told otherwise
    #[test]
    fn test_expired_batches_skipped() {
        let mut old = batch(1, "40", "3", 1);
        old.expiry_date = Some(day(10));
        let fresh = batch(2, "40", "4", 2);
        let batches = vec![old, fresh];

        let plan = select_fifo(&batches, dec("10"), options()).unwrap();
        assert_eq!(plan[0].batch_id, 2);

        let lenient = FifoOptions {
            now: day(30),
            exclude_expired: false,
        };
        let plan = select_fifo(&batches, dec("10"), lenient).unwrap();
        assert_eq!(plan[0].batch_id, 1);
    }

    /// Quarantined and depleted lots are never drawn
    #[test]
    fn test_only_active_batches_drawn() {
        let mut held = batch(1, "40", "3", 1);
        held.status = BatchStatus::Quarantine;
        let mut empty = batch(2, "40", "3", 2);
        empty.quantity_available = Decimal::ZERO;
        empty.status = BatchStatus::Depleted;
        let batches = vec![held, empty, batch(3, "5", "3", 3)];

        assert_eq!(available_quantity(&batches, options()), Ok(dec("5")));
        let plan = select_fifo(&batches, dec("5"), options()).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].batch_id, 3);
    }

    /// Consignment stock is still physically consumable
    #[test]
    fn test_consignment_batches_are_consumable() {
        let mut consigned = batch(1, "10", "0", 1);
        consigned.ownership_type = OwnershipType::Consignment;
        let batches = vec![consigned, batch(2, "10", "8", 2)];

        let plan = select_fifo(&batches, dec("12"), options()).unwrap();
        assert_eq!(plan[0].batch_id, 1);
        assert_eq!(fifo_cost(&plan).unwrap().total_cost, dec("16"));
    }

    /// Applying a plan depletes fully drawn lots and splits the last one
    #[test]
    fn test_apply_allocations() {
        let mut batches = vec![batch(1, "100", "10", 1), batch(2, "50", "12", 2)];
        let plan = select_fifo(&batches, dec("120"), options()).unwrap();

        apply_allocations(&mut batches, &plan).unwrap();

        assert_eq!(batches[0].quantity_available, Decimal::ZERO);
        assert_eq!(batches[0].status, BatchStatus::Depleted);
        assert_eq!(batches[1].quantity_available, dec("30"));
        assert_eq!(batches[1].status, BatchStatus::Active);
    }

    #[test]
    fn test_fifo_cost_average() {
        let batches = vec![batch(1, "100", "10", 1), batch(2, "50", "12", 2)];
        let plan = select_fifo(&batches, dec("120"), options()).unwrap();

        let cost = fifo_cost(&plan).unwrap();
        assert_eq!(cost.total_quantity, dec("120"));
        assert_eq!(cost.average_unit_cost.round_dp(4), dec("10.3333"));
        assert_eq!(fifo_cost(&[]).unwrap().average_unit_cost, Decimal::ZERO);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for batch quantities (0.1 to 500.0)
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=5000i64).prop_map(|n| Decimal::new(n, 1))
    }

    /// Strategy for unit costs (0.01 to 100.00)
    fn cost_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn batches_strategy() -> impl Strategy<Value = Vec<Batch>> {
        prop::collection::vec((quantity_strategy(), cost_strategy(), 0i64..20), 1..12).prop_map(
            |rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (qty, cost, received))| {
                        Batch::new(i as i64 + 1, format!("BATCH-{:06}", i + 1), 1, 1, qty, cost, day(received))
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Taken quantities sum to the request, or the call fails with a shortage
        #[test]
        fn prop_allocations_cover_request_exactly(
            batches in batches_strategy(),
            requested in quantity_strategy()
        ) {
            let available: Decimal = batches.iter().map(|b| b.quantity_available).sum();

            match select_fifo(&batches, requested, options()) {
                Ok(plan) => {
                    let taken: Decimal = plan.iter().map(|a| a.quantity).sum();
                    prop_assert_eq!(taken, requested);
                }
                Err(LedgerError::InsufficientStock { available: reported, .. }) => {
                    prop_assert!(available < requested);
                    prop_assert_eq!(reported, available);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }

        /// Batches are consumed in non-decreasing received order
        #[test]
        fn prop_consumed_oldest_first(
            batches in batches_strategy(),
            requested in quantity_strategy()
        ) {
            if let Ok(plan) = select_fifo(&batches, requested, options()) {
                for pair in plan.windows(2) {
                    prop_assert!(
                        (pair[0].received_at, pair[0].batch_id) < (pair[1].received_at, pair[1].batch_id)
                    );
                }
            }
        }

        /// Remaining quantity stays within [0, original]
        #[test]
        fn prop_remaining_within_bounds(
            mut batches in batches_strategy(),
            requested in quantity_strategy()
        ) {
            if let Ok(plan) = select_fifo(&batches, requested, options()) {
                apply_allocations(&mut batches, &plan).unwrap();
            }

            for b in &batches {
                prop_assert!(b.quantity_available >= Decimal::ZERO);
                prop_assert!(b.quantity_available <= b.quantity_original);
                prop_assert_eq!(b.status == BatchStatus::Depleted, b.quantity_available == Decimal::ZERO);
            }
        }

        /// Only the last allocation may leave part of its batch behind
        #[test]
        fn prop_only_last_lot_split(
            batches in batches_strategy(),
            requested in quantity_strategy()
        ) {
            if let Ok(plan) = select_fifo(&batches, requested, options()) {
                for allocation in plan.iter().take(plan.len().saturating_sub(1)) {
                    let source = batches.iter().find(|b| b.id == allocation.batch_id).unwrap();
                    prop_assert_eq!(allocation.quantity, source.quantity_available);
                }
            }
        }

        /// Total cost equals the sum of quantity x batch cost
        #[test]
        fn prop_cost_is_sum_of_lines(
            batches in batches_strategy(),
            requested in quantity_strategy()
        ) {
            if let Ok(plan) = select_fifo(&batches, requested, options()) {
                let expected: Decimal = plan
                    .iter()
                    .map(|a| {
                        let source = batches.iter().find(|b| b.id == a.batch_id).unwrap();
                        a.quantity * source.unit_cost
                    })
                    .sum();
                prop_assert_eq!(fifo_cost(&plan).unwrap().total_cost, expected);
            }
        }
    }
}
