//! Production cost roll-up tests
//!
//! Component batches drawn FIFO feed the material cost of an order; finished
//! batches carry that cost plus labor and overhead.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    bom_standard_cost, completion_cost, component_requirement, material_cost, round_cost,
    select_fifo, unit_cost, validate_completion, Batch, FifoOptions, LedgerError, ProductionCost,
    COST_SCALE,
};
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::days(n)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Two lots of sheet steel feed a 40 unit order
    #[test]
    fn test_material_cost_from_fifo_draw() {
        let sheets = vec![
            Batch::new(1, "BATCH-000001", 10, 1, dec("100"), dec("10"), day(1)),
            Batch::new(2, "BATCH-000002", 10, 1, dec("50"), dec("12"), day(2)),
        ];
        let required = component_requirement(dec("3"), dec("40")).unwrap();
        assert_eq!(required, dec("120"));

        let plan = select_fifo(&sheets, required, FifoOptions::at(day(10))).unwrap();
        let cost = ProductionCost {
            material_cost: material_cost(&plan).unwrap(),
            labor_cost: dec("60"),
            overhead_cost: dec("100"),
        };

        assert_eq!(cost.material_cost, dec("1240"));
        assert_eq!(cost.total(), Ok(dec("1400")));

        let finished =
            completion_cost(cost.total().unwrap(), Decimal::ZERO, dec("40"), dec("40"), true).unwrap();
        assert_eq!(finished.unit_cost, dec("35"));
        assert_eq!(finished.batch_value, dec("1400"));
    }

    /// Scrapped units carry no value, good units absorb it
    #[test]
    fn test_scrap_absorbed_by_good_output() {
        let total = dec("1400");
        assert!(validate_completion(dec("35"), dec("5"), dec("40")).is_ok());

        let finished = completion_cost(total, Decimal::ZERO, dec("40"), dec("35"), true).unwrap();

        assert_eq!(finished.unit_cost, dec("40"));
        assert_eq!(finished.batch_value, total);
    }

    /// Two steps: planned cost first, the remainder at close
    #[test]
    fn test_partial_then_closing_completion() {
        let total = dec("900");
        let first = completion_cost(total, Decimal::ZERO, dec("9"), dec("3"), false).unwrap();
        assert_eq!(first.unit_cost, dec("100"));
        assert_eq!(first.absorbed_after, dec("300"));

        let second = completion_cost(total, first.absorbed_after, dec("9"), dec("5"), true).unwrap();
        assert_eq!(second.batch_value, dec("600"));
        assert_eq!(second.unit_cost, dec("120"));
        assert_eq!(second.absorbed_after, total);
    }

    /// Unit costs are stored at six decimals
    #[test]
    fn test_unit_cost_rounding() {
        assert_eq!(COST_SCALE, 6);
        assert_eq!(unit_cost(dec("100"), dec("7")), Ok(dec("14.285714")));
        assert_eq!(round_cost(dec("0.0000005")), dec("0.000001"));
        assert_eq!(round_cost(dec("-0.0000005")), dec("-0.000001"));
    }

    #[test]
    fn test_order_fully_scrapped() {
        let finished =
            completion_cost(dec("500"), Decimal::ZERO, dec("10"), Decimal::ZERO, true).unwrap();

        assert_eq!(finished.unit_cost, Decimal::ZERO);
        assert_eq!(finished.batch_value, Decimal::ZERO);
        assert_eq!(finished.absorbed_after, dec("500"));
    }

    #[test]
    fn test_completion_limits() {
        assert!(validate_completion(dec("10"), Decimal::ZERO, dec("10")).is_ok());
        assert!(validate_completion(dec("10"), dec("1"), dec("10")).is_err());
        assert!(validate_completion(Decimal::ZERO, Decimal::ZERO, dec("10")).is_err());
    }

    /// Standard cost of one widget: 2 brackets at 1.50 and half a tube at 8
    #[test]
    fn test_bom_standard_cost() {
        let components = [(dec("2"), dec("1.50")), (dec("0.5"), dec("8"))];
        assert_eq!(bom_standard_cost(&components), Ok(dec("7")));
        assert_eq!(bom_standard_cost(&[]), Ok(Decimal::ZERO));
    }

    /// Amounts past the decimal range are rejected instead of wrapping or panicking
    #[test]
    fn test_oversized_order_is_rejected() {
        let huge = Decimal::MAX;
        assert_eq!(
            component_requirement(dec("2"), huge),
            Err(LedgerError::Overflow("component requirement"))
        );
        assert!(bom_standard_cost(&[(huge, dec("2"))]).is_err());

        let cost = ProductionCost {
            material_cost: huge,
            labor_cost: dec("1"),
            overhead_cost: Decimal::ZERO,
        };
        assert!(cost.total().is_err());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for order totals (0.01 to 100,000.00)
    fn total_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10_000_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// One closing completion values the batch at the full order cost
        #[test]
        fn prop_single_completion_takes_total(
            total in total_strategy(),
            good in 1i64..=1000
        ) {
            let good = Decimal::from(good);
            let result = completion_cost(total, Decimal::ZERO, good, good, true).unwrap();

            prop_assert_eq!(result.batch_value, total);
            prop_assert_eq!(result.unit_cost, round_cost(total / good));
            prop_assert_eq!(result.absorbed_after, total);
        }

        /// Rounded unit cost times quantity stays within half a unit of the scale per item
        #[test]
        fn prop_unit_cost_close_to_exact(
            total in total_strategy(),
            qty in 1i64..=1000
        ) {
            let qty = Decimal::from(qty);
            let per_unit = unit_cost(total, qty).unwrap();
            let tolerance = Decimal::new(5, COST_SCALE + 1) * qty;

            prop_assert!((per_unit * qty - total).abs() <= tolerance);
        }

        /// However the order is split, the closing step finishes absorbing the total
        #[test]
        fn prop_partial_completions_absorb_total(
            total in total_strategy(),
            steps in prop::collection::vec(1i64..=20, 1..6)
        ) {
            let ordered = Decimal::from(steps.iter().sum::<i64>());
            let mut absorbed = Decimal::ZERO;
            let mut values = Decimal::ZERO;

            for (i, good) in steps.iter().enumerate() {
                let closes = i + 1 == steps.len();
                let step = completion_cost(total, absorbed, ordered, Decimal::from(*good), closes).unwrap();
                prop_assert!(step.batch_value >= Decimal::ZERO);
                absorbed = step.absorbed_after;
                values += step.batch_value;
            }

            prop_assert_eq!(absorbed, total);
            prop_assert!(values >= total);
        }

        /// Labor and overhead add linearly to the order total
        #[test]
        fn prop_total_is_sum_of_parts(
            material in total_strategy(),
            labor in total_strategy(),
            overhead in total_strategy()
        ) {
            let cost = ProductionCost { material_cost: material, labor_cost: labor, overhead_cost: overhead };
            prop_assert_eq!(cost.total(), Ok(material + labor + overhead));
        }
    }
}
