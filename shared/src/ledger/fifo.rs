//! FIFO batch selection
//!
//! Given the batches of one item at one location, pick the oldest received
//! lots first until the requested quantity is covered. A lot that is only
//! partly needed is split: the allocation takes what is required and the
//! rest stays in the batch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::costing::{checked_product, checked_total};
use crate::error::{LedgerError, LedgerResult};
use crate::models::Batch;

/// Eligibility rules for a selection run
#[derive(Debug, Clone, Copy)]
pub struct FifoOptions {
    pub now: DateTime<Utc>,
    /// Skip batches whose expiry date has passed
    pub exclude_expired: bool,
}

impl FifoOptions {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            exclude_expired: true,
        }
    }
}

/// Quantity taken from one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub batch_id: i64,
    pub batch_number: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub received_at: DateTime<Utc>,
}

impl Allocation {
    pub fn cost(&self) -> LedgerResult<Decimal> {
        checked_product(self.quantity, self.unit_cost, "allocation cost")
    }
}

/// Ordering key: received date, then insertion order
pub fn fifo_key(batch: &Batch) -> (DateTime<Utc>, i64) {
    (batch.received_at, batch.id)
}

/// Consumable batches, oldest first
pub fn fifo_candidates(batches: &[Batch], options: FifoOptions) -> Vec<&Batch> {
    let mut candidates: Vec<&Batch> = batches
        .iter()
        .filter(|b| b.is_consumable(options.now, options.exclude_expired))
        .collect();
    candidates.sort_by_key(|b| fifo_key(b));
    candidates
}

/// Total quantity FIFO selection could draw from
pub fn available_quantity(batches: &[Batch], options: FifoOptions) -> LedgerResult<Decimal> {
    checked_total(
        fifo_candidates(batches, options).iter().map(|b| b.quantity_available),
        "available quantity",
    )
}

/// Select batches to cover `requested`, oldest received first.
///
/// The returned quantities sum to `requested` exactly and no allocation
/// exceeds its batch's remaining quantity. Nothing is mutated; callers apply
/// the plan with [`apply_allocations`] or by writing it to storage.
pub fn select_fifo(
    batches: &[Batch],
    requested: Decimal,
    options: FifoOptions,
) -> LedgerResult<Vec<Allocation>> {
    if requested <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveQuantity(requested));
    }

    let candidates = fifo_candidates(batches, options);
    let available = checked_total(
        candidates.iter().map(|b| b.quantity_available),
        "available quantity",
    )?;
    if available < requested {
        return Err(LedgerError::InsufficientStock {
            requested,
            available,
        });
    }

    let mut allocations = Vec::new();
    let mut remaining = requested;

    for batch in candidates {
        if remaining <= Decimal::ZERO {
            break;
        }

        let take = batch.quantity_available.min(remaining);
        allocations.push(Allocation {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            quantity: take,
            unit_cost: batch.unit_cost,
            received_at: batch.received_at,
        });
        remaining -= take;
    }

    Ok(allocations)
}

/// Consume each allocation from its batch in `batches`
pub fn apply_allocations(batches: &mut [Batch], allocations: &[Allocation]) -> LedgerResult<()> {
    for allocation in allocations {
        let batch = batches
            .iter_mut()
            .find(|b| b.id == allocation.batch_id)
            .ok_or_else(|| LedgerError::UnknownVariant {
                kind: "batch",
                value: allocation.batch_number.clone(),
            })?;
        batch.consume(allocation.quantity)?;
    }
    Ok(())
}

/// Cost summary of a FIFO consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoCost {
    pub total_quantity: Decimal,
    pub total_cost: Decimal,
    /// Weighted average, zero when nothing was consumed
    pub average_unit_cost: Decimal,
}

pub fn fifo_cost(allocations: &[Allocation]) -> LedgerResult<FifoCost> {
    let total_quantity = checked_total(allocations.iter().map(|a| a.quantity), "consumed quantity")?;
    let total_cost = super::costing::material_cost(allocations)?;
    let average_unit_cost = if total_quantity > Decimal::ZERO {
        total_cost
            .checked_div(total_quantity)
            .ok_or(LedgerError::Overflow("average unit cost"))?
    } else {
        Decimal::ZERO
    };

    Ok(FifoCost {
        total_quantity,
        total_cost,
        average_unit_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchStatus;
    use chrono::{Duration, TimeZone};

    fn day(n: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, n, 9, 0, 0).unwrap()
    }

    fn batch(id: i64, qty: i64, cost: i64, received: DateTime<Utc>) -> Batch {
        Batch::new(
            id,
            format!("BATCH-{:06}", id),
            1,
            1,
            Decimal::from(qty),
            Decimal::from(cost),
            received,
        )
    }

    #[test]
    fn splits_across_oldest_batches() {
        let batches = vec![batch(2, 50, 12, day(2)), batch(1, 100, 10, day(1))];
        let plan = select_fifo(&batches, Decimal::from(120), FifoOptions::at(day(10))).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].batch_id, 1);
        assert_eq!(plan[0].quantity, Decimal::from(100));
        assert_eq!(plan[1].batch_id, 2);
        assert_eq!(plan[1].quantity, Decimal::from(20));
        assert_eq!(fifo_cost(&plan).unwrap().total_cost, Decimal::from(1240));
    }

    #[test]
    fn equal_received_dates_fall_back_to_insertion_order() {
        let batches = vec![batch(7, 5, 3, day(1)), batch(4, 5, 9, day(1))];
        let plan = select_fifo(&batches, Decimal::from(6), FifoOptions::at(day(2))).unwrap();

        assert_eq!(plan[0].batch_id, 4);
        assert_eq!(plan[1].batch_id, 7);
        assert_eq!(plan[1].quantity, Decimal::from(1));
    }

    #[test]
    fn insufficient_stock_reports_availability() {
        let batches = vec![batch(1, 10, 1, day(1)), batch(2, 5, 1, day(2))];
        let err = select_fifo(&batches, Decimal::from(16), FifoOptions::at(day(3))).unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                requested: Decimal::from(16),
                available: Decimal::from(15),
            }
        );
    }

    #[test]
    fn skips_expired_and_inactive_batches() {
        let mut expired = batch(1, 100, 1, day(1));
        expired.expiry_date = Some(day(5));
        let mut quarantined = batch(2, 100, 1, day(2));
        quarantined.status = BatchStatus::Quarantine;
        let fresh = batch(3, 10, 4, day(3));

        let batches = vec![expired, quarantined, fresh];
        let plan = select_fifo(&batches, Decimal::from(10), FifoOptions::at(day(6))).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].batch_id, 3);

        let keep_expired = FifoOptions {
            now: day(6),
            exclude_expired: false,
        };
        let plan = select_fifo(&batches, Decimal::from(10), keep_expired).unwrap();
        assert_eq!(plan[0].batch_id, 1);
    }

    #[test]
    fn swept_expired_batches_drawn_only_when_allowed() {
        let mut swept = batch(1, 20, 2, day(1));
        swept.expiry_date = Some(day(3));
        swept.status = BatchStatus::Expired;
        let batches = vec![swept, batch(2, 20, 5, day(2))];

        let strict = select_fifo(&batches, Decimal::from(5), FifoOptions::at(day(6))).unwrap();
        assert_eq!(strict[0].batch_id, 2);

        let lenient = FifoOptions {
            now: day(6),
            exclude_expired: false,
        };
        let plan = select_fifo(&batches, Decimal::from(5), lenient).unwrap();
        assert_eq!(plan[0].batch_id, 1);
    }

    #[test]
    fn expiry_in_the_future_is_still_usable() {
        let mut b = batch(1, 10, 1, day(1));
        b.expiry_date = Some(day(1) + Duration::days(365));
        assert_eq!(
            available_quantity(&[b], FifoOptions::at(day(2))),
            Ok(Decimal::from(10))
        );
    }

    #[test]
    fn rejects_non_positive_requests() {
        let batches = vec![batch(1, 10, 1, day(1))];
        assert!(matches!(
            select_fifo(&batches, Decimal::ZERO, FifoOptions::at(day(2))),
            Err(LedgerError::NonPositiveQuantity(_))
        ));
    }

    #[test]
    fn applying_a_plan_depletes_fully_used_batches() {
        let mut batches = vec![batch(1, 100, 10, day(1)), batch(2, 50, 12, day(2))];
        let plan = select_fifo(&batches, Decimal::from(120), FifoOptions::at(day(3))).unwrap();
        apply_allocations(&mut batches, &plan).unwrap();

        assert_eq!(batches[0].status, BatchStatus::Depleted);
        assert_eq!(batches[1].quantity_available, Decimal::from(30));
        assert_eq!(batches[1].status, BatchStatus::Active);
    }

    #[test]
    fn empty_cost_summary_is_zero() {
        let cost = fifo_cost(&[]).unwrap();
        assert_eq!(cost.total_cost, Decimal::ZERO);
        assert_eq!(cost.average_unit_cost, Decimal::ZERO);
    }
}
