//! Production cost roll-up
//!
//! Finished goods inherit the cost of the component batches consumed to make
//! them, plus any labor and overhead booked on the production order.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::fifo::Allocation;
use crate::error::{LedgerError, LedgerResult};

/// Decimal places kept on stored unit costs
pub const COST_SCALE: u32 = 6;

pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `a × b`, or `Overflow(what)` past the decimal range
pub fn checked_product(a: Decimal, b: Decimal, what: &'static str) -> LedgerResult<Decimal> {
    a.checked_mul(b).ok_or(LedgerError::Overflow(what))
}

/// Sum of `values`, or `Overflow(what)` past the decimal range
pub fn checked_total(
    values: impl IntoIterator<Item = Decimal>,
    what: &'static str,
) -> LedgerResult<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v).ok_or(LedgerError::Overflow(what))
    })
}

/// Cost components of a production order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionCost {
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub overhead_cost: Decimal,
}

impl ProductionCost {
    pub fn total(&self) -> LedgerResult<Decimal> {
        checked_total(
            [self.material_cost, self.labor_cost, self.overhead_cost],
            "production cost",
        )
    }
}

/// Sum of quantity × unit cost over consumed batches
pub fn material_cost<'a>(
    allocations: impl IntoIterator<Item = &'a Allocation>,
) -> LedgerResult<Decimal> {
    let lines = allocations
        .into_iter()
        .map(Allocation::cost)
        .collect::<LedgerResult<Vec<_>>>()?;
    checked_total(lines, "material cost")
}

/// Total cost spread over `quantity` units, zero for no output
pub fn unit_cost(total_cost: Decimal, quantity: Decimal) -> LedgerResult<Decimal> {
    if quantity <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    total_cost
        .checked_div(quantity)
        .map(round_cost)
        .ok_or(LedgerError::Overflow("unit cost"))
}

/// Quantity of a component needed for an order
pub fn component_requirement(
    quantity_per_unit: Decimal,
    quantity_ordered: Decimal,
) -> LedgerResult<Decimal> {
    checked_product(quantity_per_unit, quantity_ordered, "component requirement")
}

/// Standard cost of one finished unit from (quantity per unit, item cost) pairs
pub fn bom_standard_cost(components: &[(Decimal, Decimal)]) -> LedgerResult<Decimal> {
    let lines = components
        .iter()
        .map(|(qty, cost)| checked_product(*qty, *cost, "standard cost"))
        .collect::<LedgerResult<Vec<_>>>()?;
    checked_total(lines, "standard cost")
}

/// Valuation of the good output of one completion step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCost {
    pub unit_cost: Decimal,
    /// Value carried into the finished-goods batch
    pub batch_value: Decimal,
    /// Order cost absorbed after this step
    pub absorbed_after: Decimal,
}

/// Value the good quantity of a completion step.
///
/// A step that closes the order takes whatever cost the earlier steps left
/// behind, so a single completion gets `total_cost / good_quantity`. Earlier
/// steps are valued at the planned cost per ordered unit.
pub fn completion_cost(
    total_cost: Decimal,
    absorbed_before: Decimal,
    quantity_ordered: Decimal,
    good_quantity: Decimal,
    closes_order: bool,
) -> LedgerResult<CompletionCost> {
    if good_quantity <= Decimal::ZERO {
        return Ok(CompletionCost {
            unit_cost: Decimal::ZERO,
            batch_value: Decimal::ZERO,
            absorbed_after: if closes_order { total_cost } else { absorbed_before },
        });
    }

    if closes_order {
        let value = total_cost
            .checked_sub(absorbed_before)
            .ok_or(LedgerError::Overflow("completion cost"))?
            .max(Decimal::ZERO);
        return Ok(CompletionCost {
            unit_cost: unit_cost(value, good_quantity)?,
            batch_value: value,
            absorbed_after: total_cost,
        });
    }

    let planned = unit_cost(total_cost, quantity_ordered)?;
    let value = checked_product(planned, good_quantity, "completion cost")?;
    Ok(CompletionCost {
        unit_cost: planned,
        batch_value: value,
        absorbed_after: checked_total([absorbed_before, value], "completion cost")?,
    })
}
