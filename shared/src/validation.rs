//! Validation utilities for inventory documents

use rust_decimal::Decimal;

// ============================================================================
// Quantities
// ============================================================================

/// Validate that a stock quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a unit cost or price (zero allowed)
pub fn validate_unit_cost(cost: Decimal) -> Result<(), &'static str> {
    if cost < Decimal::ZERO {
        return Err("Cost cannot be negative");
    }
    Ok(())
}

/// Validate a signed stock adjustment: either direction, never zero
pub fn validate_adjustment_quantity(quantity_change: Decimal) -> Result<(), &'static str> {
    if quantity_change.is_zero() {
        return Err("Adjustment must change the quantity");
    }
    Ok(())
}

/// Validate a receipt line: scrap is part of the delivered quantity
pub fn validate_receipt_line(quantity: Decimal, scrap_quantity: Decimal) -> Result<(), &'static str> {
    validate_positive_quantity(quantity)?;
    if scrap_quantity < Decimal::ZERO {
        return Err("Scrap quantity cannot be negative");
    }
    if scrap_quantity > quantity {
        return Err("Scrap quantity cannot exceed received quantity");
    }
    Ok(())
}

/// Validate a production completion against what is left on the order
pub fn validate_completion(
    good_quantity: Decimal,
    scrapped_quantity: Decimal,
    remaining: Decimal,
) -> Result<(), &'static str> {
    if good_quantity < Decimal::ZERO || scrapped_quantity < Decimal::ZERO {
        return Err("Completion quantities cannot be negative");
    }
    let reported = good_quantity
        .checked_add(scrapped_quantity)
        .ok_or("Completion quantities are out of range")?;
    if reported <= Decimal::ZERO {
        return Err("Completion must report produced or scrapped units");
    }
    if reported > remaining {
        return Err("Completion exceeds the remaining ordered quantity");
    }
    Ok(())
}

/// Validate a BOM scrap factor in percent
pub fn validate_scrap_factor(factor: Decimal) -> Result<(), &'static str> {
    if factor < Decimal::ZERO || factor > Decimal::from(100) {
        return Err("Scrap factor must be between 0 and 100%");
    }
    Ok(())
}

// ============================================================================
// Master data
// ============================================================================

/// Validate SKU format (uppercase alphanumeric, dashes allowed, 2-50 chars)
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.len() < 2 {
        return Err("SKU must be at least 2 characters");
    }
    if sku.len() > 50 {
        return Err("SKU must be at most 50 characters");
    }
    if sku.starts_with('-') || sku.ends_with('-') {
        return Err("SKU cannot start or end with a dash");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("SKU must be uppercase alphanumeric");
    }
    Ok(())
}

/// Validate location code format (2-20 uppercase alphanumeric, dashes allowed)
pub fn validate_location_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 2 || code.len() > 20 {
        return Err("Location code must be 2-20 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Location code must be uppercase alphanumeric");
    }
    Ok(())
}

/// Validate that a movement has distinct ends
pub fn validate_distinct_locations(from: i64, to: i64) -> Result<(), &'static str> {
    if from == to {
        return Err("Source and destination locations must differ");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity(d("0.001")).is_ok());
        assert!(validate_positive_quantity(Decimal::ZERO).is_err());
        assert!(validate_positive_quantity(d("-5")).is_err());
    }

    #[test]
    fn test_adjustment_quantity() {
        assert!(validate_adjustment_quantity(d("4")).is_ok());
        assert!(validate_adjustment_quantity(d("-2.5")).is_ok());
        assert!(validate_adjustment_quantity(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_unit_cost() {
        assert!(validate_unit_cost(Decimal::ZERO).is_ok());
        assert!(validate_unit_cost(d("-0.01")).is_err());
    }

    #[test]
    fn test_receipt_line() {
        assert!(validate_receipt_line(d("10"), d("0")).is_ok());
        assert!(validate_receipt_line(d("10"), d("10")).is_ok());
        assert!(validate_receipt_line(d("10"), d("11")).is_err());
        assert!(validate_receipt_line(d("10"), d("-1")).is_err());
        assert!(validate_receipt_line(d("0"), d("0")).is_err());
    }

    #[test]
    fn test_completion() {
        assert!(validate_completion(d("38"), d("2"), d("40")).is_ok());
        assert!(validate_completion(d("0"), d("5"), d("40")).is_ok());
        assert!(validate_completion(d("39"), d("2"), d("40")).is_err());
        assert!(validate_completion(d("0"), d("0"), d("40")).is_err());
        assert!(validate_completion(d("-1"), d("2"), d("40")).is_err());
        assert!(validate_completion(Decimal::MAX, Decimal::MAX, d("40")).is_err());
    }

    #[test]
    fn test_scrap_factor() {
        assert!(validate_scrap_factor(d("2.5")).is_ok());
        assert!(validate_scrap_factor(d("101")).is_err());
    }

    #[test]
    fn test_sku() {
        assert!(validate_sku("BOLT-M8").is_ok());
        assert!(validate_sku("A1").is_ok());
        assert!(validate_sku("a1").is_err());
        assert!(validate_sku("X").is_err());
        assert!(validate_sku("-AB").is_err());
        assert!(validate_sku("AB C").is_err());
    }

    #[test]
    fn test_location_code() {
        assert!(validate_location_code("WH-01").is_ok());
        assert!(validate_location_code("W").is_err());
        assert!(validate_location_code("wh-01").is_err());
    }

    #[test]
    fn test_distinct_locations() {
        assert!(validate_distinct_locations(1, 2).is_ok());
        assert!(validate_distinct_locations(3, 3).is_err());
    }
}
