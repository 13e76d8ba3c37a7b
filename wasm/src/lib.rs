//! WebAssembly module for the Inventory ERP
//!
//! Provides client-side computation for:
//! - FIFO draw previews before a document is posted
//! - Production cost and unit cost estimates
//! - Offline validation of document inputs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::ledger::*;
pub use shared::models::*;
pub use shared::numbering::*;
pub use shared::validation::*;

/// Batch as the client holds it, a subset of the server record
#[derive(Debug, Deserialize)]
struct ClientBatch {
    id: i64,
    batch_number: String,
    #[serde(default)]
    item_id: i64,
    #[serde(default)]
    location_id: i64,
    quantity_available: Decimal,
    unit_cost: Decimal,
    received_at: DateTime<Utc>,
    #[serde(default)]
    expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    status: Option<BatchStatus>,
}

impl From<ClientBatch> for Batch {
    fn from(c: ClientBatch) -> Self {
        let mut batch = Batch::new(
            c.id,
            c.batch_number,
            c.item_id,
            c.location_id,
            c.quantity_available,
            c.unit_cost,
            c.received_at,
        );
        batch.expiry_date = c.expiry_date;
        if let Some(status) = c.status {
            batch.status = status;
        }
        batch
    }
}

#[derive(Debug, Serialize)]
struct FifoPreview {
    allocations: Vec<Allocation>,
    #[serde(flatten)]
    cost: FifoCost,
}

fn parse_as_of(as_of: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(as_of)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("Invalid as_of timestamp: {}", e))
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, String> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("Invalid {}: {}", field, e))
}

fn fifo_preview(
    batches_json: &str,
    quantity: &str,
    as_of: &str,
    exclude_expired: bool,
) -> Result<String, String> {
    let batches: Vec<ClientBatch> =
        serde_json::from_str(batches_json).map_err(|e| format!("Invalid batches JSON: {}", e))?;
    let batches: Vec<Batch> = batches.into_iter().map(Batch::from).collect();
    let quantity = parse_decimal(quantity, "quantity")?;
    let options = FifoOptions {
        now: parse_as_of(as_of)?,
        exclude_expired,
    };

    let allocations = select_fifo(&batches, quantity, options).map_err(|e| e.to_string())?;
    let cost = fifo_cost(&allocations).map_err(|e| e.to_string())?;
    serde_json::to_string(&FifoPreview { allocations, cost }).map_err(|e| e.to_string())
}

fn completion_preview(
    cost_json: &str,
    absorbed_before: &str,
    quantity_ordered: &str,
    good_quantity: &str,
    closes_order: bool,
) -> Result<String, String> {
    let cost: ProductionCost =
        serde_json::from_str(cost_json).map_err(|e| format!("Invalid cost JSON: {}", e))?;
    let total = cost.total().map_err(|e| e.to_string())?;
    let result = completion_cost(
        total,
        parse_decimal(absorbed_before, "absorbed cost")?,
        parse_decimal(quantity_ordered, "ordered quantity")?,
        parse_decimal(good_quantity, "good quantity")?,
        closes_order,
    )
    .map_err(|e| e.to_string())?;
    serde_json::to_string(&result).map_err(|e| e.to_string())
}

/// Preview which batches a draw of `quantity` would consume, oldest first
///
/// Returns JSON with the allocations and their total and average cost.
#[wasm_bindgen]
pub fn preview_fifo(
    batches_json: &str,
    quantity: &str,
    as_of: &str,
    exclude_expired: bool,
) -> Result<String, JsValue> {
    fifo_preview(batches_json, quantity, as_of, exclude_expired).map_err(|e| JsValue::from_str(&e))
}

/// Value the good output of a production completion step
#[wasm_bindgen]
pub fn preview_completion_cost(
    cost_json: &str,
    absorbed_before: &str,
    quantity_ordered: &str,
    good_quantity: &str,
    closes_order: bool,
) -> Result<String, JsValue> {
    completion_preview(cost_json, absorbed_before, quantity_ordered, good_quantity, closes_order)
        .map_err(|e| JsValue::from_str(&e))
}

/// Unit cost rounded to the stored scale, "0" when there is no output or
/// the amount is out of range
#[wasm_bindgen]
pub fn calculate_unit_cost(total_cost: &str, quantity: &str) -> String {
    match (total_cost.parse::<Decimal>(), quantity.parse::<Decimal>()) {
        (Ok(total), Ok(qty)) => unit_cost(total, qty).unwrap_or(Decimal::ZERO).to_string(),
        _ => Decimal::ZERO.to_string(),
    }
}

/// Check a receipt line before it is queued for sync
#[wasm_bindgen]
pub fn validate_receipt_quantities(quantity: f64, scrap_quantity: f64) -> bool {
    match (Decimal::try_from(quantity), Decimal::try_from(scrap_quantity)) {
        (Ok(qty), Ok(scrap)) => validate_receipt_line(qty, scrap).is_ok(),
        _ => false,
    }
}

/// Check a SKU against the master data rules
#[wasm_bindgen]
pub fn is_valid_sku(sku: &str) -> bool {
    validate_sku(sku).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCHES: &str = r#"[
        {"id": 2, "batch_number": "BATCH-000002", "quantity_available": "50",
         "unit_cost": "12", "received_at": "2024-03-02T09:00:00Z"},
        {"id": 1, "batch_number": "BATCH-000001", "quantity_available": "100",
         "unit_cost": "10", "received_at": "2024-03-01T09:00:00Z"},
        {"id": 3, "batch_number": "BATCH-000003", "quantity_available": "500",
         "unit_cost": "1", "received_at": "2024-02-01T09:00:00Z",
         "expiry_date": "2024-03-01T00:00:00Z"}
    ]"#;

    #[test]
    fn test_fifo_preview_skips_expired() {
        let json = fifo_preview(BATCHES, "120", "2024-04-01T00:00:00Z", true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let allocations = value["allocations"].as_array().unwrap();
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0]["batch_number"], "BATCH-000001");
        assert_eq!(value["total_cost"], "1240");
    }

    #[test]
    fn test_fifo_preview_shortage() {
        let err = fifo_preview(BATCHES, "1000", "2024-04-01T00:00:00Z", true).unwrap_err();
        assert!(err.contains("insufficient stock"));
    }

    #[test]
    fn test_fifo_preview_bad_timestamp() {
        assert!(fifo_preview(BATCHES, "10", "yesterday", true).is_err());
    }

    #[test]
    fn test_completion_preview() {
        let cost = r#"{"material_cost": "1240", "labor_cost": "60", "overhead_cost": "100"}"#;
        let json = completion_preview(cost, "0", "40", "35", true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["unit_cost"], "40");
        assert_eq!(value["batch_value"], "1400");
    }

    #[test]
    fn test_completion_preview_out_of_range() {
        let cost = r#"{"material_cost": "79228162514264337593543950335", "labor_cost": "1", "overhead_cost": "0"}"#;
        let err = completion_preview(cost, "0", "40", "35", true).unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn test_unit_cost() {
        assert_eq!(calculate_unit_cost("10", "3"), "3.333333");
        assert_eq!(calculate_unit_cost("10", "0"), "0");
        assert_eq!(calculate_unit_cost("ten", "3"), "0");
    }

    #[test]
    fn test_input_checks() {
        assert!(validate_receipt_quantities(10.0, 2.0));
        assert!(!validate_receipt_quantities(10.0, 12.0));
        assert!(is_valid_sku("WIDGET-100"));
        assert!(!is_valid_sku("widget"));
    }
}
