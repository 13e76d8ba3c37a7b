//! Document workflow tests
//!
//! Numbering, status machines and the validation rules applied before a
//! document touches the ledger.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    split_batch_number, validate_distinct_locations, validate_location_code, validate_receipt_line,
    validate_sku, BomStatus, DocumentKind, ExternalProcessStatus, LedgerError, ProductionStatus,
    PurchaseOrderStatus, ShipmentStatus, StatusFlow,
};
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Numbering
    // ------------------------------------------------------------------------

    #[test]
    fn test_document_prefixes() {
        assert_eq!(DocumentKind::Batch.next_after(None), "BATCH-000001");
        assert_eq!(DocumentKind::Receipt.next_after(None), "RCV-000001");
        assert_eq!(DocumentKind::Shipment.next_after(None), "SHP-000001");
        assert_eq!(DocumentKind::Scrap.next_after(None), "SCRAP-000001");
        assert_eq!(DocumentKind::ExternalProcess.next_after(None), "EXT-000001");
        assert_eq!(DocumentKind::PurchaseOrder.next_after(None), "PO-000001");
        assert_eq!(DocumentKind::ProductionOrder.next_after(None), "PROD-000001");
        assert_eq!(DocumentKind::StockMovement.next_after(None), "MOV-000001");
        assert_eq!(DocumentKind::Bom.next_after(None), "BOM-00001");
    }

    #[test]
    fn test_numbering_continues_from_last() {
        assert_eq!(
            DocumentKind::ProductionOrder.next_after(Some("PROD-000041")),
            "PROD-000042"
        );
        assert_eq!(DocumentKind::Bom.next_after(Some("BOM-00099")), "BOM-00100");
    }

    /// A split lot number never advances the main batch sequence
    #[test]
    fn test_split_numbers() {
        let split = split_batch_number("BATCH-000007", 1);
        assert_eq!(split, "BATCH-000007-S1");
        assert_eq!(DocumentKind::Batch.parse_sequence(&split), None);
        assert_eq!(DocumentKind::Batch.next_after(Some(&split)), "BATCH-000001");
    }

    #[test]
    fn test_sql_pattern() {
        assert_eq!(DocumentKind::Shipment.sql_pattern(), "^SHP-[0-9]+$");
    }

    // ------------------------------------------------------------------------
    // Purchase orders
    // ------------------------------------------------------------------------

    #[test]
    fn test_purchase_order_flow() {
        let submitted = PurchaseOrderStatus::Draft
            .transition(PurchaseOrderStatus::Submitted)
            .unwrap();
        assert!(submitted.accepts_receipts());
        assert!(!PurchaseOrderStatus::Draft.accepts_receipts());
        assert!(PurchaseOrderStatus::Received
            .transition(PurchaseOrderStatus::Cancelled)
            .is_err());
    }

    #[test]
    fn test_purchase_order_status_after_receipt() {
        let partial = [(dec("100"), dec("40")), (dec("10"), dec("10"))];
        assert_eq!(PurchaseOrderStatus::after_receipt(&partial), PurchaseOrderStatus::Partial);

        let complete = [(dec("100"), dec("100")), (dec("10"), dec("12"))];
        assert_eq!(PurchaseOrderStatus::after_receipt(&complete), PurchaseOrderStatus::Received);

        let nothing = [(dec("100"), Decimal::ZERO)];
        assert_eq!(PurchaseOrderStatus::after_receipt(&nothing), PurchaseOrderStatus::Submitted);
    }

    // ------------------------------------------------------------------------
    // Shipments, external processing, production
    // ------------------------------------------------------------------------

    #[test]
    fn test_shipment_flow() {
        let shipped = ShipmentStatus::Pending.transition(ShipmentStatus::Shipped).unwrap();
        assert_eq!(shipped.transition(ShipmentStatus::Delivered), Ok(ShipmentStatus::Delivered));
        assert!(ShipmentStatus::Shipped.transition(ShipmentStatus::Cancelled).is_err());
        assert!(ShipmentStatus::Delivered.transition(ShipmentStatus::Pending).is_err());
    }

    #[test]
    fn test_external_process_returns() {
        assert_eq!(
            ExternalProcessStatus::after_return(dec("50"), dec("20")),
            ExternalProcessStatus::InProgress
        );
        assert_eq!(
            ExternalProcessStatus::after_return(dec("50"), dec("50")),
            ExternalProcessStatus::Completed
        );
        assert!(ExternalProcessStatus::InProgress.accepts_returns());
        assert!(!ExternalProcessStatus::Completed.accepts_returns());
    }

    #[test]
    fn test_production_flow() {
        let started = ProductionStatus::Draft
            .transition(ProductionStatus::Released)
            .and_then(|s| s.transition(ProductionStatus::InProgress))
            .unwrap();
        assert_eq!(started, ProductionStatus::InProgress);
        assert!(started.transition(ProductionStatus::Cancelled).is_err());
        assert!(ProductionStatus::Draft.transition(ProductionStatus::Completed).is_err());
    }

    #[test]
    fn test_bom_lifecycle() {
        assert!(BomStatus::Draft.is_editable());
        assert!(!BomStatus::Active.is_editable());
        assert!(BomStatus::Obsolete.transition(BomStatus::Active).is_err());
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = ShipmentStatus::Delivered
            .transition(ShipmentStatus::Cancelled)
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidTransition {
                entity: "shipment",
                from: "delivered".to_string(),
                to: "cancelled".to_string(),
            }
        );
    }

    #[test]
    fn test_status_text_round_trip() {
        assert_eq!(ProductionStatus::from_str("in_progress"), Ok(ProductionStatus::InProgress));
        assert!(ShipmentStatus::from_str("lost").is_err());
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    #[test]
    fn test_receipt_line_rules() {
        assert!(validate_receipt_line(dec("10"), dec("2")).is_ok());
        assert!(validate_receipt_line(dec("10"), dec("10.5")).is_err());
    }

    #[test]
    fn test_master_data_codes() {
        assert!(validate_sku("WIDGET-100").is_ok());
        assert!(validate_sku("widget").is_err());
        assert!(validate_location_code("MAIN").is_ok());
        assert!(validate_distinct_locations(4, 4).is_err());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn kind_strategy() -> impl Strategy<Value = DocumentKind> {
        prop::sample::select(vec![
            DocumentKind::Batch,
            DocumentKind::Receipt,
            DocumentKind::Shipment,
            DocumentKind::Scrap,
            DocumentKind::ExternalProcess,
            DocumentKind::PurchaseOrder,
            DocumentKind::ProductionOrder,
            DocumentKind::StockMovement,
            DocumentKind::Bom,
        ])
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The next number always parses back to last + 1
        #[test]
        fn prop_numbers_are_sequential(kind in kind_strategy(), seq in 0u64..10_000_000) {
            let last = kind.format(seq);
            let next = kind.next_after(Some(&last));
            prop_assert_eq!(kind.parse_sequence(&next), Some(seq + 1));
        }

        /// Padding keeps numbers of the same width lexically ordered
        #[test]
        fn prop_padded_numbers_sort(kind in kind_strategy(), a in 1u64..10_000, b in 1u64..10_000) {
            prop_assert_eq!(kind.format(a).cmp(&kind.format(b)), a.cmp(&b));
        }

        /// Purchase orders are received only once every line is covered
        #[test]
        fn prop_after_receipt_received_iff_all_covered(
            lines in prop::collection::vec((1i64..=1000, 0i64..=1200), 1..8)
        ) {
            let lines: Vec<(Decimal, Decimal)> = lines
                .into_iter()
                .map(|(o, r)| (Decimal::from(o), Decimal::from(r)))
                .collect();
            let status = PurchaseOrderStatus::after_receipt(&lines);
            let covered = lines.iter().all(|(o, r)| r >= o);

            prop_assert_eq!(status == PurchaseOrderStatus::Received, covered);
        }

        /// Scrap never exceeds the delivered quantity on a valid line
        #[test]
        fn prop_receipt_scrap_bounded(qty in 1i64..=1000, scrap in 0i64..=2000) {
            let result = validate_receipt_line(Decimal::from(qty), Decimal::from(scrap));
            prop_assert_eq!(result.is_ok(), scrap <= qty);
        }
    }
}
