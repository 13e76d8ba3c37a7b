//! Document numbering
//!
//! Every document gets a human readable number made of a fixed prefix and a
//! zero padded sequence, e.g. `BATCH-000042` or `BOM-00007`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Batch,
    Receipt,
    Shipment,
    Scrap,
    ExternalProcess,
    PurchaseOrder,
    ProductionOrder,
    StockMovement,
    Adjustment,
    Bom,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Batch => "BATCH",
            DocumentKind::Receipt => "RCV",
            DocumentKind::Shipment => "SHP",
            DocumentKind::Scrap => "SCRAP",
            DocumentKind::ExternalProcess => "EXT",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::ProductionOrder => "PROD",
            DocumentKind::StockMovement => "MOV",
            DocumentKind::Adjustment => "ADJ",
            DocumentKind::Bom => "BOM",
        }
    }

    /// Digits in the sequence part
    pub fn width(&self) -> usize {
        match self {
            DocumentKind::Bom => 5,
            _ => 6,
        }
    }

    pub fn format(&self, sequence: u64) -> String {
        format!("{}-{:0width$}", self.prefix(), sequence, width = self.width())
    }

    /// Sequence of a number in this kind's format, `None` for anything else
    /// (split batch numbers included)
    pub fn parse_sequence(&self, number: &str) -> Option<u64> {
        let digits = number.strip_prefix(self.prefix())?.strip_prefix('-')?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Number following `last`, starting at 1
    pub fn next_after(&self, last: Option<&str>) -> String {
        let sequence = last
            .and_then(|n| self.parse_sequence(n))
            .unwrap_or(0);
        self.format(sequence + 1)
    }

    /// Postgres regex matching plain numbers of this kind
    pub fn sql_pattern(&self) -> String {
        format!("^{}-[0-9]+$", self.prefix())
    }
}

/// Number of the `n`th batch split from `source`
pub fn split_batch_number(source: &str, n: u32) -> String {
    format!("{}-S{}", source, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_padding() {
        assert_eq!(DocumentKind::Batch.format(42), "BATCH-000042");
        assert_eq!(DocumentKind::Bom.format(7), "BOM-00007");
        assert_eq!(DocumentKind::Scrap.format(1), "SCRAP-000001");
        assert_eq!(DocumentKind::Adjustment.format(12), "ADJ-000012");
    }

    #[test]
    fn next_number_starts_at_one() {
        assert_eq!(DocumentKind::Receipt.next_after(None), "RCV-000001");
        assert_eq!(
            DocumentKind::Receipt.next_after(Some("RCV-000009")),
            "RCV-000010"
        );
    }

    #[test]
    fn sequence_outgrows_padding() {
        assert_eq!(
            DocumentKind::Shipment.next_after(Some("SHP-999999")),
            "SHP-1000000"
        );
    }

    #[test]
    fn ignores_foreign_and_split_numbers() {
        assert_eq!(DocumentKind::Batch.parse_sequence("BATCH-000003-S1"), None);
        assert_eq!(DocumentKind::Batch.parse_sequence("PO-000003"), None);
        assert_eq!(DocumentKind::ProductionOrder.parse_sequence("PO-000003"), None);
        assert_eq!(DocumentKind::PurchaseOrder.parse_sequence("PO-000003"), Some(3));
    }

    #[test]
    fn split_numbers_derive_from_source() {
        assert_eq!(split_batch_number("BATCH-000012", 2), "BATCH-000012-S2");
    }
}
