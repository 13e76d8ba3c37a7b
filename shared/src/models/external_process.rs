//! Material sent to outside processors (plating, heat treatment, ...)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StatusFlow;

string_enum! {
    pub enum ExternalProcessStatus ("external process status") {
        Sent => "sent",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl StatusFlow for ExternalProcessStatus {
    const ENTITY: &'static str = "external process";

    fn can_transition_to(&self, next: Self) -> bool {
        use ExternalProcessStatus::*;
        matches!(
            (self, next),
            (Sent, InProgress)
                | (Sent, Completed)
                | (Sent, Cancelled)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }
}

impl ExternalProcessStatus {
    pub fn accepts_returns(&self) -> bool {
        matches!(self, ExternalProcessStatus::Sent | ExternalProcessStatus::InProgress)
    }

    /// Status once `returned` units of `sent` have come back
    pub fn after_return(sent: Decimal, returned: Decimal) -> Self {
        if returned >= sent {
            ExternalProcessStatus::Completed
        } else {
            ExternalProcessStatus::InProgress
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ExternalProcess {
    pub id: i64,
    pub process_number: String,
    /// Item sent out
    pub item_id: i64,
    /// Item expected back when processing creates a new SKU
    pub returned_item_id: Option<i64>,
    pub location_id: i64,
    pub supplier_name: String,
    pub process_type: String,
    pub process_result: Option<String>,
    pub quantity_sent: Decimal,
    pub quantity_returned: Decimal,
    /// FIFO cost of the material sent
    pub material_cost: Decimal,
    /// Processor's fee
    pub process_cost: Decimal,
    pub status: ExternalProcessStatus,
    pub sent_date: DateTime<Utc>,
    pub expected_return: Option<DateTime<Utc>>,
    pub actual_return: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl ExternalProcess {
    /// Item that comes back from the processor
    pub fn return_item_id(&self) -> i64 {
        self.returned_item_id.unwrap_or(self.item_id)
    }

    pub fn accepts_item(&self, item_id: i64) -> bool {
        item_id == self.item_id || self.returned_item_id == Some(item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_return_keeps_process_open() {
        assert_eq!(
            ExternalProcessStatus::after_return(Decimal::from(10), Decimal::from(4)),
            ExternalProcessStatus::InProgress
        );
        assert_eq!(
            ExternalProcessStatus::after_return(Decimal::from(10), Decimal::from(10)),
            ExternalProcessStatus::Completed
        );
    }

    #[test]
    fn processed_material_may_return_as_another_item() {
        let mut process = ExternalProcess {
            id: 1,
            process_number: "EXT-000001".into(),
            item_id: 10,
            returned_item_id: None,
            location_id: 1,
            supplier_name: "Heat Treat Co".into(),
            process_type: "hardening".into(),
            process_result: None,
            quantity_sent: Decimal::from(50),
            quantity_returned: Decimal::ZERO,
            material_cost: Decimal::from(500),
            process_cost: Decimal::from(75),
            status: ExternalProcessStatus::Sent,
            sent_date: Utc::now(),
            expected_return: None,
            actual_return: None,
            notes: None,
            created_by: None,
            created_at: Utc::now(),
        };
        assert_eq!(process.return_item_id(), 10);
        assert!(!process.accepts_item(11));

        process.returned_item_id = Some(11);
        assert_eq!(process.return_item_id(), 11);
        assert!(process.accepts_item(11));
        assert!(process.accepts_item(10));
    }

    #[test]
    fn completed_process_is_closed() {
        assert!(!ExternalProcessStatus::Completed.accepts_returns());
        assert!(ExternalProcessStatus::Completed
            .transition(ExternalProcessStatus::Cancelled)
            .is_err());
    }
}
