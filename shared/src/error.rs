//! Errors raised by the pure ledger logic

use rust_decimal::Decimal;
use thiserror::Error;

/// Ledger rule violations
///
/// These never carry database context. The backend attaches item and
/// location details before reporting them to a client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("cannot consume {requested} from batch {batch_number}: only {available} remaining")]
    BatchOverdraw {
        batch_number: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("{0} is out of range")]
    Overflow(&'static str),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
