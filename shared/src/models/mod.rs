//! Domain models for the Inventory ERP

/// Declares a status-like enum stored as a lowercase string column.
///
/// The serde representation, `as_str` and `FromStr` all use the same text.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
        #[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(crate::error::LedgerError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

mod adjustment;
mod batch;
mod external_process;
mod inventory;
mod item;
mod production;
mod purchasing;
mod scrap;
mod shipment;
mod stock_movement;

pub use adjustment::*;
pub use batch::*;
pub use external_process::*;
pub use inventory::*;
pub use item::*;
pub use production::*;
pub use purchasing::*;
pub use scrap::*;
pub use shipment::*;
pub use stock_movement::*;

use crate::error::{LedgerError, LedgerResult};

/// Document workflow states
pub trait StatusFlow: Copy + PartialEq + std::fmt::Display {
    /// Entity name used in error messages
    const ENTITY: &'static str;

    fn can_transition_to(&self, next: Self) -> bool;

    /// Returns `next` when the move is allowed
    fn transition(self, next: Self) -> LedgerResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(LedgerError::InvalidTransition {
                entity: Self::ENTITY,
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}
