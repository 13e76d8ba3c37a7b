//! Batch ledger computations: FIFO selection and cost roll-up

pub mod costing;
pub mod fifo;

pub use costing::*;
pub use fifo::*;
