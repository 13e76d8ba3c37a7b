//! Request extractors and middleware

pub mod actor;

pub use actor::Actor;
