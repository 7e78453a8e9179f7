//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod placeholders;
pub mod tenant;
pub mod types;
pub mod verification;
