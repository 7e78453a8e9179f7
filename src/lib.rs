//! Multi-tenant certificate issuance with tamper-evident public verification.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
