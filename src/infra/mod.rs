//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod http;
pub mod pdf;
pub mod qr;
pub mod storage;
pub mod telemetry;
