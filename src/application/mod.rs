//! Application services layer.

pub mod certificates;
pub mod error;
pub mod jobs;
pub mod rendering;
pub mod repos;
pub mod services;
pub mod storage;
pub mod templates;
pub mod tokens;
pub mod verification;
