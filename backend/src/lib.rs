//! Feedlot Management Platform - Financial Engine
//!
//! Mortality cost allocation and accrual/cash reconciliation for cattle
//! feedlot operations. Pens co-mingle animals from several purchase lots;
//! when deaths occur the engine distributes the loss across the affected
//! lots by weighted-average book cost, folds it into the monthly accrual
//! statement, and reconciles the accrual view of each month against its
//! realized cash flow.
//!
//! The services are storage-agnostic: they run against any [`storage::FeedlotStore`],
//! with [`storage::PgStore`] backing production and [`storage::MemoryStore`]
//! backing tests.

pub mod config;
pub mod error;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
