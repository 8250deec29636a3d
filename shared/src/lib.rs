//! Shared types and models for the Feedlot Management Platform
//!
//! This crate contains the domain types shared between the backend engine
//! and any consumer of its service API (REST layer, reporting jobs, tooling).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
