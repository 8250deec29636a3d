//! Domain services of the mortality allocation and reconciliation engine

pub mod allocation;
pub mod analysis;
pub mod mortality;
pub mod statement;

pub use analysis::{AnalysisService, CompareRange, GenerateAnalysisInput};
pub use mortality::{MortalityService, RegisterMortalityInput};
pub use statement::AccrualStatementService;
