//! Domain models for the Feedlot Management Platform

mod analysis;
mod lot;
mod mortality;
mod occupancy;
mod pen;
mod statement;
mod transaction;

pub use analysis::*;
pub use lot::*;
pub use mortality::*;
pub use occupancy::*;
pub use pen::*;
pub use statement::*;
pub use transaction::*;
