//! Occupancy models
//!
//! An occupancy link records how many head of a given lot currently live in
//! a given pen. Several lots may share a pen (co-mingled lots) and one lot
//! may be spread across several pens.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lot-in-pen link with a live quantity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyLink {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub pen_id: Uuid,
    pub quantity: i32,
    pub status: LinkStatus,
    pub allocated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Closed,
}

/// One row of the occupancy ledger read model: a lot's presence in a pen
/// together with the book value of one of its head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenOccupant {
    pub link_id: Uuid,
    pub lot_id: Uuid,
    pub lot_code: String,
    /// Head of this lot currently in the pen
    pub quantity: i32,
    /// Lot book cost divided by the lot's current head-count
    pub book_cost_per_head: Decimal,
}
