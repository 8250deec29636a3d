//! Pen models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical enclosure housing one or more lots simultaneously
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pen {
    pub id: Uuid,
    /// Human-readable pen identifier (e.g., "C-07")
    pub pen_number: String,
    /// Maximum head-count the pen can hold
    pub capacity: i32,
    pub status: PenStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PenStatus {
    Available,
    Occupied,
    Maintenance,
}

impl std::fmt::Display for PenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PenStatus::Available => write!(f, "available"),
            PenStatus::Occupied => write!(f, "occupied"),
            PenStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}
