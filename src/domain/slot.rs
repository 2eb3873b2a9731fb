use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub capacity: i64,
    pub max_participants: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SlotStatus {
    Draft,
    Published,
    Booked,
}

impl SlotStatus {
    /// Only slots in these states can be removed, and only while unreferenced.
    pub fn is_deletable(self) -> bool {
        matches!(self, SlotStatus::Draft | SlotStatus::Published)
    }
}

/// How a booking request points at its slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotSelector {
    Id(Uuid),
    StartsAt(DateTime<Utc>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default = "default_one")]
    pub capacity: i64,
    #[serde(default = "default_one")]
    pub max_participants: i64,
    #[serde(default)]
    pub publish: bool,
}

fn default_one() -> i64 {
    1
}
