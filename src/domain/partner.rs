use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub currency: String,
    pub rates: PartnerRates,
    /// Share of the discounted total collected online as deposit.
    pub fee_percent: i64,
    pub notification_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Tiered base rate card: one price for a single participant, a per-person
/// price once two or more take part.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartnerRates {
    pub single_cents: i64,
    pub group_per_person_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePartnerRequest {
    pub slug: String,
    pub name: String,
    pub currency: String,
    pub rates: PartnerRates,
    pub fee_percent: i64,
    pub notification_email: Option<String>,
}
