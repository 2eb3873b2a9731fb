use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCode {
    pub code: String,
    pub discount: Discount,
    pub active: bool,
    pub partner_id: Option<Uuid>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl DiscountCode {
    pub fn is_usable_for(&self, partner_id: Uuid, now: DateTime<Utc>) -> bool {
        self.active
            && self.partner_id.map_or(true, |p| p == partner_id)
            && self.valid_until.map_or(true, |until| now <= until)
    }
}

/// A requested reduction, before the cap is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Discount {
    Percent(i64),
    Fixed(i64),
}
