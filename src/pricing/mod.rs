//! Deposit/rest price calculation.
//!
//! Everything here is pure: the same inputs always produce the same quote, so
//! callers can recompute a booking's price at any time from its gross total.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::{
    config::PricingPolicy,
    domain::{Discount, PartnerRates},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub total_before_discount_cents: i64,
    pub discount_amount_cents: i64,
    pub total_after_cents: i64,
    pub deposit_amount_cents: i64,
    pub rest_amount_cents: i64,
}

/// Gross price for a slot: tiered base rate plus stacked time surcharges.
pub fn compute_base_total(
    rates: &PartnerRates,
    slot_start: DateTime<Utc>,
    participant_count: i64,
    policy: &PricingPolicy,
) -> i64 {
    let base = if participant_count <= 1 {
        rates.single_cents
    } else {
        rates.group_per_person_cents * participant_count
    };

    let percent = 100 + surcharge_percent(slot_start, policy);
    round_div(base * percent, 100)
}

/// Additive surcharge percentage for the slot's local start time.
pub fn surcharge_percent(slot_start: DateTime<Utc>, policy: &PricingPolicy) -> i64 {
    let offset = FixedOffset::east_opt(policy.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
    let local = slot_start.with_timezone(&offset);

    let mut percent = 0;
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        percent += policy.weekend_surcharge_percent;
    }
    if local.hour() >= policy.evening_start_hour {
        percent += policy.evening_surcharge_percent;
    }
    percent
}

/// Split a gross total into discount, deposit and rest.
///
/// The discount is capped at `discount_cap_percent` of the gross total, so
/// passing the same discount twice yields the same quote rather than a
/// compounded one.
pub fn compute_quote(
    total_before_discount_cents: i64,
    fee_percent: i64,
    discount: Option<Discount>,
    policy: &PricingPolicy,
) -> Quote {
    let total = total_before_discount_cents.max(0);

    let requested = match discount {
        Some(Discount::Percent(p)) => round_div(total * p.clamp(0, 100), 100),
        Some(Discount::Fixed(cents)) => cents.max(0),
        None => 0,
    };
    let cap = round_div(total * policy.discount_cap_percent.clamp(0, 100), 100);
    let discount_amount = requested.min(cap).min(total);

    let total_after = total - discount_amount;
    let deposit = round_div(total_after * fee_percent.clamp(0, 100), 100);

    Quote {
        total_before_discount_cents: total,
        discount_amount_cents: discount_amount,
        total_after_cents: total_after,
        deposit_amount_cents: deposit,
        rest_amount_cents: total_after - deposit,
    }
}

/// Integer division rounding half to even.
fn round_div(numerator: i64, denominator: i64) -> i64 {
    if numerator < 0 {
        return -round_div(-numerator, denominator);
    }
    let quotient = numerator / denominator;
    let twice_remainder = 2 * (numerator % denominator);
    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}
