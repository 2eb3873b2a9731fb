use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider: String,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub provider_payment_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub client_secret: Option<String>,
    pub checkout_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Local mirror of the provider's view of a payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Canceled,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Created,
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Canceled,
        PaymentStatus::Refunded,
    ];

    /// States from which `self` may be written. Paid and Canceled are never
    /// overwritten by an older open/failed observation, and Refunded is terminal.
    pub fn allowed_predecessors(self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Created => &[Created],
            Pending => &[Created, Pending, Failed],
            Failed => &[Created, Pending, Failed],
            Paid => &[Created, Pending, Failed, Paid],
            Canceled => &[Created, Pending, Failed, Canceled],
            Refunded => &[Created, Pending, Failed, Paid, Canceled, Refunded],
        }
    }

    pub fn can_advance_to(self, next: PaymentStatus) -> bool {
        next.allowed_predecessors().contains(&self)
    }

    /// Money was captured at some point.
    pub fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Refunded)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Paid | PaymentStatus::Canceled | PaymentStatus::Refunded
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentType {
    Deposit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_is_not_downgraded_by_stale_observations() {
        assert!(!PaymentStatus::Paid.can_advance_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Paid.can_advance_to(PaymentStatus::Created));
        assert!(!PaymentStatus::Paid.can_advance_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Paid.can_advance_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Paid.can_advance_to(PaymentStatus::Refunded));
    }

    #[test]
    fn failed_attempt_can_still_be_paid() {
        assert!(PaymentStatus::Failed.can_advance_to(PaymentStatus::Pending));
        assert!(PaymentStatus::Failed.can_advance_to(PaymentStatus::Paid));
    }

    #[test]
    fn refunded_is_terminal() {
        for next in PaymentStatus::ALL {
            assert_eq!(
                PaymentStatus::Refunded.can_advance_to(next),
                next == PaymentStatus::Refunded
            );
        }
    }
}
