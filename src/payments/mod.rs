use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::PaymentStatus;

pub mod sandbox;
pub mod stripe_client;

pub use sandbox::SandboxProvider;
pub use stripe_client::StripeProvider;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure, timeout or provider outage. Safe to retry later.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider understood the request and refused it.
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

/// Status vocabulary as reported by the provider, before it is mirrored locally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPaymentStatus {
    Open,
    Pending,
    Authorized,
    Paid,
    Failed,
    Canceled,
    Expired,
    Refunded,
    ChargedBack,
}

impl ProviderPaymentStatus {
    pub fn to_local(self) -> PaymentStatus {
        match self {
            ProviderPaymentStatus::Open | ProviderPaymentStatus::Pending => PaymentStatus::Pending,
            ProviderPaymentStatus::Authorized | ProviderPaymentStatus::Paid => PaymentStatus::Paid,
            ProviderPaymentStatus::Failed => PaymentStatus::Failed,
            ProviderPaymentStatus::Canceled | ProviderPaymentStatus::Expired => PaymentStatus::Canceled,
            ProviderPaymentStatus::Refunded | ProviderPaymentStatus::ChargedBack => PaymentStatus::Refunded,
        }
    }
}

/// Authoritative snapshot of a payment, fetched by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPayment {
    pub id: String,
    pub status: ProviderPaymentStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub refunded_cents: i64,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ProviderCheckout {
    pub id: String,
    pub client_secret: Option<String>,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRefund {
    pub id: String,
    pub amount_cents: i64,
}

/// Port over the external payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn create_payment(&self, request: CreatePaymentRequest) -> ProviderResult<ProviderCheckout>;

    async fn get_payment(&self, provider_payment_id: &str) -> ProviderResult<ProviderPayment>;

    /// Refund `amount_cents`. Repeating a call with the same idempotency key
    /// must not move money twice.
    async fn create_refund(
        &self,
        provider_payment_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> ProviderResult<ProviderRefund>;
}
