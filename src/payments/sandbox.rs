use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CreatePaymentRequest, PaymentProvider, ProviderCheckout, ProviderError, ProviderPayment,
    ProviderPaymentStatus, ProviderRefund, ProviderResult,
};

#[derive(Debug, Clone)]
struct SandboxPayment {
    status: ProviderPaymentStatus,
    amount_cents: i64,
    currency: String,
    refunded_cents: i64,
}

#[derive(Default)]
struct SandboxState {
    payments: HashMap<String, SandboxPayment>,
    refunds_by_key: HashMap<String, ProviderRefund>,
}

/// In-process provider used when Stripe is disabled and by the test suite.
/// Payment state only changes when driven through the `set_*` helpers, which
/// stand in for a customer completing (or abandoning) checkout.
#[derive(Default)]
pub struct SandboxProvider {
    state: Mutex<SandboxState>,
    unavailable: AtomicBool,
}

impl SandboxProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_status(&self, provider_payment_id: &str, status: ProviderPaymentStatus) {
        let mut state = self.state.lock().await;
        if let Some(payment) = state.payments.get_mut(provider_payment_id) {
            payment.status = status;
        } else {
            tracing::warn!("Sandbox: unknown payment {}", provider_payment_id);
        }
    }

    /// Simulate an outage: every call fails with `ProviderError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Refund issued directly at the provider (dashboard, support desk),
    /// invisible to the local ledger.
    pub async fn record_external_refund(&self, provider_payment_id: &str, amount_cents: i64) {
        let mut state = self.state.lock().await;
        if let Some(payment) = state.payments.get_mut(provider_payment_id) {
            payment.refunded_cents += amount_cents;
        }
    }

    pub async fn refunded_cents(&self, provider_payment_id: &str) -> i64 {
        let state = self.state.lock().await;
        state
            .payments
            .get(provider_payment_id)
            .map(|p| p.refunded_cents)
            .unwrap_or(0)
    }

    pub async fn refund_count(&self) -> usize {
        self.state.lock().await.refunds_by_key.len()
    }

    fn check_available(&self) -> ProviderResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("sandbox outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for SandboxProvider {
    fn name(&self) -> &str {
        "sandbox"
    }

    async fn create_payment(&self, request: CreatePaymentRequest) -> ProviderResult<ProviderCheckout> {
        self.check_available()?;
        if request.amount_cents <= 0 {
            return Err(ProviderError::Rejected("amount must be positive".to_string()));
        }

        let id = format!("sbx_pay_{}", Uuid::new_v4().simple());
        let mut state = self.state.lock().await;
        state.payments.insert(
            id.clone(),
            SandboxPayment {
                status: ProviderPaymentStatus::Open,
                amount_cents: request.amount_cents,
                currency: request.currency,
                refunded_cents: 0,
            },
        );

        tracing::debug!("Sandbox: created payment {} for booking {}", id, request.booking_id);

        Ok(ProviderCheckout {
            client_secret: Some(format!("{}_secret", id)),
            checkout_url: None,
            id,
        })
    }

    async fn get_payment(&self, provider_payment_id: &str) -> ProviderResult<ProviderPayment> {
        self.check_available()?;
        let state = self.state.lock().await;
        let payment = state
            .payments
            .get(provider_payment_id)
            .ok_or_else(|| ProviderError::Rejected(format!("unknown payment {}", provider_payment_id)))?;

        Ok(ProviderPayment {
            id: provider_payment_id.to_string(),
            status: payment.status,
            amount_cents: payment.amount_cents,
            currency: payment.currency.clone(),
            refunded_cents: payment.refunded_cents,
        })
    }

    async fn create_refund(
        &self,
        provider_payment_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> ProviderResult<ProviderRefund> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        if let Some(existing) = state.refunds_by_key.get(idempotency_key) {
            return Ok(existing.clone());
        }

        let payment = state
            .payments
            .get_mut(provider_payment_id)
            .ok_or_else(|| ProviderError::Rejected(format!("unknown payment {}", provider_payment_id)))?;

        if !matches!(
            payment.status,
            ProviderPaymentStatus::Paid | ProviderPaymentStatus::Authorized | ProviderPaymentStatus::Refunded
        ) {
            return Err(ProviderError::Rejected("payment is not refundable".to_string()));
        }
        if amount_cents <= 0 || payment.refunded_cents + amount_cents > payment.amount_cents {
            return Err(ProviderError::Rejected(format!(
                "refund of {} exceeds refundable amount",
                amount_cents
            )));
        }

        payment.refunded_cents += amount_cents;
        if payment.refunded_cents >= payment.amount_cents {
            payment.status = ProviderPaymentStatus::Refunded;
        }

        let refund = ProviderRefund {
            id: format!("sbx_re_{}", Uuid::new_v4().simple()),
            amount_cents,
        };
        state
            .refunds_by_key
            .insert(idempotency_key.to_string(), refund.clone());

        Ok(refund)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount_cents: i64) -> CreatePaymentRequest {
        CreatePaymentRequest {
            booking_id: Uuid::new_v4(),
            amount_cents,
            currency: "EUR".to_string(),
            description: "Deposit".to_string(),
        }
    }

    #[tokio::test]
    async fn same_idempotency_key_refunds_once() {
        let provider = SandboxProvider::new();
        let checkout = provider.create_payment(request(1000)).await.unwrap();
        provider.set_status(&checkout.id, ProviderPaymentStatus::Paid).await;

        let first = provider.create_refund(&checkout.id, 400, "key-1").await.unwrap();
        let second = provider.create_refund(&checkout.id, 400, "key-1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.refunded_cents(&checkout.id).await, 400);
        assert_eq!(provider.refund_count().await, 1);
    }

    #[tokio::test]
    async fn refund_beyond_paid_amount_is_rejected() {
        let provider = SandboxProvider::new();
        let checkout = provider.create_payment(request(1000)).await.unwrap();
        provider.set_status(&checkout.id, ProviderPaymentStatus::Paid).await;

        let result = provider.create_refund(&checkout.id, 1001, "key-2").await;
        assert!(matches!(result, Err(ProviderError::Rejected(_))));
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let provider = SandboxProvider::new();
        provider.set_unavailable(true);
        let result = provider.create_payment(request(1000)).await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }
}
