use async_trait::async_trait;
use std::{collections::HashMap, future::Future, time::Duration};
use stripe::{
    Client, CreatePaymentIntent, CreateRefund, Currency, ListRefunds, PaymentIntent,
    PaymentIntentId, PaymentIntentStatus, Refund, RequestStrategy, StripeError,
};

use super::{
    CreatePaymentRequest, PaymentProvider, ProviderCheckout, ProviderError, ProviderPayment,
    ProviderPaymentStatus, ProviderRefund, ProviderResult,
};

/// Stripe adapter. Deposits are collected through PaymentIntents; the intent
/// id is the opaque provider payment id stored in the ledger.
pub struct StripeProvider {
    client: Client,
    timeout: Duration,
}

impl StripeProvider {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        let client = Client::new(api_key);
        Self { client, timeout }
    }

    async fn call<T, F>(&self, request: F) -> ProviderResult<T>
    where
        F: Future<Output = Result<T, StripeError>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_stripe_error(e)),
            Err(_) => Err(ProviderError::Unavailable(format!(
                "Stripe did not answer within {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &str {
        "stripe"
    }

    async fn create_payment(&self, request: CreatePaymentRequest) -> ProviderResult<ProviderCheckout> {
        let currency = parse_currency(&request.currency)?;

        let mut params = CreatePaymentIntent::new(request.amount_cents, currency);
        params.description = Some(&request.description);

        // Add metadata for tracking
        let mut metadata = HashMap::new();
        metadata.insert("booking_id".to_string(), request.booking_id.to_string());
        params.metadata = Some(metadata);

        let intent = self.call(PaymentIntent::create(&self.client, params)).await?;

        Ok(ProviderCheckout {
            id: intent.id.to_string(),
            client_secret: intent.client_secret,
            checkout_url: None,
        })
    }

    async fn get_payment(&self, provider_payment_id: &str) -> ProviderResult<ProviderPayment> {
        let id = parse_intent_id(provider_payment_id)?;

        let intent = self.call(PaymentIntent::retrieve(&self.client, &id, &[])).await?;

        let mut params = ListRefunds::new();
        params.payment_intent = Some(id.clone());
        params.limit = Some(100);
        let refunds = self.call(Refund::list(&self.client, &params)).await?;
        let refunded_cents = live_refund_total(
            refunds.data.iter().map(|r| (r.amount, r.status.as_deref())),
        );

        let status = map_intent_status(
            intent.status,
            intent.last_payment_error.is_some(),
            intent.amount,
            refunded_cents,
        );

        Ok(ProviderPayment {
            id: intent.id.to_string(),
            status,
            amount_cents: intent.amount,
            currency: intent.currency.to_string().to_uppercase(),
            refunded_cents,
        })
    }

    async fn create_refund(
        &self,
        provider_payment_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> ProviderResult<ProviderRefund> {
        let id = parse_intent_id(provider_payment_id)?;

        // Stripe deduplicates on the Idempotency-Key header.
        let client = self
            .client
            .clone()
            .with_strategy(RequestStrategy::Idempotent(idempotency_key.to_string()));

        let mut params = CreateRefund::new();
        params.payment_intent = Some(id);
        params.amount = Some(amount_cents);

        let refund = self.call(Refund::create(&client, params)).await?;

        Ok(ProviderRefund {
            id: refund.id.to_string(),
            amount_cents: refund.amount,
        })
    }
}

fn parse_intent_id(raw: &str) -> ProviderResult<PaymentIntentId> {
    raw.parse::<PaymentIntentId>()
        .map_err(|e| ProviderError::Rejected(format!("invalid payment intent id {}: {}", raw, e)))
}

fn parse_currency(code: &str) -> ProviderResult<Currency> {
    match code.to_ascii_uppercase().as_str() {
        "EUR" => Ok(Currency::EUR),
        "USD" => Ok(Currency::USD),
        "GBP" => Ok(Currency::GBP),
        "CHF" => Ok(Currency::CHF),
        other => Err(ProviderError::Rejected(format!("unsupported currency: {}", other))),
    }
}

/// Sum of refunds that returned or are returning money. Failed and canceled
/// refunds are left out.
fn live_refund_total<'a>(refunds: impl IntoIterator<Item = (i64, Option<&'a str>)>) -> i64 {
    refunds
        .into_iter()
        .filter(|(_, status)| matches!(status, Some("succeeded") | Some("pending")))
        .map(|(amount, _)| amount)
        .sum()
}

fn map_intent_status(
    status: PaymentIntentStatus,
    has_payment_error: bool,
    amount_cents: i64,
    refunded_cents: i64,
) -> ProviderPaymentStatus {
    match status {
        PaymentIntentStatus::Succeeded if amount_cents > 0 && refunded_cents >= amount_cents => {
            ProviderPaymentStatus::Refunded
        }
        PaymentIntentStatus::Succeeded => ProviderPaymentStatus::Paid,
        PaymentIntentStatus::RequiresCapture => ProviderPaymentStatus::Authorized,
        PaymentIntentStatus::Processing => ProviderPaymentStatus::Pending,
        PaymentIntentStatus::Canceled => ProviderPaymentStatus::Canceled,
        // A declined attempt drops the intent back to requires_payment_method.
        PaymentIntentStatus::RequiresPaymentMethod if has_payment_error => ProviderPaymentStatus::Failed,
        _ => ProviderPaymentStatus::Open,
    }
}

fn map_stripe_error(err: StripeError) -> ProviderError {
    match &err {
        StripeError::Stripe(request) if request.http_status < 500 => {
            ProviderError::Rejected(err.to_string())
        }
        _ => ProviderError::Unavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeded_intent_with_full_refund_reads_as_refunded() {
        assert_eq!(
            map_intent_status(PaymentIntentStatus::Succeeded, false, 1125, 1125),
            ProviderPaymentStatus::Refunded
        );
        assert_eq!(
            map_intent_status(PaymentIntentStatus::Succeeded, false, 1125, 500),
            ProviderPaymentStatus::Paid
        );
    }

    #[test]
    fn declined_attempt_reads_as_failed() {
        assert_eq!(
            map_intent_status(PaymentIntentStatus::RequiresPaymentMethod, true, 1125, 0),
            ProviderPaymentStatus::Failed
        );
        assert_eq!(
            map_intent_status(PaymentIntentStatus::RequiresPaymentMethod, false, 1125, 0),
            ProviderPaymentStatus::Open
        );
    }

    #[test]
    fn failed_and_canceled_refunds_are_not_counted() {
        let refunds = [
            (500, Some("succeeded")),
            (300, Some("pending")),
            (1125, Some("failed")),
            (200, Some("canceled")),
            (100, None),
        ];
        assert_eq!(live_refund_total(refunds), 800);
        assert_eq!(live_refund_total(Vec::new()), 0);
    }

    #[test]
    fn unknown_currency_is_rejected() {
        assert!(parse_currency("eur").is_ok());
        assert!(matches!(parse_currency("XYZ"), Err(ProviderError::Rejected(_))));
    }
}
