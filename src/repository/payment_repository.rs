use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqliteConnection, SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus, PaymentType},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, PaymentRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    booking_id: String,
    provider: String,
    payment_type: String,
    status: String,
    provider_payment_id: String,
    amount_cents: i64,
    currency: String,
    client_secret: Option<String>,
    checkout_url: Option<String>,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: parse_uuid(&row.id)?,
            booking_id: parse_uuid(&row.booking_id)?,
            provider: row.provider,
            payment_type: Self::parse_payment_type(&row.payment_type)?,
            status: Self::parse_payment_status(&row.status)?,
            provider_payment_id: row.provider_payment_id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            client_secret: row.client_secret,
            checkout_url: row.checkout_url,
            paid_at: row.paid_at.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Created" => Ok(PaymentStatus::Created),
            "Pending" => Ok(PaymentStatus::Pending),
            "Paid" => Ok(PaymentStatus::Paid),
            "Failed" => Ok(PaymentStatus::Failed),
            "Canceled" => Ok(PaymentStatus::Canceled),
            "Refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn payment_status_to_str(status: PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Created => "Created",
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Canceled => "Canceled",
            PaymentStatus::Refunded => "Refunded",
        }
    }

    fn parse_payment_type(s: &str) -> Result<PaymentType> {
        match s {
            "Deposit" => Ok(PaymentType::Deposit),
            _ => Err(AppError::Database(format!("Invalid payment type: {}", s))),
        }
    }

    fn payment_type_to_str(payment_type: PaymentType) -> &'static str {
        match payment_type {
            PaymentType::Deposit => "Deposit",
        }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let paid_at_naive = payment.paid_at.map(|dt| dt.naive_utc());
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, booking_id, provider, payment_type, status,
                provider_payment_id, amount_cents, currency,
                client_secret, checkout_url, paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(payment.id.to_string())
        .bind(payment.booking_id.to_string())
        .bind(&payment.provider)
        .bind(Self::payment_type_to_str(payment.payment_type))
        .bind(Self::payment_status_to_str(payment.status))
        .bind(&payment.provider_payment_id)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(&payment.client_secret)
        .bind(&payment.checkout_url)
        .bind(paid_at_naive)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, provider, payment_type, status,
                   provider_payment_id, amount_cents, currency,
                   client_secret, checkout_url, paid_at, created_at, updated_at
            FROM payments
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None)
        }
    }

    async fn find_by_provider_id(&self, provider_payment_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, provider, payment_type, status,
                   provider_payment_id, amount_cents, currency,
                   client_secret, checkout_url, paid_at, created_at, updated_at
            FROM payments
            WHERE provider_payment_id = ?
            "#
        )
        .bind(provider_payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None)
        }
    }

    async fn list_by_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, provider, payment_type, status,
                   provider_payment_id, amount_cents, currency,
                   client_secret, checkout_url, paid_at, created_at, updated_at
            FROM payments
            WHERE booking_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Self::row_to_payment)
            .collect()
    }

    async fn advance_status(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let from: Vec<&'static str> = status
            .allowed_predecessors()
            .iter()
            .filter(|s| **s != status)
            .map(|s| Self::payment_status_to_str(*s))
            .collect();
        if from.is_empty() {
            return Ok(false);
        }

        let sql = format!(
            r#"
            UPDATE payments
            SET status = ?,
                paid_at = COALESCE(paid_at, ?),
                updated_at = ?
            WHERE id = ? AND status IN ({})
            "#,
            vec!["?"; from.len()].join(", ")
        );

        // If status is paid, also stamp paid_at (first observation wins)
        let paid_at = (status == PaymentStatus::Paid).then(|| at.naive_utc());

        let mut query = sqlx::query(&sql)
            .bind(Self::payment_status_to_str(status))
            .bind(paid_at)
            .bind(at.naive_utc())
            .bind(id.to_string());
        for s in from {
            query = query.bind(s);
        }

        let result = query.execute(&mut *conn).await?;

        Ok(result.rows_affected() == 1)
    }
}
