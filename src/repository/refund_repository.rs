use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::Refund,
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, RefundRepository},
};

#[derive(FromRow)]
struct RefundRow {
    id: String,
    booking_id: String,
    payment_id: String,
    amount_cents: i64,
    currency: String,
    provider: String,
    provider_refund_id: String,
    idempotency_key: String,
    created_at: NaiveDateTime,
}

pub struct SqliteRefundRepository {
    pool: SqlitePool,
}

impl SqliteRefundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_refund(row: RefundRow) -> Result<Refund> {
        Ok(Refund {
            id: parse_uuid(&row.id)?,
            booking_id: parse_uuid(&row.booking_id)?,
            payment_id: parse_uuid(&row.payment_id)?,
            amount_cents: row.amount_cents,
            currency: row.currency,
            provider: row.provider,
            provider_refund_id: row.provider_refund_id,
            idempotency_key: row.idempotency_key,
            created_at: to_utc(row.created_at),
        })
    }
}

#[async_trait]
impl RefundRepository for SqliteRefundRepository {
    async fn record(&self, refund: Refund) -> Result<Refund> {
        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, booking_id, payment_id, amount_cents, currency,
                provider, provider_refund_id, idempotency_key, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(refund.id.to_string())
        .bind(refund.booking_id.to_string())
        .bind(refund.payment_id.to_string())
        .bind(refund.amount_cents)
        .bind(&refund.currency)
        .bind(&refund.provider)
        .bind(&refund.provider_refund_id)
        .bind(&refund.idempotency_key)
        .bind(refund.created_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(refund)
    }

    async fn sum_for_payment(&self, payment_id: Uuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM refunds WHERE payment_id = ?"
        )
        .bind(payment_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn sum_for_booking(&self, booking_id: Uuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM refunds WHERE booking_id = ?"
        )
        .bind(booking_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn list_by_booking(&self, booking_id: Uuid) -> Result<Vec<Refund>> {
        let rows = sqlx::query_as::<_, RefundRow>(
            r#"
            SELECT id, booking_id, payment_id, amount_cents, currency,
                   provider, provider_refund_id, idempotency_key, created_at
            FROM refunds
            WHERE booking_id = ?
            ORDER BY created_at ASC
            "#
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_refund)
            .collect()
    }
}
