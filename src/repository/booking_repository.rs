use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus, CancelActor},
    error::{AppError, Result},
    pricing::Quote,
    repository::{parse_uuid, to_utc, BookingRepository},
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    partner_id: String,
    slot_id: String,
    customer_id: String,
    status: String,
    currency: String,
    total_amount_cents: i64,
    discount_amount_cents: i64,
    deposit_amount_cents: i64,
    rest_amount_cents: i64,
    discount_code: Option<String>,
    participant_count: i64,
    confirmed_at: Option<NaiveDateTime>,
    cancelled_at: Option<NaiveDateTime>,
    cancelled_by: Option<String>,
    emails_sent_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const BOOKING_COLUMNS: &str = r#"
    id, partner_id, slot_id, customer_id, status, currency,
    total_amount_cents, discount_amount_cents, deposit_amount_cents, rest_amount_cents,
    discount_code, participant_count, confirmed_at, cancelled_at, cancelled_by,
    emails_sent_at, created_at, updated_at
"#;

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        let cancelled_by = match row.cancelled_by {
            Some(actor) => Some(CancelActor::parse(&actor).ok_or_else(|| {
                AppError::Database(format!("Invalid cancel actor: {}", actor))
            })?),
            None => None,
        };

        Ok(Booking {
            id: parse_uuid(&row.id)?,
            partner_id: parse_uuid(&row.partner_id)?,
            slot_id: parse_uuid(&row.slot_id)?,
            customer_id: parse_uuid(&row.customer_id)?,
            status: Self::parse_booking_status(&row.status)?,
            currency: row.currency,
            total_amount_cents: row.total_amount_cents,
            discount_amount_cents: row.discount_amount_cents,
            deposit_amount_cents: row.deposit_amount_cents,
            rest_amount_cents: row.rest_amount_cents,
            discount_code: row.discount_code,
            participant_count: row.participant_count,
            confirmed_at: row.confirmed_at.map(to_utc),
            cancelled_at: row.cancelled_at.map(to_utc),
            cancelled_by,
            emails_sent_at: row.emails_sent_at.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn parse_booking_status(s: &str) -> Result<BookingStatus> {
        match s {
            "Pending" => Ok(BookingStatus::Pending),
            "Confirmed" => Ok(BookingStatus::Confirmed),
            "Cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid booking status: {}", s))),
        }
    }

    fn booking_status_to_str(status: BookingStatus) -> &'static str {
        match status {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn insert(&self, conn: &mut SqliteConnection, booking: &Booking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, partner_id, slot_id, customer_id, status, currency,
                total_amount_cents, discount_amount_cents, deposit_amount_cents, rest_amount_cents,
                discount_code, participant_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(booking.id.to_string())
        .bind(booking.partner_id.to_string())
        .bind(booking.slot_id.to_string())
        .bind(booking.customer_id.to_string())
        .bind(Self::booking_status_to_str(booking.status))
        .bind(&booking.currency)
        .bind(booking.total_amount_cents)
        .bind(booking.discount_amount_cents)
        .bind(booking.deposit_amount_cents)
        .bind(booking.rest_amount_cents)
        .bind(&booking.discount_code)
        .bind(booking.participant_count)
        .bind(booking.created_at.naive_utc())
        .bind(booking.updated_at.naive_utc())
        .execute(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db)
                if db.is_unique_violation() || db.message().contains("UNIQUE constraint failed") =>
            {
                AppError::SlotAlreadyReserved
            }
            other => AppError::Database(other.to_string()),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = ?",
            BOOKING_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn list_active_by_slot(&self, slot_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE slot_id = ? AND status <> 'Cancelled'",
            BOOKING_COLUMNS
        ))
        .bind(slot_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_booking)
            .collect()
    }

    async fn confirm(&self, conn: &mut SqliteConnection, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let at = at.naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'Confirmed', confirmed_at = ?, updated_at = ?
            WHERE id = ? AND status = 'Pending'
            "#
        )
        .bind(at)
        .bind(at)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn cancel(&self, conn: &mut SqliteConnection, id: Uuid, actor: CancelActor, at: DateTime<Utc>) -> Result<bool> {
        let at = at.naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'Cancelled', cancelled_at = ?, cancelled_by = ?, updated_at = ?
            WHERE id = ? AND status <> 'Cancelled'
            "#
        )
        .bind(at)
        .bind(actor.as_str())
        .bind(at)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn cancel_if_unpaid(&self, conn: &mut SqliteConnection, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let at = at.naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'Cancelled', cancelled_at = ?, cancelled_by = 'system', updated_at = ?
            WHERE id = ?
              AND status = 'Pending'
              AND NOT EXISTS (
                  SELECT 1 FROM payments
                  WHERE payments.booking_id = bookings.id
                    AND payments.status IN ('Paid', 'Refunded')
              )
            "#
        )
        .bind(at)
        .bind(at)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn apply_quote(&self, id: Uuid, quote: &Quote, discount_code: Option<&str>) -> Result<bool> {
        // Once a checkout is live its amount is fixed; only failed or
        // canceled attempts may be repriced.
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET total_amount_cents = ?,
                discount_amount_cents = ?,
                deposit_amount_cents = ?,
                rest_amount_cents = ?,
                discount_code = ?,
                updated_at = ?
            WHERE id = ?
              AND status = 'Pending'
              AND NOT EXISTS (
                  SELECT 1 FROM payments
                  WHERE payments.booking_id = bookings.id
                    AND payments.status NOT IN ('Failed', 'Canceled')
              )
            "#
        )
        .bind(quote.total_before_discount_cents)
        .bind(quote.discount_amount_cents)
        .bind(quote.deposit_amount_cents)
        .bind(quote.rest_amount_cents)
        .bind(discount_code)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn claim_notification(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET emails_sent_at = ?
            WHERE id = ? AND emails_sent_at IS NULL
            "#
        )
        .bind(at.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_notification_claim(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE bookings SET emails_sent_at = NULL WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_stale_pending(&self, created_before: DateTime<Utc>, limit: i64) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE status = 'Pending' AND created_at < ? ORDER BY created_at ASC LIMIT ?",
            BOOKING_COLUMNS
        ))
        .bind(created_before.naive_utc())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_booking)
            .collect()
    }
}
