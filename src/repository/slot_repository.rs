use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateSlotRequest, Slot, SlotStatus},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, SlotRepository},
};

#[derive(FromRow)]
struct SlotRow {
    id: String,
    partner_id: String,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    status: String,
    capacity: i64,
    max_participants: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteSlotRepository {
    pool: SqlitePool,
}

impl SqliteSlotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_slot(row: SlotRow) -> Result<Slot> {
        Ok(Slot {
            id: parse_uuid(&row.id)?,
            partner_id: parse_uuid(&row.partner_id)?,
            start_time: to_utc(row.start_time),
            end_time: to_utc(row.end_time),
            status: Self::parse_slot_status(&row.status)?,
            capacity: row.capacity,
            max_participants: row.max_participants,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn parse_slot_status(s: &str) -> Result<SlotStatus> {
        match s {
            "Draft" => Ok(SlotStatus::Draft),
            "Published" => Ok(SlotStatus::Published),
            "Booked" => Ok(SlotStatus::Booked),
            _ => Err(AppError::Database(format!("Invalid slot status: {}", s))),
        }
    }

    fn slot_status_to_str(status: SlotStatus) -> &'static str {
        match status {
            SlotStatus::Draft => "Draft",
            SlotStatus::Published => "Published",
            SlotStatus::Booked => "Booked",
        }
    }
}

#[async_trait]
impl SlotRepository for SqliteSlotRepository {
    async fn create(&self, partner_id: Uuid, request: CreateSlotRequest) -> Result<Slot> {
        if request.end_time <= request.start_time {
            return Err(AppError::Validation("Slot must end after it starts".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let status = if request.publish { SlotStatus::Published } else { SlotStatus::Draft };

        sqlx::query(
            r#"
            INSERT INTO slots (
                id, partner_id, start_time, end_time, status,
                capacity, max_participants, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(partner_id.to_string())
        .bind(request.start_time.naive_utc())
        .bind(request.end_time.naive_utc())
        .bind(Self::slot_status_to_str(status))
        .bind(request.capacity)
        .bind(request.max_participants)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created slot".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Slot>> {
        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT id, partner_id, start_time, end_time, status,
                   capacity, max_participants, created_at, updated_at
            FROM slots
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_slot).transpose()
    }

    async fn find_by_partner_and_start(&self, partner_id: Uuid, start: DateTime<Utc>) -> Result<Option<Slot>> {
        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT id, partner_id, start_time, end_time, status,
                   capacity, max_participants, created_at, updated_at
            FROM slots
            WHERE partner_id = ? AND start_time = ?
            ORDER BY created_at ASC
            LIMIT 1
            "#
        )
        .bind(partner_id.to_string())
        .bind(start.naive_utc())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_slot).transpose()
    }

    async fn list_by_partner(&self, partner_id: Uuid) -> Result<Vec<Slot>> {
        let rows = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT id, partner_id, start_time, end_time, status,
                   capacity, max_participants, created_at, updated_at
            FROM slots
            WHERE partner_id = ?
            ORDER BY start_time ASC
            "#
        )
        .bind(partner_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_slot)
            .collect()
    }

    async fn publish(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE slots
            SET status = 'Published', updated_at = ?
            WHERE id = ? AND status = 'Draft'
            "#
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_unreferenced(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM slots
            WHERE id = ?
              AND status IN ('Draft', 'Published')
              AND NOT EXISTS (SELECT 1 FROM bookings WHERE bookings.slot_id = slots.id)
            "#
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_booked(&self, conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE slots
            SET status = 'Booked', updated_at = ?
            WHERE id = ? AND status = 'Published'
            "#
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE slots
            SET status = 'Published', updated_at = ?
            WHERE id = ?
              AND status = 'Booked'
              AND NOT EXISTS (
                  SELECT 1 FROM bookings
                  WHERE bookings.slot_id = slots.id AND bookings.status <> 'Cancelled'
              )
            "#
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
