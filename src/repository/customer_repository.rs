use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Customer, CustomerInfo},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, CustomerRepository},
};

#[derive(FromRow)]
struct CustomerRow {
    id: String,
    email: String,
    full_name: String,
    phone: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteCustomerRepository {
    pool: SqlitePool,
}

impl SqliteCustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_customer(row: CustomerRow) -> Result<Customer> {
        Ok(Customer {
            id: parse_uuid(&row.id)?,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }
}

#[async_trait]
impl CustomerRepository for SqliteCustomerRepository {
    async fn upsert(&self, conn: &mut SqliteConnection, info: &CustomerInfo) -> Result<Customer> {
        let email = info.normalized_email();
        let now = Utc::now().naive_utc();

        // The email uniqueness constraint settles concurrent first bookings
        // by the same customer; the loser simply updates the contact details.
        sqlx::query(
            r#"
            INSERT INTO customers (id, email, full_name, phone, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (email) DO UPDATE SET
                full_name = excluded.full_name,
                phone = COALESCE(excluded.phone, customers.phone),
                updated_at = excluded.updated_at
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&email)
        .bind(info.full_name.trim())
        .bind(&info.phone)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, email, full_name, phone, created_at, updated_at
            FROM customers
            WHERE email = ?
            "#
        )
        .bind(&email)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::Database("Failed to retrieve upserted customer".to_string()))?;

        Self::row_to_customer(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, email, full_name, phone, created_at, updated_at
            FROM customers
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_customer).transpose()
    }
}
