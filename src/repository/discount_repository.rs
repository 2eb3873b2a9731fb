use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, SqlitePool};

use crate::{
    domain::{Discount, DiscountCode},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, DiscountCodeRepository},
};

#[derive(FromRow)]
struct DiscountCodeRow {
    code: String,
    kind: String,
    value: i64,
    active: i64,
    partner_id: Option<String>,
    valid_until: Option<NaiveDateTime>,
}

/// Read-only lookup; codes are managed outside this service.
pub struct SqliteDiscountCodeRepository {
    pool: SqlitePool,
}

impl SqliteDiscountCodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_code(row: DiscountCodeRow) -> Result<DiscountCode> {
        let discount = match row.kind.as_str() {
            "Percent" => Discount::Percent(row.value),
            "Fixed" => Discount::Fixed(row.value),
            other => return Err(AppError::Database(format!("Invalid discount kind: {}", other))),
        };

        Ok(DiscountCode {
            code: row.code,
            discount,
            active: row.active != 0,
            partner_id: row.partner_id.as_deref().map(parse_uuid).transpose()?,
            valid_until: row.valid_until.map(to_utc),
        })
    }
}

#[async_trait]
impl DiscountCodeRepository for SqliteDiscountCodeRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>> {
        let row = sqlx::query_as::<_, DiscountCodeRow>(
            r#"
            SELECT code, kind, value, active, partner_id, valid_until
            FROM discount_codes
            WHERE code = ?
            "#
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_code).transpose()
    }
}
