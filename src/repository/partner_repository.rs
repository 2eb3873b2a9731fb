use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{CreatePartnerRequest, Partner, PartnerRates},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, PartnerRepository},
};

#[derive(FromRow)]
struct PartnerRow {
    id: String,
    slug: String,
    name: String,
    currency: String,
    price_single_cents: i64,
    price_group_per_person_cents: i64,
    fee_percent: i64,
    notification_email: Option<String>,
    created_at: NaiveDateTime,
}

pub struct SqlitePartnerRepository {
    pool: SqlitePool,
}

impl SqlitePartnerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_partner(row: PartnerRow) -> Result<Partner> {
        Ok(Partner {
            id: parse_uuid(&row.id)?,
            slug: row.slug,
            name: row.name,
            currency: row.currency,
            rates: PartnerRates {
                single_cents: row.price_single_cents,
                group_per_person_cents: row.price_group_per_person_cents,
            },
            fee_percent: row.fee_percent,
            notification_email: row.notification_email,
            created_at: to_utc(row.created_at),
        })
    }
}

#[async_trait]
impl PartnerRepository for SqlitePartnerRepository {
    async fn create(&self, request: CreatePartnerRequest) -> Result<Partner> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO partners (
                id, slug, name, currency, price_single_cents,
                price_group_per_person_cents, fee_percent, notification_email, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.slug)
        .bind(&request.name)
        .bind(request.currency.to_uppercase())
        .bind(request.rates.single_cents)
        .bind(request.rates.group_per_person_cents)
        .bind(request.fee_percent)
        .bind(&request.notification_email)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created partner".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Partner>> {
        let row = sqlx::query_as::<_, PartnerRow>(
            r#"
            SELECT id, slug, name, currency, price_single_cents,
                   price_group_per_person_cents, fee_percent, notification_email, created_at
            FROM partners
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_partner).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Partner>> {
        let row = sqlx::query_as::<_, PartnerRow>(
            r#"
            SELECT id, slug, name, currency, price_single_cents,
                   price_group_per_person_cents, fee_percent, notification_email, created_at
            FROM partners
            WHERE slug = ?
            "#
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_partner).transpose()
    }
}
