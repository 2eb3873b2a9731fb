use chrono::{Duration, NaiveTime, Utc};
use clap::Parser;
use fake::{
    faker::{company::en::CompanyName, internet::en::SafeEmail},
    Fake,
};
use slotpay::{
    domain::{CreatePartnerRequest, CreateSlotRequest, PartnerRates},
    repository::{PartnerRepository, SlotRepository, SqlitePartnerRepository, SqliteSlotRepository},
};
use sqlx::sqlite::SqlitePoolOptions;

/// Populate a database with demo partners, slots and discount codes.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Database URL; falls back to DATABASE_URL, then a local file.
    #[arg(long)]
    database_url: Option<String>,

    /// Number of partners to create.
    #[arg(long, default_value_t = 2)]
    partners: usize,

    /// Days of slots to create per partner, starting tomorrow.
    #[arg(long, default_value_t = 7)]
    days: i64,

    /// Leave every other slot as a draft.
    #[arg(long)]
    with_drafts: bool,
}

const SLOT_HOURS: [u32; 4] = [10, 14, 18, 20];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://slotpay.db?mode=rwc".to_string());

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let partner_repo = SqlitePartnerRepository::new(db_pool.clone());
    let slot_repo = SqliteSlotRepository::new(db_pool.clone());

    println!("🏢 Creating partners...");
    let mut partners = Vec::new();
    for i in 0..args.partners {
        let name: String = CompanyName().fake();
        let slug = format!(
            "{}-{}",
            name.to_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                .collect::<String>()
                .trim_matches('-'),
            i + 1
        );

        let partner = partner_repo.create(CreatePartnerRequest {
            slug,
            name,
            currency: "EUR".to_string(),
            rates: PartnerRates {
                single_cents: 4500,
                group_per_person_cents: 3500,
            },
            fee_percent: 20,
            notification_email: Some(SafeEmail().fake()),
        }).await?;

        println!("  ✅ {} ({})", partner.name, partner.slug);
        partners.push(partner);
    }

    println!("📅 Creating slots...");
    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    let mut slot_count = 0;
    for partner in &partners {
        for day in 0..args.days {
            for (index, hour) in SLOT_HOURS.iter().enumerate() {
                let Some(time) = NaiveTime::from_hms_opt(*hour, 0, 0) else {
                    continue;
                };
                let start = (tomorrow + Duration::days(day)).and_time(time).and_utc();

                slot_repo.create(partner.id, CreateSlotRequest {
                    start_time: start,
                    end_time: start + Duration::minutes(90),
                    capacity: 1,
                    max_participants: 6,
                    publish: !(args.with_drafts && index % 2 == 1),
                }).await?;
                slot_count += 1;
            }
        }
    }
    println!("  ✅ Created {} slots", slot_count);

    println!("🏷️  Creating discount codes...");
    let codes = [
        ("WELCOME10", "Percent", 10, None),
        ("FIVEOFF", "Fixed", 500, None),
        ("HALFPRICE", "Percent", 50, partners.first().map(|p| p.id.to_string())),
    ];
    let code_count = codes.len();
    for (code, kind, value, partner_id) in codes {
        sqlx::query(
            r#"
            INSERT INTO discount_codes (code, kind, value, active, partner_id, valid_until)
            VALUES (?, ?, ?, 1, ?, NULL)
            ON CONFLICT(code) DO NOTHING
            "#
        )
        .bind(code)
        .bind(kind)
        .bind(value)
        .bind(partner_id)
        .execute(&db_pool)
        .await?;
    }
    println!("  ✅ Created {} discount codes (HALFPRICE is capped by the discount limit)", code_count);

    println!("🎉 Seeding complete");
    Ok(())
}
