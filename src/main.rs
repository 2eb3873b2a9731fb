use std::sync::Arc;
use std::time::Duration;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slotpay::{
    api,
    config::Settings,
    notifications::{LogMailer, Mailer, SmtpMailer},
    payments::{PaymentProvider, SandboxProvider, StripeProvider},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotpay=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting slotpay on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let provider: Arc<dyn PaymentProvider> = match (settings.stripe.enabled, settings.stripe.secret_key.clone()) {
        (true, Some(api_key)) => {
            tracing::info!("Stripe payment processing enabled");
            Arc::new(StripeProvider::new(
                api_key,
                Duration::from_secs(settings.payments.timeout_secs),
            ))
        }
        (true, None) => {
            anyhow::bail!("stripe.enabled is set but stripe.secret_key is missing");
        }
        (false, _) => {
            tracing::warn!("Stripe disabled, using the in-process sandbox provider");
            Arc::new(SandboxProvider::new())
        }
    };

    let mailer: Arc<dyn Mailer> = if settings.email.enabled {
        Arc::new(SmtpMailer::new(&settings.email)?)
    } else {
        tracing::info!("Email delivery disabled, confirmations are logged only");
        Arc::new(LogMailer)
    };
    tracing::info!("Using {} provider and {} mailer", provider.name(), mailer.name());

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        provider,
        mailer,
        &settings,
    ));

    if let Some(interval_secs) = settings.reconciler.sweep_interval_secs {
        let reconciler = service_context.reconciler.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                interval.tick().await;
                if let Err(e) = reconciler.sweep_stale_pending().await {
                    tracing::error!("Stale-pending sweep failed: {}", e);
                }
            }
        });
        tracing::info!("Stale-pending sweep every {}s", interval_secs);
    }

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
