use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub pricing: PricingPolicy,
    #[serde(default)]
    pub refund_policy: RefundPolicy,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from_address: "bookings@slotpay.local".to_string(),
        }
    }
}

/// Outbound payment-provider call behaviour.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PaymentsConfig {
    pub timeout_secs: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// Price calculation policy. Surcharges stack additively.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PricingPolicy {
    pub weekend_surcharge_percent: i64,
    pub evening_surcharge_percent: i64,
    /// Local hour (0-23) from which a start counts as "evening".
    pub evening_start_hour: u32,
    pub discount_cap_percent: i64,
    /// Offset of partner-local wall time from UTC, used for weekend/evening checks.
    pub utc_offset_minutes: i32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            weekend_surcharge_percent: 15,
            evening_surcharge_percent: 10,
            evening_start_hour: 18,
            discount_cap_percent: 20,
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RefundPolicy {
    /// Issue refunds automatically when a booking is cancelled.
    pub enabled: bool,
    /// Refunds are allowed until this many hours before the slot starts.
    pub cutoff_hours: i64,
    /// Local vs. provider refunded totals differing by more than this are flagged.
    pub drift_alert_cents: i64,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            cutoff_hours: 0,
            drift_alert_cents: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Free the slot when the provider reports canceled/expired and nothing was paid.
    pub release_on_unpaid_terminal: bool,
    /// Run the stale-pending sweep this often. Disabled when unset.
    pub sweep_interval_secs: Option<u64>,
    pub pending_timeout_minutes: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            release_on_unpaid_terminal: true,
            sweep_interval_secs: None,
            pending_timeout_minutes: 30,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://slotpay.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("stripe.enabled", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with SLOTPAY__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("SLOTPAY").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://slotpay.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            stripe: StripeConfig {
                secret_key: None,
                enabled: false,
            },
            email: EmailConfig::default(),
            payments: PaymentsConfig::default(),
            pricing: PricingPolicy::default(),
            refund_policy: RefundPolicy::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}
