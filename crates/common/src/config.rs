use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string
    pub redis_url: String,

    /// Push gateway send endpoint
    pub push_gateway_url: String,

    /// Push gateway receipt endpoint
    pub push_receipt_url: String,

    /// Per-request timeout for gateway calls, in seconds (default: 10)
    pub push_timeout_secs: u64,

    /// Maximum accepted non-exempt sends per user per local day (default: 6)
    pub daily_cap_max: u32,

    /// Cron cadence for the category processors, in seconds (default: 3600)
    pub scheduler_tick_secs: u64,

    /// Cadence for receipt reconciliation, in seconds (default: 300)
    pub receipt_tick_secs: u64,

    /// How far back to look for unresolved tickets, in hours (default: 24)
    pub receipt_lookback_hours: i64,

    /// Minimum age before a ticket is polled, in minutes (default: 15)
    pub receipt_min_age_mins: i64,

    /// Fallback IANA timezone for users with a missing or malformed preference
    pub default_timezone: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            push_gateway_url: std::env::var("PUSH_GATEWAY_URL")
                .unwrap_or_else(|_| "https://push.pickpulse.app/api/v2/send".to_string()),
            push_receipt_url: std::env::var("PUSH_RECEIPT_URL")
                .unwrap_or_else(|_| "https://push.pickpulse.app/api/v2/receipts".to_string()),
            push_timeout_secs: std::env::var("PUSH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PUSH_TIMEOUT_SECS must be a valid u64"))?,
            daily_cap_max: std::env::var("DAILY_CAP_MAX")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DAILY_CAP_MAX must be a valid u32"))?,
            scheduler_tick_secs: std::env::var("SCHEDULER_TICK_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SCHEDULER_TICK_SECS must be a valid u64"))?,
            receipt_tick_secs: std::env::var("RECEIPT_TICK_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RECEIPT_TICK_SECS must be a valid u64"))?,
            receipt_lookback_hours: std::env::var("RECEIPT_LOOKBACK_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RECEIPT_LOOKBACK_HOURS must be a valid i64"))?,
            receipt_min_age_mins: std::env::var("RECEIPT_MIN_AGE_MINS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RECEIPT_MIN_AGE_MINS must be a valid i64"))?,
            default_timezone: std::env::var("DEFAULT_TIMEZONE")
                .unwrap_or_else(|_| "America/New_York".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}
