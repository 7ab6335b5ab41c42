use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// Absent: rides and bookings live in process memory.
    pub database: Option<DatabaseConfig>,
    /// Absent: no rate limiting.
    pub redis: Option<RedisConfig>,
    /// Absent: notifications are only logged.
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    pub max_cas_attempts: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self { max_cas_attempts: 64 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub topic: String,
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            topic: "ridepool.notifications".to_string(),
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_seconds: 60,
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `RIDEPOOL__SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("RIDEPOOL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
