use curbside_core::{CoreResult, ParkingSpot, SpotId};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Without a database section everything runs against the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub kafka: Option<KafkaConfig>,
    pub cron: Option<CronConfig>,
    #[serde(default)]
    pub seed_spots: Vec<SeedSpot>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Frontend origin allowed by CORS. Any origin when unset.
    pub allowed_origin: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub audience: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { interval_seconds: default_sweep_interval() }
    }
}

fn default_sweep_interval() -> u64 { 60 }

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { channel_capacity: default_channel_capacity() }
    }
}

fn default_channel_capacity() -> usize { 100 }

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String { "parking.spots.changed".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct CronConfig {
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedSpot {
    pub id: SpotId,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub booking_price_per_hour: f64,
}

impl SeedSpot {
    pub fn to_spot(&self) -> CoreResult<ParkingSpot> {
        ParkingSpot::new(self.id, self.name.clone(), self.lat, self.lng, self.booking_price_per_hour)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CURBSIDE_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("CURBSIDE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn seed(&self) -> CoreResult<Vec<ParkingSpot>> {
        self.seed_spots.iter().map(SeedSpot::to_spot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"
            [server]
            port = 3001

            [auth]
            jwt_secret = "secret"
            "#,
        );

        assert_eq!(config.sweeper.interval(), Duration::from_secs(60));
        assert_eq!(config.notifications.channel_capacity, 100);
        assert!(config.database.is_none());
        assert!(config.kafka.is_none());
        assert!(config.cron.is_none());
        assert!(config.seed().unwrap().is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            [server]
            port = 8080
            allowed_origin = "http://localhost:5173"

            [auth]
            jwt_secret = "secret"
            audience = "authenticated"

            [sweeper]
            interval_seconds = 15

            [database]
            url = "postgres://localhost/curbside"

            [kafka]
            brokers = "localhost:9092"

            [cron]
            secret = "cron-secret"

            [[seed_spots]]
            id = 1
            name = "MG Road"
            lat = 12.9756
            lng = 77.6050
            booking_price_per_hour = 50.0
            "#,
        );

        assert_eq!(config.sweeper.interval(), Duration::from_secs(15));
        assert_eq!(config.database.unwrap().max_connections, 5);
        assert_eq!(config.kafka.unwrap().topic, "parking.spots.changed");
        assert_eq!(config.cron.unwrap().secret, "cron-secret");

        let spots = config.seed_spots.iter().map(|s| s.to_spot().unwrap()).collect::<Vec<_>>();
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].name, "MG Road");
        assert!(spots[0].booking.is_none());
    }

    #[test]
    fn test_seed_with_negative_price_fails() {
        let seed = SeedSpot {
            id: 4,
            name: "Broken".to_string(),
            lat: 0.0,
            lng: 0.0,
            booking_price_per_hour: -5.0,
        };
        assert!(seed.to_spot().is_err());
    }
}
