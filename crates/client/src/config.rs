use persistence::DatabaseConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Page sizes and housekeeping for feed and room views.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_room_page_size")]
    pub room_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// How often open views drop rows that expired while displayed. 0 disables the sweep.
    #[serde(default = "default_expiry_sweep_secs")]
    pub expiry_sweep_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_realtime_enabled")]
    pub enabled: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            room_page_size: default_room_page_size(),
            max_page_size: default_max_page_size(),
            expiry_sweep_secs: default_expiry_sweep_secs(),
        }
    }
}

impl FeedConfig {
    pub fn expiry_sweep(&self) -> Option<Duration> {
        (self.expiry_sweep_secs > 0).then(|| Duration::from_secs(self.expiry_sweep_secs))
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: default_realtime_enabled(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_room_page_size() -> u32 {
    50
}

fn default_max_page_size() -> u32 {
    100
}

fn default_expiry_sweep_secs() -> u64 {
    30
}

fn default_realtime_enabled() -> bool {
    true
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. .env file, if present, into the process environment
    /// 2. config/default.toml - base configuration with defaults
    /// 3. config/local.toml - local overrides (optional, not in git)
    /// 4. Environment variables with INVITE__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("INVITE").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration from embedded defaults plus `overrides`.
    ///
    /// Does not read config files or the environment and does not validate, so
    /// tests can build configs that `validate` would reject.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [database]
            url = ""
            max_connections = 10
            min_connections = 1
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [feed]
            page_size = 20
            room_page_size = 50
            max_page_size = 100
            expiry_sweep_secs = 30

            [realtime]
            enabled = true
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "INVITE__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        for (name, size) in [
            ("page_size", self.feed.page_size),
            ("room_page_size", self.feed.room_page_size),
        ] {
            if size == 0 {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "feed.{} must be at least 1",
                    name
                )));
            }
            if size > self.feed.max_page_size {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "feed.{} cannot exceed feed.max_page_size ({})",
                    name, self.feed.max_page_size
                )));
            }
        }

        Ok(())
    }
}
