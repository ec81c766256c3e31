use crate::utils::error::{RelayError, RelayResult};
use crate::utils::logger::{LogConfig, LogLevel};
use config::{Config as RawConfig, Environment, File, FileFormat};
use dotenv::dotenv;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix of the environment variables read by [`Config::new`], e.g. `NOAALERT__TOPIC`.
pub const ENV_PREFIX: &str = "NOAALERT";

fn default_topic() -> String {
    "noaa-alerts".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_base_url() -> String {
    "https://api.weather.gov".to_string()
}

fn default_user_agent() -> String {
    "(noaa-alert-relay, alerts@example.com)".to_string()
}

fn human_readable_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let duration_str: String = Deserialize::deserialize(deserializer)?;
    humantime::parse_duration(&duration_str).map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

/// Credentials and location of the event-stream platform.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EnsignConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub auth_url: Option<String>,
}

/// One setting used when connecting to the event-stream platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOption {
    Credentials {
        client_id: String,
        client_secret: String,
    },
    Endpoint(String),
    AuthUrl(String),
}

impl EnsignConfig {
    /// Connection options: credentials always, endpoint and auth URL only when set.
    pub fn options(&self) -> Vec<ConnectionOption> {
        let mut opts = Vec::with_capacity(3);
        opts.push(ConnectionOption::Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        });

        if let Some(endpoint) = self.endpoint.as_ref().filter(|e| !e.is_empty()) {
            opts.push(ConnectionOption::Endpoint(endpoint.clone()));
        }

        if let Some(auth_url) = self.auth_url.as_ref().filter(|u| !u.is_empty()) {
            opts.push(ConnectionOption::AuthUrl(auth_url.clone()));
        }
        opts
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub ensure_topic_exists: bool,
    #[serde(
        default = "default_interval",
        deserialize_with = "human_readable_duration"
    )]
    pub interval: Duration,
    #[serde(
        default = "default_fetch_timeout",
        deserialize_with = "human_readable_duration"
    )]
    pub fetch_timeout: Duration,
    #[serde(default)]
    pub console_log: bool,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub ensign: EnsignConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            ensure_topic_exists: false,
            interval: default_interval(),
            fetch_timeout: default_fetch_timeout(),
            console_log: false,
            log_level: LogLevel::default(),
            weather: WeatherConfig::default(),
            ensign: EnsignConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from an optional file and environment variables.
    pub fn new(config_path: Option<PathBuf>) -> RelayResult<Self> {
        dotenv().ok();

        let mut builder = RawConfig::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let raw = builder
            .build()
            .map_err(|e| RelayError::ConfigError(e.to_string()))?;
        let cfg: Config = raw
            .try_deserialize()
            .map_err(|e| RelayError::ConfigError(e.to_string()))?;

        Ok(cfg)
    }

    pub fn validate(&self) -> RelayResult<()> {
        if self.interval.is_zero() {
            return Err(RelayError::ConfigError(
                "interval must be greater than 0".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(RelayError::ConfigError(
                "fetch_timeout must be greater than 0".to_string(),
            ));
        }
        if self.topic.trim().is_empty() {
            return Err(RelayError::ConfigError("topic is required".to_string()));
        }
        if self.ensign.client_id.is_empty() || self.ensign.client_secret.is_empty() {
            return Err(RelayError::ConfigError(
                "ensign.client_id and ensign.client_secret are required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            console: self.console_log,
        }
    }

    /// Key/value view of the effective configuration with the client secret masked.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let secret = if self.ensign.client_secret.is_empty() {
            String::new()
        } else {
            "********".to_string()
        };

        vec![
            ("topic", self.topic.clone()),
            ("ensure_topic_exists", self.ensure_topic_exists.to_string()),
            ("interval", humantime::format_duration(self.interval).to_string()),
            (
                "fetch_timeout",
                humantime::format_duration(self.fetch_timeout).to_string(),
            ),
            ("console_log", self.console_log.to_string()),
            ("log_level", self.log_level.to_string()),
            ("weather.base_url", self.weather.base_url.clone()),
            ("weather.user_agent", self.weather.user_agent.clone()),
            ("ensign.client_id", self.ensign.client_id.clone()),
            ("ensign.client_secret", secret),
            (
                "ensign.endpoint",
                self.ensign.endpoint.clone().unwrap_or_default(),
            ),
            (
                "ensign.auth_url",
                self.ensign.auth_url.clone().unwrap_or_default(),
            ),
        ]
    }
}
