//! Handles settings for the application. Configuration is written in
//! `settings.toml`; any key can be overridden with an `APP__`-prefixed
//! environment variable, e.g. `APP__SERVER__PORT=8080`.
use config::{Config, ConfigError, Environment, File};
use engine::RetryPolicy;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

/// Where records live.
///
/// ```toml
/// database = "memory"
/// database = { sqlite = "./isa.db" }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

/// Bounds for the engine's internal retries.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for Engine {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_backoff_ms: policy.base_backoff_ms,
            max_backoff_ms: policy.max_backoff_ms,
        }
    }
}

impl Engine {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_backoff_ms, self.max_backoff_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Option<Server>,
    #[serde(default)]
    pub engine: Engine,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
