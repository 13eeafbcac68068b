use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub streams: StreamsConfig,
    pub worker: WorkerConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamsConfig {
    pub request_stream: String,
    pub result_stream: String,
    pub group: String,
    pub consumer_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    #[serde(default = "default_consume_timeout_ms")]
    pub consume_timeout_ms: u64,
}

fn default_concurrency() -> usize {
    1
}

fn default_idle_backoff_ms() -> u64 {
    500
}

fn default_consume_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    pub base_url: String,
    pub token: String,
    #[serde(default)]
    pub marker: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of FAREFEED)
            // Eg.. `FAREFEED__SERVER__PORT=9000` would set the server port
            .add_source(config::Environment::with_prefix("FAREFEED").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
