//! Configuration loaded from environment variables.
//!
//! Every field has a default suitable for local development. `dotenvy` is
//! applied by the binary before any of these are read.

use std::str::FromStr;
use std::time::Duration;

use procura_pipeline::capability::ollama::{DEFAULT_MODEL, DEFAULT_URL};

/// A variable was set but could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Read `key`, falling back to `default` when unset.
fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    /// How long to wait for background tasks at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:4200`    |
    /// | `REQUEST_TIMEOUT_SECS` | `60`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:4200".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("PORT", 3000)?,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 60)?,
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Which extraction capability backs the Structured Extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Deterministic regex rules only.
    Rules,
    /// Ollama chat model, with the rules filling what it leaves out.
    Ollama,
}

impl FromStr for ExtractorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rules" => Ok(Self::Rules),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Extraction, evaluation and background-task settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub extractor: ExtractorKind,
    pub ollama_url: String,
    pub ollama_model: String,
    pub extraction_timeout: Duration,
    pub evaluation_timeout: Duration,
    /// Mailbox poll interval.
    pub email_check_interval: Duration,
    pub deadline_sweep_interval: Duration,
    pub outbox_interval: Duration,
    /// Parse proposals as soon as intake stores them.
    pub auto_parse: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorKind::Rules,
            ollama_url: DEFAULT_URL.to_string(),
            ollama_model: DEFAULT_MODEL.to_string(),
            extraction_timeout: Duration::from_secs(30),
            evaluation_timeout: Duration::from_secs(10),
            email_check_interval: Duration::from_secs(300),
            deadline_sweep_interval: Duration::from_secs(60),
            outbox_interval: Duration::from_secs(10),
            auto_parse: true,
        }
    }
}

impl PipelineConfig {
    /// | Env Var                        | Default                  |
    /// |--------------------------------|--------------------------|
    /// | `EXTRACTOR`                    | `rules`                  |
    /// | `OLLAMA_URL`                   | `http://localhost:11434` |
    /// | `OLLAMA_MODEL`                 | `tinyllama`              |
    /// | `EXTRACTION_TIMEOUT_SECS`      | `30`                     |
    /// | `EVALUATION_TIMEOUT_SECS`      | `10`                     |
    /// | `EMAIL_CHECK_INTERVAL_SECS`    | `300`                    |
    /// | `DEADLINE_SWEEP_INTERVAL_SECS` | `60`                     |
    /// | `OUTBOX_INTERVAL_SECS`         | `10`                     |
    /// | `AUTO_PARSE`                   | `true`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let secs = |key, default: Duration| env_or(key, default.as_secs()).map(Duration::from_secs);

        let extractor = match std::env::var("EXTRACTOR") {
            Ok(raw) => raw
                .parse()
                .map_err(|()| ConfigError::Invalid { key: "EXTRACTOR", value: raw })?,
            Err(_) => defaults.extractor,
        };

        Ok(Self {
            extractor,
            ollama_url: std::env::var("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: std::env::var("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            extraction_timeout: secs("EXTRACTION_TIMEOUT_SECS", defaults.extraction_timeout)?,
            evaluation_timeout: secs("EVALUATION_TIMEOUT_SECS", defaults.evaluation_timeout)?,
            email_check_interval: secs("EMAIL_CHECK_INTERVAL_SECS", defaults.email_check_interval)?,
            deadline_sweep_interval: secs(
                "DEADLINE_SWEEP_INTERVAL_SECS",
                defaults.deadline_sweep_interval,
            )?,
            outbox_interval: secs("OUTBOX_INTERVAL_SECS", defaults.outbox_interval)?,
            auto_parse: env_or("AUTO_PARSE", defaults.auto_parse)?,
        })
    }
}

/// Where entities are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    /// Process-local; everything is lost on restart.
    Memory,
}

impl StoreBackend {
    /// `STORE_BACKEND` is `postgres` (default, needs `DATABASE_URL`) or `memory`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".into());
        match raw.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" => std::env::var("DATABASE_URL")
                .map(|database_url| Self::Postgres { database_url })
                .map_err(|_| ConfigError::Missing("DATABASE_URL")),
            _ => Err(ConfigError::Invalid {
                key: "STORE_BACKEND",
                value: raw,
            }),
        }
    }
}
