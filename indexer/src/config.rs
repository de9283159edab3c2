//! Configuration management for the indexer.
//!
//! Loads configuration from environment variables with sensible defaults. Call
//! `dotenvy::dotenv()` first to pick up a local `.env` file.

use equipment_search_postgres::{DEFAULT_MAX_CONNECTIONS, DEFAULT_PAGE_SIZE, DEFAULT_SCHEMA};
use equipment_search_projections::ShutdownPolicy;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, multi-field lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Event store configuration.
#[derive(Debug, Clone)]
pub struct EventStoreConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Schema holding `mt_events`
    pub schema: String,
    /// Rows fetched per query
    pub page_size: u32,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

/// Typesense configuration.
#[derive(Clone)]
pub struct TypesenseConfig {
    /// Host name
    pub host: String,
    /// Port
    pub port: u16,
    /// `http` or `https`
    pub protocol: String,
    /// API key
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for TypesenseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypesenseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Indexer configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Event store (read side of the equipment service)
    pub event_store: EventStoreConfig,
    /// Search engine
    pub typesense: TypesenseConfig,
    /// Stable alias clients query
    pub alias: String,
    /// Names of the specifications whose equipment is searchable
    pub specification_names: Vec<String>,
    /// Delay between catch-up polls
    pub poll_interval: Duration,
    /// What happens to the collection on shutdown
    pub shutdown_policy: ShutdownPolicy,
    /// Liveness marker file
    pub health_file: PathBuf,
    /// Log output format
    pub log_format: LogFormat,
    /// Prometheus listener address, disabled when `None`
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a variable if set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        Ok(Self {
            event_store: EventStoreConfig {
                url: vars.required("CONNECTIONSTRING")?,
                schema: vars.string("EVENT_STORE_SCHEMA", DEFAULT_SCHEMA),
                page_size: vars.positive("EVENT_STORE_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
                max_connections: vars
                    .positive("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            },
            typesense: TypesenseConfig {
                host: vars.string("TYPESENSE_HOST", "localhost"),
                port: vars.parsed("TYPESENSE_PORT", 8108)?,
                protocol: vars.string("TYPESENSE_PROTOCOL", "http"),
                api_key: vars.required("TYPESENSE_APIKEY")?,
                timeout: Duration::from_secs(vars.parsed("TYPESENSE_TIMEOUT_SECS", 30)?),
            },
            alias: vars.string("COLLECTION_ALIAS_NAME", "equipments"),
            specification_names: vars.specification_names()?,
            poll_interval: Duration::from_millis(vars.positive("CATCHUP_POLL_INTERVAL_MS", 1000)?),
            shutdown_policy: vars.shutdown_policy()?,
            health_file: PathBuf::from(vars.string("HEALTH_FILE", "/tmp/healthy")),
            log_format: vars.log_format()?,
            metrics_addr: vars.optional_parsed("METRICS_ADDR")?,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank, trimmed.
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn optional_parsed<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|value| {
                value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                    name,
                    reason: format!("{value:?}: {e}"),
                })
            })
            .transpose()
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.optional_parsed(name)?.unwrap_or(default))
    }

    /// Like [`Self::parsed`], but zero is rejected.
    fn positive<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + Default + PartialEq,
        T::Err: std::fmt::Display,
    {
        let value = self.parsed(name, default)?;
        if value == T::default() {
            return Err(ConfigError::Invalid {
                name,
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    }

    fn specification_names(&self) -> Result<Vec<String>, ConfigError> {
        const NAME: &str = "SPECIFICATION_NAMES";
        self.get(NAME).map_or_else(
            || Ok(Vec::new()),
            |value| {
                serde_json::from_str(&value).map_err(|e| ConfigError::Invalid {
                    name: NAME,
                    reason: format!("expected a JSON array of strings: {e}"),
                })
            },
        )
    }

    fn shutdown_policy(&self) -> Result<ShutdownPolicy, ConfigError> {
        const NAME: &str = "SHUTDOWN_POLICY";
        match self.get(NAME).map(|value| value.to_ascii_lowercase()).as_deref() {
            None | Some("retain") => Ok(ShutdownPolicy::RetainCollection),
            Some("delete") => Ok(ShutdownPolicy::DeleteCollection),
            Some(other) => Err(ConfigError::Invalid {
                name: NAME,
                reason: format!("expected retain or delete, got {other:?}"),
            }),
        }
    }

    fn log_format(&self) -> Result<LogFormat, ConfigError> {
        const NAME: &str = "LOG_FORMAT";
        match self.get(NAME).map(|value| value.to_ascii_lowercase()).as_deref() {
            None | Some("pretty") => Ok(LogFormat::Pretty),
            Some("json") => Ok(LogFormat::Json),
            Some(other) => Err(ConfigError::Invalid {
                name: NAME,
                reason: format!("expected pretty or json, got {other:?}"),
            }),
        }
    }
}
