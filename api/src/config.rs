//! Environment-driven configuration.
//!
//! Every setting has a default except `DATABASE_URL`; see `Config::from_lookup`
//! for the full list. Malformed values fail startup with the variable name.

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}='{value}' is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Agent-service app names behind each agent-backed endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentApps {
    pub nutrition: String,
    pub weather: String,
    pub conversation: String,
}

#[derive(Debug, Clone)]
pub struct AdkConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub apps: AgentApps,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` means the process runs without persistence (only allowed when
    /// `fail_fast` is off).
    pub url: Option<String>,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    /// Exit at startup when the database is missing or unreachable
    pub fail_fast: bool,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub adk: AdkConfig,
    pub database: DatabaseConfig,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let string = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database = DatabaseConfig {
            url: get("DATABASE_URL"),
            min_connections: parse(&get, "DB_MIN_CONNECTIONS", 5)?,
            max_connections: parse(&get, "DB_MAX_CONNECTIONS", 25)?,
            acquire_timeout: Duration::from_secs(parse(&get, "DB_ACQUIRE_TIMEOUT_SECS", 30)?),
            idle_timeout: Duration::from_secs(parse(&get, "DB_IDLE_TIMEOUT_SECS", 600)?),
            max_lifetime: Duration::from_secs(parse(&get, "DB_MAX_LIFETIME_SECS", 1800)?),
            fail_fast: parse_bool(&get, "DB_FAIL_FAST", true)?,
            run_migrations: parse_bool(&get, "DB_RUN_MIGRATIONS", true)?,
        };

        if database.max_connections == 0 || database.min_connections > database.max_connections {
            return Err(ConfigError::Invalid {
                key: "DB_MIN_CONNECTIONS",
                value: database.min_connections.to_string(),
                reason: format!(
                    "must not exceed DB_MAX_CONNECTIONS ({}), which must be positive",
                    database.max_connections
                ),
            });
        }

        let adk = AdkConfig {
            base_url: string("ADK_SERVER_URL", "http://localhost:8080/api"),
            timeout: Duration::from_secs(parse(&get, "ADK_REQUEST_TIMEOUT_SECS", 60)?),
            apps: AgentApps {
                nutrition: string("AGENT_APP_NUTRITION", "macro_estimator"),
                weather: string("AGENT_APP_WEATHER", "hello_time_agent"),
                conversation: string("AGENT_APP_CONVERSATION", "echo_agent"),
            },
        };

        let cors_origins = string("CORS_ORIGINS", "http://localhost:8081")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            port: parse(&get, "PORT", 8888)?,
            adk,
            database,
            cors_origins,
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected true or false".to_string(),
            }),
        },
    }
}
