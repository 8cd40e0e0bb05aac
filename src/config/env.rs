//! Process configuration read from the environment once at startup.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::Invalid {
                key: "ENVIRONMENT",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub environment: Environment,
    pub api_version: String,
    /// Prefix stripped from request paths before routing, e.g. "/api/v1".
    pub base_path: String,
    /// Allowed CORS origins; "*" mirrors any origin.
    pub cors_allowed_origins: Vec<String>,
    pub bind_addr: String,
    pub max_body_bytes: usize,
    pub maintenance_mode: bool,
    /// Requests per client per minute; 0 disables limiting.
    pub rate_limit_per_minute: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_url: "postgres://localhost/sql_rest".into(),
            db_max_connections: 5,
            environment: Environment::Development,
            api_version: "v1".into(),
            base_path: "/api/v1".into(),
            cors_allowed_origins: vec!["*".into()],
            bind_addr: "0.0.0.0:3000".into(),
            max_body_bytes: 1_000_000,
            maintenance_mode: false,
            rate_limit_per_minute: 0,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Build from an explicit variable map. Unset keys take their defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |k: &str| vars.get(k).map(|s| s.trim()).filter(|s| !s.is_empty());
        let defaults = AppConfig::default();

        let database_url = match get("DATABASE_URL") {
            Some(url) => url.to_string(),
            None => match get("DB_NAME") {
                Some(name) => format!(
                    "postgres://{}:{}@{}:{}/{}",
                    get("DB_USER").unwrap_or("postgres"),
                    get("DB_PASS").unwrap_or(""),
                    get("DB_HOST").unwrap_or("localhost"),
                    parse_or("DB_PORT", get("DB_PORT"), 5432u16)?,
                    name
                ),
                None => defaults.database_url,
            },
        };

        let environment = match get("ENVIRONMENT") {
            Some(s) => s.parse()?,
            None => defaults.environment,
        };
        let api_version = get("API_VERSION").unwrap_or("v1").to_string();
        let base_path = get("API_BASE_PATH")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("/api/{}", api_version));
        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_allowed_origins);

        Ok(AppConfig {
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), defaults.db_max_connections)?,
            environment,
            api_version,
            base_path,
            cors_allowed_origins,
            bind_addr: get("BIND_ADDR").map(str::to_string).unwrap_or(defaults.bind_addr),
            max_body_bytes: parse_or("MAX_BODY_BYTES", get("MAX_BODY_BYTES"), defaults.max_body_bytes)?,
            maintenance_mode: parse_bool("MAINTENANCE_MODE", get("MAINTENANCE_MODE"))?,
            rate_limit_per_minute: parse_or(
                "RATE_LIMIT_PER_MINUTE",
                get("RATE_LIMIT_PER_MINUTE"),
                defaults.rate_limit_per_minute,
            )?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<&str>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(s) => s.parse().map_err(|_| ConfigError::Invalid {
            key,
            value: s.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: Option<&str>) -> Result<bool, ConfigError> {
    match raw.map(str::to_lowercase).as_deref() {
        None | Some("0") | Some("false") | Some("off") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("on") | Some("yes") => Ok(true),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
        }),
    }
}
