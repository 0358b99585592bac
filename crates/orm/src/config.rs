//! Configuration loaded from `DB_*` environment variables

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Default per-parent bound applied to to-many relations
pub const DEFAULT_RELATIONSHIP_LOAD_LIMIT: u32 = 100;

/// Default values for database configuration
pub struct DatabaseDefaults;

impl DatabaseDefaults {
    pub const URI: &'static str = "postgresql://{user}:{password}@{host}:{port}/{name}";
    pub const NAME: &'static str = "app";
    pub const HOST: &'static str = "localhost";
    pub const PORT: u16 = 5432;
    pub const USER: &'static str = "postgres";
    pub const PASSWORD: &'static str = "";
    pub const MAX_CONNECTIONS: u32 = 10;
    pub const MIN_CONNECTIONS: u32 = 1;
    pub const ACQUIRE_TIMEOUT_SECS: u64 = 30;
    pub const PRE_PING: bool = true;
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },
}

impl ConfigError {
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

impl From<ConfigError> for crate::error::ModelError {
    fn from(err: ConfigError) -> Self {
        crate::error::ModelError::Configuration(err.to_string())
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DatabaseDefaults::MAX_CONNECTIONS,
            min_connections: DatabaseDefaults::MIN_CONNECTIONS,
            acquire_timeout: DatabaseDefaults::ACQUIRE_TIMEOUT_SECS,
            idle_timeout: Some(600),
            max_lifetime: Some(1800),
            test_before_acquire: DatabaseDefaults::PRE_PING,
        }
    }
}

/// Database connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// URI template with `{user}`, `{password}`, `{host}`, `{port}` and `{name}` placeholders
    pub uri: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub pool: PoolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: DatabaseDefaults::URI.to_string(),
            name: DatabaseDefaults::NAME.to_string(),
            host: DatabaseDefaults::HOST.to_string(),
            port: DatabaseDefaults::PORT,
            user: DatabaseDefaults::USER.to_string(),
            password: DatabaseDefaults::PASSWORD.to_string(),
            pool: PoolConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Load configuration from `DB_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let uri = get_env_or_default("DB_URI", DatabaseDefaults::URI);
        let name = get_env_or_default("DB_NAME", DatabaseDefaults::NAME);
        let host = get_env_or_default("DB_HOST", DatabaseDefaults::HOST);
        let port = parse_env("DB_PORT", "port", DatabaseDefaults::PORT, "valid port number")?;
        let user = get_env_or_default("DB_USER", DatabaseDefaults::USER);
        let password = get_env_or_default("DB_PASSWORD", DatabaseDefaults::PASSWORD);

        let pool = PoolConfig {
            max_connections: parse_env(
                "DB_POOL_MAX_CONNECTIONS",
                "pool.max_connections",
                DatabaseDefaults::MAX_CONNECTIONS,
                "positive number of connections",
            )?,
            min_connections: parse_env(
                "DB_POOL_MIN_CONNECTIONS",
                "pool.min_connections",
                DatabaseDefaults::MIN_CONNECTIONS,
                "number of connections",
            )?,
            acquire_timeout: parse_env(
                "DB_POOL_ACQUIRE_TIMEOUT",
                "pool.acquire_timeout",
                DatabaseDefaults::ACQUIRE_TIMEOUT_SECS,
                "valid number of seconds",
            )?,
            test_before_acquire: parse_env(
                "DB_POOL_PRE_PING",
                "pool.test_before_acquire",
                DatabaseDefaults::PRE_PING,
                "true or false",
            )?,
            ..PoolConfig::default()
        };

        let config = Self {
            uri,
            name,
            host,
            port,
            user,
            password,
            pool,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.is_empty() {
            return Err(ConfigError::MissingEnvVar {
                var: "DB_URI".to_string(),
            });
        }

        if self.pool.max_connections == 0 {
            return Err(ConfigError::validation_failed(
                "Maximum pool connections must be greater than 0",
            ));
        }

        if self.pool.min_connections > self.pool.max_connections {
            return Err(ConfigError::validation_failed(
                "Minimum pool connections cannot exceed the maximum",
            ));
        }

        if self.pool.acquire_timeout == 0 {
            return Err(ConfigError::validation_failed(
                "Acquire timeout must be greater than 0",
            ));
        }

        url::Url::parse(&self.url()).map_err(|e| ConfigError::InvalidValue {
            field: "uri".to_string(),
            value: self.uri.clone(),
            expected: format!("a connection URL ({})", e),
        })?;

        Ok(())
    }

    /// Connection URL with placeholders substituted
    pub fn url(&self) -> String {
        if self.uri.contains("sqlite") {
            return self.uri.replace("{name}", &self.name);
        }

        self.uri
            .replace("{user}", &self.user)
            .replace("{password}", &self.password)
            .replace("{host}", &self.host)
            .replace("{port}", &self.port.to_string())
            .replace("{name}", &self.name)
    }
}

/// Settings for relationship load planning
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Bound applied to to-many relations when a request does not set one
    pub relationship_load_limit: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            relationship_load_limit: DEFAULT_RELATIONSHIP_LOAD_LIMIT,
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let relationship_load_limit = parse_env(
            "DB_RELATIONSHIP_LOAD_LIMIT",
            "relationship_load_limit",
            DEFAULT_RELATIONSHIP_LOAD_LIMIT,
            "positive number of rows",
        )?;

        if relationship_load_limit == 0 {
            return Err(ConfigError::validation_failed(
                "Relationship load limit must be greater than 0",
            ));
        }

        Ok(Self {
            relationship_load_limit,
        })
    }
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(key: &str, field: &str, default: T, expected: &str) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw,
            expected: expected.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Global test lock to prevent concurrent environment modifications
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 8] = [
        "DB_URI",
        "DB_NAME",
        "DB_HOST",
        "DB_PORT",
        "DB_USER",
        "DB_PASSWORD",
        "DB_POOL_MAX_CONNECTIONS",
        "DB_RELATIONSHIP_LOAD_LIMIT",
    ];

    fn clean_test_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_database_config_from_env() {
        let _guard = TEST_MUTEX.lock().unwrap();
        clean_test_env();
        env::set_var("DB_NAME", "accounts");
        env::set_var("DB_HOST", "db.internal");
        env::set_var("DB_PORT", "6543");
        env::set_var("DB_POOL_MAX_CONNECTIONS", "25");

        let config = DatabaseConfig::from_env().unwrap();

        assert_eq!(config.port, 6543);
        assert_eq!(config.pool.max_connections, 25);
        assert_eq!(
            config.url(),
            "postgresql://postgres:@db.internal:6543/accounts"
        );

        clean_test_env();
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let _guard = TEST_MUTEX.lock().unwrap();
        clean_test_env();
        env::set_var("DB_PORT", "not-a-port");

        let err = DatabaseConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "port"));

        clean_test_env();
    }

    #[test]
    fn test_sqlite_uri_only_substitutes_name() {
        let config = DatabaseConfig {
            uri: "sqlite:///{name}.db".to_string(),
            name: "local".to_string(),
            ..DatabaseConfig::default()
        };

        assert_eq!(config.url(), "sqlite:///local.db");
    }

    #[test]
    fn test_validate_rejects_inverted_pool_bounds() {
        let mut config = DatabaseConfig::default();
        config.pool.min_connections = 20;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unparseable_uri() {
        let config = DatabaseConfig {
            uri: "{host} without scheme".to_string(),
            ..DatabaseConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "uri"
        ));
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_planner_config_limit() {
        let _guard = TEST_MUTEX.lock().unwrap();
        clean_test_env();
        assert_eq!(PlannerConfig::from_env().unwrap().relationship_load_limit, 100);

        env::set_var("DB_RELATIONSHIP_LOAD_LIMIT", "0");
        assert!(PlannerConfig::from_env().is_err());

        clean_test_env();
    }
}
