//! Connection and pool configuration.
//!
//! A [`Configuration`] is either built directly, deserialized, or parsed from
//! an ADO.NET-style connection string (see [`ConfigSource`]).

mod connection_string;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use connection_string::parse_connection_string;

use crate::error::TdsMiddlewareError;

pub const DEFAULT_PORT: u16 = 1433;

/// How to authenticate against the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Authentication {
    /// SQL Server login.
    SqlServer { user: String, password: String },
    /// Integrated (Windows / Kerberos) security.
    Integrated,
}

impl Default for Authentication {
    fn default() -> Self {
        Authentication::SqlServer {
            user: String::new(),
            password: String::new(),
        }
    }
}

/// Options handed to the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProtocolOptions {
    /// Rows are keyed by column name. Always forced on.
    pub use_column_names: bool,
    /// Protocol-side buffering of rows until `done`. Always forced off.
    pub row_collection_on_done: bool,
    /// Protocol-side buffering of rows until request completion. Always forced off.
    pub row_collection_on_request_completion: bool,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub application_name: Option<String>,
    /// Connect timeout in milliseconds.
    pub connect_timeout: Option<u64>,
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            use_column_names: true,
            row_collection_on_done: false,
            row_collection_on_request_completion: false,
            encrypt: false,
            trust_server_certificate: false,
            application_name: None,
            connect_timeout: None,
        }
    }
}

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOptions {
    pub server: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub authentication: Authentication,
    #[serde(default)]
    pub options: ProtocolOptions,
}

impl ConnectionOptions {
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Pool sizing and timeouts; timeouts are milliseconds on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolOptions {
    pub min: usize,
    pub max: usize,
    pub idle_timeout: u64,
    pub acquire_timeout: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min: 1,
            max: 10,
            idle_timeout: 10_000,
            acquire_timeout: 12_000,
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout)
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout)
    }
}

/// Connection plus pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub connection: ConnectionOptions,
    #[serde(default)]
    pub pool: PoolOptions,
}

impl Configuration {
    #[must_use]
    pub fn new(connection: ConnectionOptions, pool: PoolOptions) -> Self {
        Self { connection, pool }
    }

    /// Parse a connection string and merge it with the default pool options.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ConfigError` if the string is malformed.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, TdsMiddlewareError> {
        parse_connection_string(connection_string)
    }

    /// Deserialize a JSON configuration document.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ConfigError` if the JSON does not describe
    /// a configuration.
    pub fn from_json_str(json: &str) -> Result<Self, TdsMiddlewareError> {
        serde_json::from_str(json)
            .map_err(|e| TdsMiddlewareError::ConfigError(format!("invalid configuration: {e}")))
    }

    /// Force the streaming invariants and validate pool bounds.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ConfigError` for an empty server or
    /// inconsistent pool sizes.
    pub fn normalized(mut self) -> Result<Self, TdsMiddlewareError> {
        let options = &mut self.connection.options;
        options.use_column_names = true;
        options.row_collection_on_done = false;
        options.row_collection_on_request_completion = false;

        if self.connection.server.trim().is_empty() {
            return Err(TdsMiddlewareError::ConfigError(
                "server must not be empty".to_string(),
            ));
        }
        if self.pool.max == 0 {
            return Err(TdsMiddlewareError::ConfigError(
                "pool max must be at least 1".to_string(),
            ));
        }
        if self.pool.min > self.pool.max {
            return Err(TdsMiddlewareError::ConfigError(format!(
                "pool min ({}) exceeds max ({})",
                self.pool.min, self.pool.max
            )));
        }
        Ok(self)
    }
}

/// Either a ready configuration or a connection string to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Structured(Configuration),
    ConnectionString(String),
}

impl ConfigSource {
    /// Resolve into a normalized configuration.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ConfigError` if parsing or validation fails.
    pub fn resolve(self) -> Result<Configuration, TdsMiddlewareError> {
        let config = match self {
            ConfigSource::Structured(config) => config,
            ConfigSource::ConnectionString(s) => parse_connection_string(&s)?,
        };
        config.normalized()
    }
}

impl From<Configuration> for ConfigSource {
    fn from(config: Configuration) -> Self {
        ConfigSource::Structured(config)
    }
}

impl From<&str> for ConfigSource {
    fn from(s: &str) -> Self {
        ConfigSource::ConnectionString(s.to_string())
    }
}

impl From<String> for ConfigSource {
    fn from(s: String) -> Self {
        ConfigSource::ConnectionString(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_forces_streaming_options() {
        let mut config = Configuration::new(ConnectionOptions::new("db"), PoolOptions::default());
        config.connection.options.use_column_names = false;
        config.connection.options.row_collection_on_done = true;
        config.connection.options.row_collection_on_request_completion = true;

        let config = config.normalized().expect("valid config");
        assert!(config.connection.options.use_column_names);
        assert!(!config.connection.options.row_collection_on_done);
        assert!(!config.connection.options.row_collection_on_request_completion);
    }

    #[test]
    fn pool_bounds_are_validated() {
        let mut config = Configuration::new(ConnectionOptions::new("db"), PoolOptions::default());
        config.pool.min = 11;
        assert!(config.clone().normalized().is_err());
        config.pool.min = 0;
        config.pool.max = 0;
        assert!(config.normalized().is_err());
        assert!(ConfigSource::from(Configuration::default()).resolve().is_err());
    }

    #[test]
    fn json_configuration_uses_pool_defaults() {
        let config = Configuration::from_json_str(
            r#"{
                "connection": {
                    "server": "sql.local",
                    "database": "shop",
                    "authentication": { "type": "sqlServer", "user": "app", "password": "pw" },
                    "options": { "encrypt": true }
                },
                "pool": { "max": 4 }
            }"#,
        )
        .expect("parses");

        assert_eq!(config.connection.server, "sql.local");
        assert_eq!(config.connection.database.as_deref(), Some("shop"));
        assert!(config.connection.options.encrypt);
        assert!(config.connection.options.use_column_names);
        assert_eq!(config.pool.max, 4);
        assert_eq!(config.pool.min, 1);
        assert_eq!(config.pool.acquire_timeout(), Duration::from_secs(12));
    }
}
