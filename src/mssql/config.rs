use std::time::Duration;

use async_trait::async_trait;
use tiberius::{AuthMethod, Config as TiberiusConfig, EncryptionLevel};

use super::client::{TiberiusConnection, create_mssql_client};
use crate::config::{Authentication, ConnectionOptions};
use crate::error::TdsMiddlewareError;
use crate::protocol::Connector;

/// Build the tiberius configuration for one server.
///
/// # Errors
/// Returns `TdsMiddlewareError::ConfigError` for integrated security, which
/// this backend does not provide.
pub fn build_tiberius_config(
    opts: &ConnectionOptions,
) -> Result<TiberiusConfig, TdsMiddlewareError> {
    let mut config = TiberiusConfig::new();
    config.host(&opts.server);
    config.port(opts.port_or_default());
    if let Some(database) = opts.database.as_deref().filter(|db| !db.is_empty()) {
        config.database(database);
    }

    match &opts.authentication {
        Authentication::SqlServer { user, password } => {
            config.authentication(AuthMethod::sql_server(user, password));
        }
        Authentication::Integrated => {
            return Err(TdsMiddlewareError::ConfigError(
                "integrated security is not supported by the tiberius backend".to_string(),
            ));
        }
    }

    if let Some(instance) = &opts.instance_name {
        config.instance_name(instance);
    }
    if let Some(application) = &opts.options.application_name {
        config.application_name(application);
    }
    config.encryption(if opts.options.encrypt {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::NotSupported
    });
    if opts.options.trust_server_certificate {
        config.trust_cert();
    }
    Ok(config)
}

/// Opens tiberius connections for the pool.
#[derive(Debug, Clone)]
pub struct TiberiusConnector {
    config: TiberiusConfig,
    named_instance: bool,
    connect_timeout: Option<Duration>,
}

impl TiberiusConnector {
    /// # Errors
    /// Same as [`build_tiberius_config`].
    pub fn from_options(opts: &ConnectionOptions) -> Result<Self, TdsMiddlewareError> {
        Ok(Self {
            config: build_tiberius_config(opts)?,
            named_instance: opts.instance_name.is_some(),
            connect_timeout: opts.options.connect_timeout.map(Duration::from_millis),
        })
    }
}

#[async_trait]
impl Connector for TiberiusConnector {
    type Connection = TiberiusConnection;

    async fn connect(&self) -> Result<TiberiusConnection, TdsMiddlewareError> {
        let connecting = create_mssql_client(self.config.clone(), self.named_instance);
        let client = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting).await.map_err(|_| {
                TdsMiddlewareError::ExecutionError(format!(
                    "SQL Server connection timed out after {} ms",
                    limit.as_millis()
                ))
            })??,
            None => connecting.await?,
        };
        Ok(TiberiusConnection::new(client))
    }
}
