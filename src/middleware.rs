//! The public surface: a pooled middleware handle over one server.

use std::fmt;
use std::sync::Arc;

use crate::bulk::{self, BulkLoadSpec};
use crate::completion::{Callback, Completion};
use crate::config::{ConfigSource, Configuration};
use crate::error::TdsMiddlewareError;
use crate::executor::{self, RequestSpec};
use crate::logging::{LogLevel, Logger, LoggerConfig};
use crate::pool::{ConnectionGateway, PoolStatus, PooledConnection};
use crate::protocol::Connector;
use crate::results::RequestOutcome;

/// Pooled access to a SQL Server style backend.
///
/// Every operation acquires a connection, uses it, releases it exactly once,
/// then reports its outcome both to the optional callback and as the
/// returned `Result`.
pub struct TdsMiddleware<C: Connector> {
    config: Configuration,
    gateway: ConnectionGateway<C>,
    logger: Arc<dyn Logger>,
}

impl<C: Connector> TdsMiddleware<C> {
    /// Resolve the configuration and build the pool around `connector`.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ConfigError` if the configuration does
    /// not parse or validate.
    pub fn new(
        config: impl Into<ConfigSource>,
        logger: impl Into<LoggerConfig>,
        connector: C,
    ) -> Result<Self, TdsMiddlewareError> {
        Self::with_connector(config, logger, |_| Ok(connector))
    }

    /// Like [`TdsMiddleware::new`], but the connector is built from the
    /// resolved configuration.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ConfigError` if the configuration does
    /// not parse or validate, or whatever `make_connector` returns.
    pub fn with_connector<F>(
        config: impl Into<ConfigSource>,
        logger: impl Into<LoggerConfig>,
        make_connector: F,
    ) -> Result<Self, TdsMiddlewareError>
    where
        F: FnOnce(&Configuration) -> Result<C, TdsMiddlewareError>,
    {
        let logger = logger.into().into_logger();
        let config = match config.into().resolve() {
            Ok(config) => config,
            Err(e) => {
                logger.log(LogLevel::Error, &e.to_string());
                return Err(e);
            }
        };
        let connector = make_connector(&config)?;
        let gateway = ConnectionGateway::new(connector, &config.pool, logger.clone())?;
        logger.log(
            LogLevel::Debug,
            &format!(
                "pool ready for {} (max {} connections)",
                config.connection.server, config.pool.max
            ),
        );
        Ok(Self {
            config,
            gateway,
            logger,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.gateway.status()
    }

    /// Acquire a pooled connection. Dropping it returns it to the pool.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::AcquisitionError` if no connection could
    /// be obtained within the acquire timeout, or the pool is closed.
    pub async fn connect(&self) -> Result<PooledConnection<C>, TdsMiddlewareError> {
        let completion = Completion::new(None, self.logger.clone());
        completion.settle(self.gateway.acquire().await)
    }

    /// [`TdsMiddleware::connect`] that also reports to `callback`.
    ///
    /// # Errors
    /// Same as [`TdsMiddleware::connect`].
    pub async fn connect_with(
        &self,
        callback: Callback<PooledConnection<C>>,
    ) -> Result<PooledConnection<C>, TdsMiddlewareError> {
        let completion = Completion::new(Some(callback), self.logger.clone());
        completion.settle(self.gateway.acquire().await)
    }

    /// Execute a SQL batch or stored procedure and collect its result sets.
    ///
    /// # Errors
    /// Returns an acquisition, execution, transform or protocol error. The
    /// connection has been released by the time the error is reported.
    pub async fn request(&self, spec: RequestSpec) -> Result<RequestOutcome, TdsMiddlewareError> {
        let RequestSpec {
            sql,
            parameters,
            options,
            callback,
        } = spec;
        let completion = Completion::new(callback, self.logger.clone());

        let result = async {
            let mut conn = self.gateway.acquire().await?;
            self.logger.log(
                LogLevel::Debug,
                &format!(
                    "executing {} with {} parameters",
                    if options.call_procedure {
                        "procedure"
                    } else {
                        "sql"
                    },
                    parameters.len()
                ),
            );
            executor::execute_request(&mut *conn, &sql, parameters, &options).await
        }
        .await;

        completion.settle(result)
    }

    /// Bulk-insert rows into a table; resolves with the inserted row count.
    ///
    /// # Errors
    /// Returns an acquisition error, a staging `ParameterError`, or the
    /// protocol's failure. Nothing is inserted on error.
    pub async fn bulk_load(&self, spec: BulkLoadSpec) -> Result<u64, TdsMiddlewareError> {
        let BulkLoadSpec {
            table,
            columns,
            rows,
            callback,
        } = spec;
        let completion = Completion::new(callback, self.logger.clone());

        let result = async {
            let mut conn = self.gateway.acquire().await?;
            self.logger.log(
                LogLevel::Debug,
                &format!("Inserting {} rows into {table}", rows.len()),
            );
            bulk::execute_bulk_load(&mut *conn, &table, columns, rows).await
        }
        .await;

        completion.settle(result)
    }

    /// Close the pool. Later acquisitions fail with `Closed`; connections
    /// already handed out are dropped when their operations finish.
    pub fn destroy(&self) {
        self.gateway.close();
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.gateway.is_closed()
    }
}

#[cfg(feature = "mssql")]
impl TdsMiddleware<crate::mssql::TiberiusConnector> {
    /// Middleware over a real SQL Server through `tiberius`.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ConfigError` if the configuration is
    /// invalid or uses an authentication method the backend cannot provide.
    pub fn new_mssql(
        config: impl Into<ConfigSource>,
        logger: impl Into<LoggerConfig>,
    ) -> Result<Self, TdsMiddlewareError> {
        Self::with_connector(config, logger, |config| {
            crate::mssql::TiberiusConnector::from_options(&config.connection)
        })
    }
}

impl<C: Connector> fmt::Debug for TdsMiddleware<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TdsMiddleware")
            .field("server", &self.config.connection.server)
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}
