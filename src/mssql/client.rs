use async_trait::async_trait;
use tiberius::{Client, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::{bulk, query};
use crate::error::TdsMiddlewareError;
use crate::protocol::{BulkLoadUnit, EventSender, ProtocolConnection, ProtocolRequest, Submission};

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open one SQL Server connection. Named instances are resolved through SQL
/// Browser.
///
/// # Errors
/// Returns an error if the TCP connection or the login fails.
pub async fn create_mssql_client(
    config: tiberius::Config,
    named_instance: bool,
) -> Result<MssqlClient, TdsMiddlewareError> {
    let tcp = if named_instance {
        TcpStream::connect_named(&config).await?
    } else {
        TcpStream::connect(config.get_addr()).await.map_err(|e| {
            TdsMiddlewareError::ExecutionError(format!("TCP connection error: {e}"))
        })?
    };
    tcp.set_nodelay(true)
        .map_err(|e| TdsMiddlewareError::ExecutionError(format!("TCP configuration error: {e}")))?;

    Ok(Client::connect(config, tcp.compat_write()).await?)
}

/// A pooled tiberius client.
pub struct TiberiusConnection {
    client: MssqlClient,
    broken: bool,
}

impl TiberiusConnection {
    #[must_use]
    pub fn new(client: MssqlClient) -> Self {
        Self {
            client,
            broken: false,
        }
    }

    fn track<T>(&mut self, result: Result<T, TdsMiddlewareError>) -> Result<T, TdsMiddlewareError> {
        if let Err(TdsMiddlewareError::MssqlError(tiberius::error::Error::Io { .. })) = &result {
            self.broken = true;
        }
        result
    }
}

#[async_trait]
impl ProtocolConnection for TiberiusConnection {
    async fn exec_sql(
        &mut self,
        request: ProtocolRequest,
        events: EventSender,
    ) -> Result<(), TdsMiddlewareError> {
        let result = query::stream_request(&mut self.client, &request, Submission::Sql, &events).await;
        self.track(result)
    }

    async fn call_procedure(
        &mut self,
        request: ProtocolRequest,
        events: EventSender,
    ) -> Result<(), TdsMiddlewareError> {
        let result =
            query::stream_request(&mut self.client, &request, Submission::Procedure, &events).await;
        self.track(result)
    }

    async fn exec_bulk_load(&mut self, unit: BulkLoadUnit) -> Result<u64, TdsMiddlewareError> {
        let result = bulk::bulk_load(&mut self.client, unit).await;
        self.track(result)
    }

    fn is_broken(&self) -> bool {
        self.broken
    }
}

impl std::fmt::Debug for TiberiusConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiberiusConnection")
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}
