//! Convenient imports for common functionality.

pub use crate::bulk::BulkLoadSpec;
pub use crate::completion::{Callback, callback};
pub use crate::config::{
    Authentication, ConfigSource, Configuration, ConnectionOptions, PoolOptions, ProtocolOptions,
};
pub use crate::error::{AcquisitionFailure, TdsMiddlewareError};
pub use crate::executor::{RequestOptions, RequestSpec};
pub use crate::logging::{LogLevel, Logger, LoggerConfig};
pub use crate::middleware::TdsMiddleware;
pub use crate::pool::{PoolStatus, PooledConnection};
pub use crate::protocol::{BulkColumn, Connector, ProtocolConnection, ProtocolEvent};
pub use crate::results::{CustomDbRow, RequestOutcome, ResultSet};
pub use crate::transform::{ColumnMatcher, ResultSetScope, TransformRule};
pub use crate::types::{ColumnMetadata, DataType, Parameter, RowValues};

#[cfg(feature = "mssql")]
pub use crate::mssql::{TiberiusConnection, TiberiusConnector};
