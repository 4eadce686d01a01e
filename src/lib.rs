//! Pooled access to SQL Server over TDS.
//!
//! [`TdsMiddleware`] acquires connections from a `deadpool` pool, runs SQL
//! batches or stored procedures, streams their result sets through
//! per-column transform rules, and bulk-loads rows. Every operation can be
//! awaited, observed through a callback, or both.
//!
//! ```rust,no_run
//! # #[cfg(feature = "mssql")]
//! # async fn demo() -> Result<(), tds_middleware::TdsMiddlewareError> {
//! use tds_middleware::prelude::*;
//!
//! let db = TdsMiddleware::new_mssql(
//!     "Server=tcp:localhost,1433;Database=shop;User Id=app;Password=secret",
//!     true,
//! )?;
//! let outcome = db
//!     .request(RequestSpec::new("SELECT id, name FROM customers WHERE id = @id").param("id", 1))
//!     .await?;
//! if let Some(rows) = outcome.recordset() {
//!     for row in rows {
//!         println!("{:?}", row.get("name"));
//!     }
//! }
//! db.destroy();
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod bulk;
pub mod completion;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod middleware;
pub mod pool;
pub mod prelude;
pub mod protocol;
pub mod results;
pub mod transform;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use bulk::BulkLoadSpec;
pub use config::{ConfigSource, Configuration};
pub use error::{AcquisitionFailure, TdsMiddlewareError};
pub use executor::{RequestOptions, RequestSpec};
pub use logging::{LogLevel, Logger, LoggerConfig};
pub use middleware::TdsMiddleware;
pub use pool::{PoolStatus, PooledConnection};
pub use results::{CustomDbRow, RequestOutcome, ResultSet};
pub use transform::{ColumnMatcher, TransformRule};
pub use types::{DataType, Parameter, RowValues};
