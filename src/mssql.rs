//! SQL Server backend over `tiberius`.
//!
//! [`TiberiusConnector`] opens TCP connections (resolving named instances
//! through SQL Browser) and [`TiberiusConnection`] streams query results
//! into protocol events.

mod bulk;
mod client;
mod config;
mod params;
mod query;

pub use client::{MssqlClient, TiberiusConnection, create_mssql_client};
pub use config::{TiberiusConnector, build_tiberius_config};
