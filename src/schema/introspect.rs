//! Live schema introspection: per-driver metadata queries.
//!
//! The reflector needs one thing from the database: the list of columns on
//! a table and their vendor-reported types. Each driver exposes that through
//! a different catalog surface, so the query text is driver-specific while
//! the result shape ([`RawColumn`]) is uniform.

use thiserror::Error;

/// Result type for introspection operations.
pub type IntrospectResult<T> = Result<T, IntrospectError>;

/// Errors raised while fetching column metadata.
#[derive(Debug, Error)]
pub enum IntrospectError {
    /// The connection or statement failed at the driver level.
    #[error("metadata query failed for table '{table}': {message}")]
    QueryFailed { table: String, message: String },

    /// The table does not exist in the connected database.
    #[error("table '{table}' not found")]
    TableNotFound { table: String },

    /// The driver returned rows the adapter could not interpret.
    #[error("malformed metadata row for table '{table}': {message}")]
    MalformedRow { table: String, message: String },
}

/// Database engine family, selecting both SQL dialect and catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Driver {
    #[default]
    MySql,
    Postgres,
    Sqlite,
    SqlServer,
    /// Unrecognized engine; standard information_schema is attempted.
    Other,
}

impl Driver {
    /// Resolve a driver from its connection-config name.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "mysql" | "mariadb" => Driver::MySql,
            "pgsql" | "postgres" | "postgresql" => Driver::Postgres,
            "sqlite" | "sqlite3" => Driver::Sqlite,
            "sqlsrv" | "sqlserver" | "mssql" => Driver::SqlServer,
            _ => Driver::Other,
        }
    }

    /// The metadata query listing columns and vendor types for `table`.
    ///
    /// The table name is interpolated rather than bound because several
    /// engines (MySQL DESCRIBE, SQLite PRAGMA) reject placeholders in these
    /// positions. Callers pass identifiers from the model registry, never
    /// request input.
    pub fn metadata_query(&self, table: &str) -> String {
        match self {
            Driver::MySql => format!("DESCRIBE `{}`", table),
            Driver::Postgres => format!(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_name = '{}' ORDER BY ordinal_position",
                table
            ),
            Driver::Sqlite => format!("PRAGMA table_info(\"{}\")", table),
            Driver::SqlServer => format!(
                "SELECT COLUMN_NAME, DATA_TYPE FROM INFORMATION_SCHEMA.COLUMNS \
                 WHERE TABLE_NAME = '{}' ORDER BY ORDINAL_POSITION",
                table
            ),
            Driver::Other => format!(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_name = '{}'",
                table
            ),
        }
    }
}

/// One column as reported by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    pub name: String,
    /// Vendor type text, e.g. `varchar(255)`, `tinyint(1)`, `timestamptz`.
    pub vendor_type: String,
}

impl RawColumn {
    pub fn new(name: &str, vendor_type: &str) -> Self {
        Self {
            name: name.into(),
            vendor_type: vendor_type.into(),
        }
    }
}

/// Adapter over a live connection that can answer catalog queries.
///
/// Implementations wrap whatever client the host application uses; the
/// reflector stays agnostic of the actual driver crate.
pub trait Introspector: Send + Sync {
    /// Which engine family the connection speaks.
    fn driver(&self) -> Driver;

    /// Fetch the columns of `table` with their vendor types.
    fn columns(&self, table: &str) -> IntrospectResult<Vec<RawColumn>>;
}
