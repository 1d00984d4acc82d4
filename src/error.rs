//! Crate-level error types.

use thiserror::Error;

use crate::request::ParseError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that abort building a query.
///
/// Most bad input is tolerated by policy (dropped terms, degraded
/// reflection); only a payload that cannot be parsed at all or a request
/// for an unregistered entity is fatal.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("entity '{name}' is not registered")]
    UnknownEntity { name: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}
