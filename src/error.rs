//! Engine errors
//!
//! Every failure the storage engine can report. None of them leave a
//! keyspace partially mutated.

use std::str::FromStr;

use thiserror::Error;

/// Error returned by [`Storage`](crate::storage::Storage) and
/// [`Keyspace`](crate::storage::Keyspace) operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Database index outside `[0, DATABASES)`
    #[error("invalid database {0}")]
    InvalidDatabase(i64),

    /// The key holds a value of another kind
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The key does not exist
    #[error("key {0} does not exist")]
    NotFound(String),

    /// Stream ID is not of the form `<millis>-<seq>`
    #[error("invalid stream ID '{0}'")]
    InvalidId(String),

    /// Stream ID is not strictly greater than the last entry's ID
    #[error("the ID specified in XADD is equal or smaller than the target stream top item")]
    OutOfOrderId,

    /// Malformed numeric argument
    #[error("invalid {what} '{value}'")]
    Parse { what: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Parse a caller-supplied numeric argument, naming it in the error
pub fn parse_arg<T: FromStr>(what: &'static str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| StorageError::Parse {
        what,
        value: value.to_string(),
    })
}
