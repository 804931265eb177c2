//! Error types for the vector index

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for vector index operations
#[derive(Debug, Error)]
pub enum IndexError {
    /// LibSQL error
    #[error("LibSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// SQL query error
    #[error("SQL query error: {0}")]
    Query(String),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(String),

    /// Data error
    #[error("Data error: {0}")]
    Data(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<IndexError> for CrateError {
    fn from(err: IndexError) -> Self {
        CrateError::Index(err.to_string())
    }
}
