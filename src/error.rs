use std::path::PathBuf;

use thiserror::Error;

/// Boxed error produced by a database driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for dblib operations
#[derive(Debug, Error)]
pub enum DbLibError {
    #[error("Specified config file location does not exist: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Config file malformed: {0}")]
    ConfigMalformed(String),

    #[error("{0} is not set in the config file")]
    MissingConfigField(&'static str),

    #[error("Unknown driver attribute: {0}")]
    UnknownAttribute(String),

    #[error("Unsupported value {value} for driver attribute {attribute}")]
    UnsupportedAttributeValue { attribute: String, value: String },

    #[error("Unable to connect to database: {0}")]
    ConnectionFailed(#[source] BoxError),

    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("Failed to execute statement: {0}")]
    ExecutionFailed(#[source] BoxError),

    #[error("Fetch failed to retrieve a result")]
    FetchFailed,

    #[error("Failed to execute the prepared insert query")]
    PreparedInsertFailed(#[source] Option<BoxError>),

    #[error("Failed to execute prepared statement with no params: {0}")]
    PreparedExecutionFailed(#[source] BoxError),

    #[error("Unknown data set kind: {0}")]
    InvalidDataSetKind(String),

    #[error("A {kind} data set cannot build an {statement} statement")]
    DataSetKindMismatch {
        kind: &'static str,
        statement: &'static str,
    },

    #[error("Data set contains no values")]
    EmptyDataSet,

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Failed to map row: {0}")]
    RowMappingFailed(#[source] serde_json::Error),
}

/// Result type alias for dblib operations
pub type Result<T> = std::result::Result<T, DbLibError>;
