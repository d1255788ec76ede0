use async_trait::async_trait;

use crate::error::BoxError;
use crate::sql::Dialect;
use crate::types::{RawQueryResult, SqlValue};

/// Result returned by driver calls; the caller decides which `DbLibError`
/// wraps the failure.
pub type DriverResult<T> = std::result::Result<T, BoxError>;

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Holding the connection to the database
/// - Converting SqlValue parameters to native types
/// - Executing statements and converting results to RawQueryResult
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// SQL flavor the driver expects: quoting and positional placeholders.
    fn dialect(&self) -> Dialect;

    /// Execute SQL without preparing it. No parameters; the text may hold
    /// several statements where the server allows it.
    async fn execute_raw(&self, sql: &str) -> DriverResult<RawQueryResult>;

    /// Prepare, bind and execute a statement.
    /// Parameters are positional in the driver's placeholder style.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> DriverResult<RawQueryResult>;
}
