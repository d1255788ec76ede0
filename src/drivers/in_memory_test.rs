use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::sql::Dialect;
use crate::traits::{DatabaseDriver, DriverResult};
use crate::types::{RawQueryResult, SqlValue};

/// Which driver entry point a recorded statement came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Raw,
    Prepared,
}

/// A recorded statement execution for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub path: ExecutionPath,
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Error returned for a scripted failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryTestError(pub String);

impl std::fmt::Display for InMemoryTestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InMemoryTestError {}

/// An in-memory database driver for testing.
///
/// Allows configuring expected responses and verifying executed statements.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use dblib::drivers::{InMemoryTestDriver, InMemoryTestResponseBuilder};
/// use dblib::SqlValue;
///
/// let driver = Arc::new(
///     InMemoryTestDriver::new().with_response(
///         InMemoryTestResponseBuilder::new()
///             .columns(&["id", "name"])
///             .row(vec![SqlValue::from(1), SqlValue::from("Alice")])
///             .build(),
///     ),
/// );
/// ```
pub struct InMemoryTestDriver {
    dialect: Dialect,
    responses: Mutex<VecDeque<Result<RawQueryResult, String>>>,
    recorded_queries: Mutex<Vec<RecordedQuery>>,
    default_response: RawQueryResult,
}

impl InMemoryTestDriver {
    /// Create a new in-memory test driver with no pre-configured responses.
    pub fn new() -> Self {
        Self {
            dialect: Dialect::MySql,
            responses: Mutex::new(VecDeque::new()),
            recorded_queries: Mutex::new(Vec::new()),
            default_response: RawQueryResult::empty(),
        }
    }

    /// Report a different dialect to callers.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Add a response to be returned by the next statement.
    /// Responses are returned in FIFO order.
    pub fn with_response(self, response: RawQueryResult) -> Self {
        self.push(Ok(response));
        self
    }

    /// Add multiple responses to be returned by subsequent statements.
    pub fn with_responses(self, responses: impl IntoIterator<Item = RawQueryResult>) -> Self {
        for response in responses {
            self.push(Ok(response));
        }
        self
    }

    /// Make the next statement fail with the given driver message.
    pub fn with_failure(self, message: &str) -> Self {
        self.push(Err(message.to_string()));
        self
    }

    /// Set a default response to use when no queued responses remain.
    pub fn with_default_response(mut self, response: RawQueryResult) -> Self {
        self.default_response = response;
        self
    }

    fn push(&self, response: Result<RawQueryResult, String>) {
        self.responses
            .lock()
            .expect("responses lock poisoned")
            .push_back(response);
    }

    /// Get all recorded statements that have been executed.
    pub fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.recorded_queries
            .lock()
            .expect("recorded queries lock poisoned")
            .clone()
    }

    /// Get the last recorded statement, if any.
    pub fn last_query(&self) -> Option<RecordedQuery> {
        self.recorded_queries().last().cloned()
    }

    /// Clear all recorded statements.
    pub fn clear_recorded_queries(&self) {
        self.recorded_queries
            .lock()
            .expect("recorded queries lock poisoned")
            .clear();
    }

    /// Assert that the last statement matches the expected SQL and parameters.
    pub fn assert_last_query(&self, expected_sql: &str, expected_params: &[SqlValue]) {
        let last = self.last_query().expect("No queries were recorded");
        assert_eq!(
            last.sql, expected_sql,
            "SQL mismatch.\nExpected: {}\nActual: {}",
            expected_sql, last.sql
        );
        assert_eq!(
            last.params, expected_params,
            "Parameters mismatch.\nExpected: {:?}\nActual: {:?}",
            expected_params, last.params
        );
    }

    /// Assert that the last statement went through the given entry point.
    pub fn assert_last_path(&self, expected: ExecutionPath) {
        let last = self.last_query().expect("No queries were recorded");
        assert_eq!(last.path, expected, "Execution path mismatch");
    }

    /// Assert that exactly n statements were executed.
    pub fn assert_query_count(&self, expected: usize) {
        let actual = self.recorded_queries().len();
        assert_eq!(
            actual, expected,
            "Query count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }

    fn record(&self, path: ExecutionPath, sql: &str, params: &[SqlValue]) -> DriverResult<RawQueryResult> {
        self.recorded_queries
            .lock()
            .expect("recorded queries lock poisoned")
            .push(RecordedQuery {
                path,
                sql: sql.to_string(),
                params: params.to_vec(),
            });

        // Return next queued response or default
        let response = self
            .responses
            .lock()
            .expect("responses lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(self.default_response.clone()));

        response.map_err(|message| InMemoryTestError(message).into())
    }
}

impl Default for InMemoryTestDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for InMemoryTestDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute_raw(&self, sql: &str) -> DriverResult<RawQueryResult> {
        self.record(ExecutionPath::Raw, sql, &[])
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> DriverResult<RawQueryResult> {
        self.record(ExecutionPath::Prepared, sql, params)
    }
}

/// Builder for creating test responses easily.
pub struct InMemoryTestResponseBuilder {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    rows_affected: u64,
}

impl InMemoryTestResponseBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: 0,
        }
    }

    /// Set the column names for the response.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a row of values in column order.
    pub fn row(mut self, values: impl IntoIterator<Item = SqlValue>) -> Self {
        self.rows.push(values.into_iter().collect());
        self
    }

    /// Set the affected row count reported by the response.
    pub fn rows_affected(mut self, n: u64) -> Self {
        self.rows_affected = n;
        self
    }

    /// Build the RawQueryResult.
    pub fn build(self) -> RawQueryResult {
        RawQueryResult {
            columns: self.columns,
            rows: self.rows,
            rows_affected: self.rows_affected,
        }
    }
}

impl Default for InMemoryTestResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
