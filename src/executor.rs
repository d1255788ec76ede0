use std::sync::Arc;

use crate::builders::Statement;
use crate::config::ConnectionOptions;
use crate::error::{DbLibError, Result};
use crate::sql::{compile, Dialect};
use crate::traits::{DatabaseDriver, DriverResult};
use crate::types::{BindMap, FromRow, QueryResult, RawQueryResult};

/// Runs raw and bound SQL against a connection.
///
/// Raw variants send the text untouched and are for trusted, literal SQL.
/// Anything carrying user-supplied values belongs in the bound variants,
/// where values travel separately from the statement text.
///
/// Row shape is chosen by the caller: `Row` for column/value access, or any
/// `serde::Deserialize` type to have columns mapped onto its fields.
#[derive(Clone)]
pub struct Executor {
    driver: Arc<dyn DatabaseDriver>,
    options: ConnectionOptions,
}

impl Executor {
    pub(crate) fn new(driver: Arc<dyn DatabaseDriver>, options: ConnectionOptions) -> Self {
        Self { driver, options }
    }

    /// Execute SQL with no placeholders, discarding any result set.
    pub async fn execute_no_return(&self, sql: &str) -> Result<()> {
        self.raw(sql).await.map(|_| ())
    }

    /// Execute SQL with no placeholders and return the first row, if any.
    pub async fn execute_single_return<R: FromRow>(&self, sql: &str) -> Result<Option<R>> {
        self.raw(sql).await?.first().map(R::from_row).transpose()
    }

    /// Execute SQL with no placeholders and return every row, in order.
    pub async fn execute_all_return<R: FromRow>(&self, sql: &str) -> Result<Vec<R>> {
        collect_rows(self.raw(sql).await?)
    }

    /// Execute SQL with named placeholders, discarding any result set.
    pub async fn execute_bound_no_return(&self, sql: &str, binds: &BindMap) -> Result<()> {
        self.bound(sql, binds).await.map(|_| ())
    }

    /// Execute SQL with named placeholders and return the first row, if any.
    pub async fn execute_bound_single_return<R: FromRow>(
        &self,
        sql: &str,
        binds: &BindMap,
    ) -> Result<Option<R>> {
        self.bound(sql, binds)
            .await?
            .first()
            .map(R::from_row)
            .transpose()
    }

    /// Execute SQL with named placeholders and return every row, in order.
    pub async fn execute_bound_all_return<R: FromRow>(
        &self,
        sql: &str,
        binds: &BindMap,
    ) -> Result<Vec<R>> {
        collect_rows(self.bound(sql, binds).await?)
    }

    /// Execute a built statement, returning the number of affected rows.
    ///
    /// A statement built for another dialect is rendered again for this
    /// connection before it is sent.
    pub async fn execute_statement(&self, statement: &Statement) -> Result<u64> {
        let dialect = self.driver.dialect();
        let rebuilt;
        let statement = if statement.dialect() == dialect {
            statement
        } else {
            tracing::debug!(from = ?statement.dialect(), to = ?dialect, "re-rendering statement");
            rebuilt = statement.clone().with_dialect(dialect);
            &rebuilt
        };

        Ok(self
            .bound(statement.sql(), statement.binds())
            .await?
            .rows_affected())
    }

    /// Dialect spoken by the underlying connection.
    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    async fn raw(&self, sql: &str) -> Result<QueryResult> {
        let raw = self
            .driver
            .execute_raw(sql)
            .await
            .map_err(DbLibError::ExecutionFailed)?;
        Ok(self.result(raw))
    }

    async fn bound(&self, sql: &str, binds: &BindMap) -> Result<QueryResult> {
        let raw = self
            .run_prepared(sql, binds)
            .await?
            .map_err(DbLibError::ExecutionFailed)?;
        Ok(self.result(raw))
    }

    /// Compiles the template and runs it. Bind errors come back in the outer
    /// result; driver errors in the inner one so callers can classify them.
    pub(crate) async fn run_prepared(
        &self,
        sql: &str,
        binds: &BindMap,
    ) -> Result<DriverResult<RawQueryResult>> {
        let compiled = compile(sql, binds, self.driver.dialect())?;
        Ok(self.driver.execute(&compiled.sql, &compiled.params).await)
    }

    pub(crate) fn result(&self, raw: RawQueryResult) -> QueryResult {
        QueryResult::from_raw(raw, &self.options)
    }
}

pub(crate) fn collect_rows<R: FromRow>(result: QueryResult) -> Result<Vec<R>> {
    result.rows().into_iter().map(R::from_row).collect()
}
