use serde::de::DeserializeOwned;

use crate::builders::{DataSet, DataSetKind};
use crate::error::{DbLibError, Result};
use crate::executor::{collect_rows, Executor};
use crate::types::{BindMap, SqlValue};

/// Prepared-statement helpers that map rows onto caller types.
#[derive(Clone)]
pub struct PreparedStatements {
    executor: Executor,
}

impl PreparedStatements {
    pub(crate) fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// Insert one row built from `values`, returning the affected row count.
    ///
    /// Fails with `PreparedInsertFailed` when the driver rejects the
    /// statement or reports that nothing was inserted.
    pub async fn execute_prepared_insert<I, K, V>(&self, table: &str, values: I) -> Result<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SqlValue>,
    {
        let statement = DataSet::new(DataSetKind::Insert, values)?
            .with_dialect(self.executor.dialect())
            .insert(table)?;

        let raw = self
            .executor
            .run_prepared(statement.sql(), statement.binds())
            .await?
            .map_err(|e| DbLibError::PreparedInsertFailed(Some(e)))?;

        if raw.rows_affected == 0 {
            return Err(DbLibError::PreparedInsertFailed(None));
        }
        Ok(raw.rows_affected)
    }

    /// Fetch the first matching row as a `T`. No row is a `FetchFailed`.
    pub async fn execute_prepared_fetch_as_object<T: DeserializeOwned>(
        &self,
        sql: &str,
        binds: &BindMap,
    ) -> Result<T> {
        let raw = self
            .executor
            .run_prepared(sql, binds)
            .await?
            .map_err(DbLibError::ExecutionFailed)?;

        self.executor
            .result(raw)
            .first()
            .ok_or(DbLibError::FetchFailed)?
            .into_object()
    }

    /// Fetch every matching row as a `T`, in result order.
    pub async fn execute_prepared_fetch_all_as_objects<T: DeserializeOwned>(
        &self,
        sql: &str,
        binds: &BindMap,
    ) -> Result<Vec<T>> {
        let raw = self
            .executor
            .run_prepared(sql, binds)
            .await?
            .map_err(DbLibError::ExecutionFailed)?;

        collect_rows(self.executor.result(raw))
    }

    /// Run SQL without parameters through the prepared path.
    pub async fn execute_prepared_no_params(&self, sql: &str) -> Result<u64> {
        let raw = self
            .executor
            .run_prepared(sql, &BindMap::new())
            .await?
            .map_err(DbLibError::PreparedExecutionFailed)?;
        Ok(raw.rows_affected)
    }
}
