use serde::de::DeserializeOwned;

use crate::config::{ColumnCase, ConnectionOptions, NullHandling};
use crate::error::{DbLibError, Result};
use crate::types::SqlValue;

/// Driver-agnostic raw result from a database statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryResult {
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows, where each row is a vector of values in column order
    pub rows: Vec<Vec<SqlValue>>,
    /// Rows inserted, updated or deleted, as reported by the driver
    pub rows_affected: u64,
}

impl RawQueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A result with no rows that reports `rows_affected` changes.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }
}

/// A single result row: an ordered association of column name to value.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a new Row from column names and values.
    pub(crate) fn new(columns: &[String], values: Vec<SqlValue>) -> Self {
        Self {
            columns: columns.to_vec(),
            values,
        }
    }

    /// Gets a value by column name.
    pub fn get(&self, column: &str) -> Result<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| DbLibError::ColumnNotFound(column.to_string()))
    }

    /// Returns all column names in this row, in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns all values in this row, in result order.
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Iterates `(column, value)` pairs in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(|c| c.as_str())
            .zip(self.values.iter())
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Renders the row as a JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .iter()
            .map(|(c, v)| (c.to_string(), serde_json::to_value(v).unwrap_or_default()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Populates a caller type from the row, matching fields by column name.
    pub fn into_object<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.to_json()).map_err(DbLibError::RowMappingFailed)
    }

    fn apply(&mut self, options: &ConnectionOptions) {
        match options.column_case {
            ColumnCase::Natural => {}
            ColumnCase::Lower => self.columns.iter_mut().for_each(|c| *c = c.to_lowercase()),
            ColumnCase::Upper => self.columns.iter_mut().for_each(|c| *c = c.to_uppercase()),
        }
        for value in self.values.iter_mut() {
            match options.nulls {
                NullHandling::Natural => {}
                NullHandling::EmptyStringToNull => {
                    if value.as_str() == Some("") {
                        *value = SqlValue::Null;
                    }
                }
                NullHandling::NullToEmptyString => {
                    if value.is_null() {
                        *value = SqlValue::Text(String::new());
                    }
                }
            }
        }
    }
}

/// Conversion from a fetched row into the caller's chosen shape.
///
/// `Row` itself is the associative fetch mode. Any `DeserializeOwned` type is
/// populated field-by-column through serde.
pub trait FromRow: Sized {
    fn from_row(row: Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self> {
        Ok(row)
    }
}

impl<T: DeserializeOwned> FromRow for T {
    fn from_row(row: Row) -> Result<Self> {
        row.into_object()
    }
}

/// Result of a statement execution, containing zero or more rows.
#[derive(Debug)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Row>,
    rows_affected: u64,
}

impl QueryResult {
    /// Creates a QueryResult from a RawQueryResult, applying connection options
    /// to every row.
    pub fn from_raw(raw: RawQueryResult, options: &ConnectionOptions) -> Self {
        let rows = raw
            .rows
            .into_iter()
            .map(|values| {
                let mut row = Row::new(&raw.columns, values);
                row.apply(options);
                row
            })
            .collect();
        Self {
            columns: raw.columns,
            rows,
            rows_affected: raw.rows_affected,
        }
    }

    /// Returns the first row, if any. Remaining rows are dropped.
    pub fn first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    /// Returns all rows from the result.
    pub fn rows(self) -> Vec<Row> {
        self.rows
    }

    /// Returns a reference to the rows without consuming the result.
    pub fn rows_ref(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the column names as reported by the driver.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Returns the number of rows in this result.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if this result contains no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestRow {
        row1: i64,
        row2: Option<String>,
    }

    fn raw() -> RawQueryResult {
        RawQueryResult::new(
            vec!["row1".to_string(), "row2".to_string()],
            vec![
                vec![SqlValue::Int64(1), SqlValue::from("")],
                vec![SqlValue::Int64(6), SqlValue::Null],
            ],
        )
    }

    #[test]
    fn test_row_get() {
        let row = QueryResult::from_raw(raw(), &ConnectionOptions::default())
            .first()
            .unwrap();

        assert_eq!(row.get("row1").unwrap(), &SqlValue::Int64(1));
        assert_eq!(row.get("row2").unwrap(), &SqlValue::from(""));
        assert!(matches!(
            row.get("missing"),
            Err(DbLibError::ColumnNotFound(ref c)) if c == "missing"
        ));
    }

    #[test]
    fn test_rows_keep_result_order() {
        let rows = QueryResult::from_raw(raw(), &ConnectionOptions::default()).rows();
        let firsts: Vec<_> = rows.iter().map(|r| r.get("row1").unwrap().clone()).collect();
        assert_eq!(firsts, vec![SqlValue::Int64(1), SqlValue::Int64(6)]);
        assert_eq!(rows[0].columns(), &["row1".to_string(), "row2".to_string()]);
    }

    #[test]
    fn test_into_object() {
        let rows = QueryResult::from_raw(raw(), &ConnectionOptions::default()).rows();
        let objects: Vec<TestRow> = rows
            .into_iter()
            .map(FromRow::from_row)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            objects,
            vec![
                TestRow {
                    row1: 1,
                    row2: Some(String::new())
                },
                TestRow {
                    row1: 6,
                    row2: None
                },
            ]
        );
    }

    #[test]
    fn test_into_object_type_mismatch() {
        let raw = RawQueryResult::new(
            vec!["row1".to_string()],
            vec![vec![SqlValue::from("not a number")]],
        );
        let row = QueryResult::from_raw(raw, &ConnectionOptions::default())
            .first()
            .unwrap();
        let err = row.into_object::<TestRow>().unwrap_err();
        assert!(matches!(err, DbLibError::RowMappingFailed(_)));
    }

    #[test]
    fn test_options_fold_case_and_nulls() {
        let options = ConnectionOptions {
            column_case: ColumnCase::Upper,
            nulls: NullHandling::EmptyStringToNull,
        };
        let row = QueryResult::from_raw(raw(), &options).first().unwrap();
        assert_eq!(row.columns(), &["ROW1".to_string(), "ROW2".to_string()]);
        assert_eq!(row.get("ROW2").unwrap(), &SqlValue::Null);

        let options = ConnectionOptions {
            column_case: ColumnCase::Natural,
            nulls: NullHandling::NullToEmptyString,
        };
        let rows = QueryResult::from_raw(raw(), &options).rows();
        assert_eq!(rows[1].get("row2").unwrap(), &SqlValue::from(""));
    }
}
