use std::fmt;
use std::str::FromStr;

use crate::error::{DbLibError, Result};
use crate::sql::{is_placeholder_byte, Dialect};
use crate::types::{BindMap, SqlValue};

/// What a data set will be used to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSetKind {
    /// Columns listed verbatim, for `INSERT`.
    Insert,
    /// `` `column` = :column `` assignments, for `UPDATE`.
    Manipulate,
}

impl DataSetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSetKind::Insert => "insert",
            DataSetKind::Manipulate => "manipulate",
        }
    }
}

impl fmt::Display for DataSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSetKind {
    type Err = DbLibError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "insert" => Ok(DataSetKind::Insert),
            "manipulate" => Ok(DataSetKind::Manipulate),
            other => Err(DbLibError::InvalidDataSetKind(other.to_string())),
        }
    }
}

/// A built statement: SQL with named placeholders plus the values to bind.
///
/// Remembers the dialect it was rendered for and how it was built, so it can
/// be rendered again for a connection that speaks a different dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    binds: BindMap,
    dialect: Dialect,
    shape: Shape,
}

impl Statement {
    /// `` DELETE FROM `table` WHERE `column` = <value>; `` in the MySQL dialect.
    pub fn delete(table: &str, column: &str, value: impl Into<SqlValue>) -> Result<Self> {
        Self::delete_with_dialect(Dialect::default(), table, column, value)
    }

    pub fn delete_with_dialect(
        dialect: Dialect,
        table: &str,
        column: &str,
        value: impl Into<SqlValue>,
    ) -> Result<Self> {
        let mut binds = BindMap::new();
        let filter = Filter::new(column, value.into(), &mut binds)?;
        let shape = Shape::Delete {
            table: table.to_string(),
            filter,
        };
        Ok(Self::render(shape, binds, dialect))
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &BindMap {
        &self.binds
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Renders the same statement for `dialect`. Binds are unchanged.
    pub fn with_dialect(self, dialect: Dialect) -> Self {
        if self.dialect == dialect {
            return self;
        }
        Self::render(self.shape, self.binds, dialect)
    }

    fn render(shape: Shape, binds: BindMap, dialect: Dialect) -> Self {
        Self {
            sql: shape.to_sql(dialect),
            binds,
            dialect,
            shape,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Insert {
        table: String,
        columns: Vec<String>,
        placeholders: Vec<String>,
    },
    Update {
        table: String,
        columns: Vec<String>,
        filter: Filter,
    },
    Delete {
        table: String,
        filter: Filter,
    },
}

impl Shape {
    fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            Shape::Insert {
                table,
                columns,
                placeholders,
            } => format!(
                "INSERT INTO {}({}) {} ({})",
                dialect.quote_identifier(table),
                columns.join(", "),
                dialect.values_keyword(),
                placeholders.join(", ")
            ),
            Shape::Update {
                table,
                columns,
                filter,
            } => format!(
                "UPDATE {} SET {} WHERE {}",
                dialect.quote_identifier(table),
                set_list(dialect, columns).join(", "),
                filter.to_sql(dialect)
            ),
            Shape::Delete { table, filter } => format!(
                "DELETE FROM {} WHERE {};",
                dialect.quote_identifier(table),
                filter.to_sql(dialect)
            ),
        }
    }
}

/// The single-column WHERE of an update or delete.
#[derive(Debug, Clone, PartialEq)]
struct Filter {
    column: String,
    value: FilterValue,
}

#[derive(Debug, Clone, PartialEq)]
enum FilterValue {
    Inline(i64),
    IsNull,
    Bound(String),
}

impl Filter {
    /// Integers are written inline, NULL becomes `IS NULL`, and anything else
    /// is added to `binds` as `:where_<column>`.
    fn new(column: &str, value: SqlValue, binds: &mut BindMap) -> Result<Self> {
        validate_identifier(column)?;

        let value = match value {
            SqlValue::Int32(i) => FilterValue::Inline(i64::from(i)),
            SqlValue::Int64(i) => FilterValue::Inline(i),
            SqlValue::Null => FilterValue::IsNull,
            value => {
                let placeholder = format!(":where_{}", column);
                if binds.contains(&placeholder) {
                    return Err(DbLibError::BindFailed(format!(
                        "placeholder {} is already used by the data set",
                        placeholder
                    )));
                }
                binds.insert(&placeholder, value);
                FilterValue::Bound(placeholder)
            }
        };

        Ok(Self {
            column: column.to_string(),
            value,
        })
    }

    fn to_sql(&self, dialect: Dialect) -> String {
        let quoted = dialect.quote_identifier(&self.column);
        match &self.value {
            FilterValue::Inline(i) => format!("{} = {}", quoted, i),
            FilterValue::IsNull => format!("{} IS NULL", quoted),
            FilterValue::Bound(placeholder) => format!("{} = {}", quoted, placeholder),
        }
    }
}

fn set_list(dialect: Dialect, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|c| format!("{} = :{}", dialect.quote_identifier(c), c))
        .collect()
}

/// Column/value input captured for exactly one INSERT or UPDATE.
///
/// Built in one call and never mutated afterwards, so a data set can't leak
/// columns from a previous statement into the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    kind: DataSetKind,
    dialect: Dialect,
    columns: Vec<String>,
    binds: BindMap,
}

impl DataSet {
    /// Captures `values` in iteration order. Keys must be `[A-Za-z0-9_]+`
    /// since each doubles as a placeholder name. A repeated key keeps its
    /// first position and takes the last value.
    pub fn new<I, K, V>(kind: DataSetKind, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SqlValue>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut binds = BindMap::new();

        for (key, value) in values {
            let key = key.as_ref();
            validate_identifier(key)?;
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
            binds.insert(key, value);
        }

        if columns.is_empty() {
            return Err(DbLibError::EmptyDataSet);
        }

        Ok(Self {
            kind,
            dialect: Dialect::default(),
            columns,
            binds,
        })
    }

    /// Use `dialect` for identifier quoting and the insert keyword.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn kind(&self) -> DataSetKind {
        self.kind
    }

    pub fn binds(&self) -> &BindMap {
        &self.binds
    }

    /// Column fragments in input order: bare names for insert,
    /// `` `name` = :name `` for manipulate.
    pub fn assignments(&self) -> Vec<String> {
        match self.kind {
            DataSetKind::Insert => self.columns.clone(),
            DataSetKind::Manipulate => set_list(self.dialect, &self.columns),
        }
    }

    /// `` INSERT INTO `table`(c1, c2) VALUE (:c1, :c2) ``
    pub fn insert(&self, table: &str) -> Result<Statement> {
        self.expect_kind(DataSetKind::Insert, "insert")?;

        let shape = Shape::Insert {
            table: table.to_string(),
            columns: self.columns.clone(),
            placeholders: self.binds.keys().map(str::to_string).collect(),
        };
        Ok(Statement::render(shape, self.binds.clone(), self.dialect))
    }

    /// `` UPDATE `table` SET `c1` = :c1 WHERE `column` = <value> ``
    ///
    /// Integer WHERE values are written inline, NULL becomes `IS NULL`, and
    /// anything else is bound as `:where_<column>`:
    ///
    /// ```
    /// use dblib::{DataSet, DataSetKind};
    ///
    /// let set = DataSet::new(DataSetKind::Manipulate, [("row1", 10)])?;
    /// assert_eq!(
    ///     set.update("test", "row1", 5)?.sql(),
    ///     "UPDATE `test` SET `row1` = :row1 WHERE `row1` = 5"
    /// );
    /// assert_eq!(
    ///     set.update("test", "row1", "5")?.sql(),
    ///     "UPDATE `test` SET `row1` = :row1 WHERE `row1` = :where_row1"
    /// );
    /// # Ok::<(), dblib::DbLibError>(())
    /// ```
    pub fn update(
        &self,
        table: &str,
        where_column: &str,
        where_value: impl Into<SqlValue>,
    ) -> Result<Statement> {
        self.expect_kind(DataSetKind::Manipulate, "update")?;

        let mut binds = self.binds.clone();
        let filter = Filter::new(where_column, where_value.into(), &mut binds)?;
        let shape = Shape::Update {
            table: table.to_string(),
            columns: self.columns.clone(),
            filter,
        };
        Ok(Statement::render(shape, binds, self.dialect))
    }

    fn expect_kind(&self, expected: DataSetKind, statement: &'static str) -> Result<()> {
        if self.kind != expected {
            return Err(DbLibError::DataSetKindMismatch {
                kind: self.kind.as_str(),
                statement,
            });
        }
        Ok(())
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || !name.bytes().all(is_placeholder_byte) {
        return Err(DbLibError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}
