use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Either, Executor, MySql, Row, TypeInfo};
use tokio::sync::Mutex;

use crate::config::ConnectionConfig;
use crate::error::{DbLibError, Result};
use crate::sql::Dialect;
use crate::traits::{DatabaseDriver, DriverResult};
use crate::types::{RawQueryResult, SqlValue};

/// MySQL driver implementation using a single sqlx connection.
///
/// The connection is not shared between concurrent statements; callers on
/// the same handle queue on the inner lock.
pub struct MySqlDriver {
    conn: Mutex<MySqlConnection>,
}

impl MySqlDriver {
    /// Connect to a MySQL server.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password);
        if let Some(database) = &config.database {
            options = options.database(database);
        }

        let conn = options
            .connect()
            .await
            .map_err(|e| DbLibError::ConnectionFailed(e.into()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    async fn run<'q, E>(&self, query: E) -> DriverResult<RawQueryResult>
    where
        E: sqlx::Execute<'q, MySql> + 'q,
    {
        let mut conn = self.conn.lock().await;
        let mut stream = (&mut *conn).fetch_many(query);

        let mut result = RawQueryResult::empty();
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => result.rows_affected += done.rows_affected(),
                Either::Right(row) => {
                    if result.columns.is_empty() {
                        result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    result.rows.push(row_values(&row)?);
                }
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn execute_raw(&self, sql: &str) -> DriverResult<RawQueryResult> {
        tracing::debug!(sql, "executing raw statement");
        self.run(sql).await
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> DriverResult<RawQueryResult> {
        tracing::debug!(sql, params = params.len(), "executing prepared statement");
        let mut query = sqlx::query(sql);
        for value in params {
            query = bind_mysql(query, value);
        }
        self.run(query).await
    }
}

fn bind_mysql<'q>(
    q: Query<'q, MySql, MySqlArguments>,
    v: &SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match v {
        SqlValue::Null => q.bind::<Option<String>>(None),
        SqlValue::Text(s) => q.bind(s.clone()),
        SqlValue::Int32(i) => q.bind(*i),
        SqlValue::Int64(i) => q.bind(*i),
        SqlValue::Float64(f) => q.bind(*f),
        SqlValue::Bool(b) => q.bind(*b),
    }
}

fn row_values(row: &MySqlRow) -> DriverResult<Vec<SqlValue>> {
    (0..row.columns().len()).map(|i| column_value(row, i)).collect()
}

/// Decode one column, trying the common types in turn.
fn column_value(row: &MySqlRow, i: usize) -> DriverResult<SqlValue> {
    let column = &row.columns()[i];
    let type_name = column.type_info().name();

    match type_name {
        "DATE" | "DATETIME" | "TIMESTAMP" | "TIME" => {
            let bytes = row.try_get_unchecked::<Option<&[u8]>, _>(i)?;
            return match bytes {
                None => Ok(SqlValue::Null),
                Some(bytes) => render_temporal(type_name, bytes).map(SqlValue::Text),
            };
        }
        "YEAR" => {
            let year = row.try_get_unchecked::<Option<u16>, _>(i)?;
            return Ok(year.map_or(SqlValue::Null, |y| SqlValue::Int32(i32::from(y))));
        }
        _ => {}
    }

    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        return Ok(v.map_or(SqlValue::Null, SqlValue::Int64));
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(i) {
        return Ok(match v {
            None => SqlValue::Null,
            Some(n) => i64::try_from(n).map_or_else(|_| SqlValue::Text(n.to_string()), SqlValue::Int64),
        });
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        return Ok(v.map_or(SqlValue::Null, SqlValue::Float64));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return Ok(v.map_or(SqlValue::Null, SqlValue::Text));
    }

    // DECIMAL and friends arrive as text on the wire
    match row.try_get_unchecked::<Option<String>, _>(i) {
        Ok(v) => Ok(v.map_or(SqlValue::Null, SqlValue::Text)),
        Err(e) => Err(format!(
            "cannot decode column `{}` of type {}: {}",
            column.name(),
            type_name,
            e
        )
        .into()),
    }
}

/// Renders a DATE, DATETIME, TIMESTAMP or TIME value the way the server
/// prints it in text results.
///
/// Text-protocol values are passed through. Binary-protocol values are a
/// length byte followed by the packed fields.
fn render_temporal(type_name: &str, bytes: &[u8]) -> DriverResult<String> {
    match bytes.first() {
        None => Err(format!("empty {} value", type_name).into()),
        Some(b) if b.is_ascii_digit() || *b == b'-' => Ok(std::str::from_utf8(bytes)?.to_string()),
        Some(len) => {
            let fields = &bytes[1..];
            if fields.len() != usize::from(*len) {
                return Err(format!(
                    "{} value has length {} but carries {} bytes",
                    type_name,
                    len,
                    fields.len()
                )
                .into());
            }
            if type_name == "TIME" {
                render_time(fields)
            } else {
                render_datetime(type_name, fields)
            }
        }
    }
}

fn render_datetime(type_name: &str, b: &[u8]) -> DriverResult<String> {
    if !matches!(b.len(), 0 | 4 | 7 | 11) {
        return Err(format!("invalid {} length {}", type_name, b.len()).into());
    }

    let (year, month, day) = match b.len() {
        0 => (0, 0, 0),
        _ => (u16::from_le_bytes([b[0], b[1]]), b[2], b[3]),
    };
    let mut out = format!("{:04}-{:02}-{:02}", year, month, day);
    if type_name == "DATE" {
        return Ok(out);
    }

    let (hour, minute, second) = if b.len() >= 7 { (b[4], b[5], b[6]) } else { (0, 0, 0) };
    let micros = if b.len() == 11 {
        u32::from_le_bytes([b[7], b[8], b[9], b[10]])
    } else {
        0
    };
    out.push_str(&format!(" {:02}:{:02}:{:02}", hour, minute, second));
    push_micros(&mut out, micros);
    Ok(out)
}

fn render_time(b: &[u8]) -> DriverResult<String> {
    if !matches!(b.len(), 0 | 8 | 12) {
        return Err(format!("invalid TIME length {}", b.len()).into());
    }
    if b.is_empty() {
        return Ok("00:00:00".to_string());
    }

    let negative = b[0] == 1;
    let days = u32::from_le_bytes([b[1], b[2], b[3], b[4]]);
    let hours = u64::from(days) * 24 + u64::from(b[5]);
    let micros = if b.len() == 12 {
        u32::from_le_bytes([b[8], b[9], b[10], b[11]])
    } else {
        0
    };

    let mut out = format!(
        "{}{:02}:{:02}:{:02}",
        if negative { "-" } else { "" },
        hours,
        b[6],
        b[7]
    );
    push_micros(&mut out, micros);
    Ok(out)
}

fn push_micros(out: &mut String, micros: u32) {
    if micros > 0 {
        out.push_str(&format!(".{:06}", micros));
    }
}
