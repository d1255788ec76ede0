use std::fmt::Write as _;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use tokio_postgres::types::{to_sql_checked, Format, FromSql, IsNull, Kind, ToSql, Type};
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::error::{BoxError, DbLibError, Result};
use crate::sql::Dialect;
use crate::traits::{DatabaseDriver, DriverResult};
use crate::types::{RawQueryResult, SqlValue};

type Param = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL driver implementation using tokio-postgres.
pub struct TokioPostgresDriver {
    client: Client,
}

impl TokioPostgresDriver {
    /// Connect to a PostgreSQL database.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .user(&config.username)
            .password(&config.password);
        if let Some(database) = &config.database {
            pg_config.dbname(database);
        }

        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| DbLibError::ConnectionFailed(e.into()))?;

        // Spawn the connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self { client })
    }
}

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute_raw(&self, sql: &str) -> DriverResult<RawQueryResult> {
        tracing::debug!(sql, "executing raw statement");
        let messages = self.client.simple_query(sql).await?;

        let mut result = RawQueryResult::empty();
        for message in messages {
            match message {
                SimpleQueryMessage::Row(row) => {
                    if result.columns.is_empty() {
                        result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    let values = (0..row.len())
                        .map(|i| row.get(i).map_or(SqlValue::Null, SqlValue::from))
                        .collect();
                    result.rows.push(values);
                }
                SimpleQueryMessage::CommandComplete(n) => result.rows_affected += n,
                _ => {}
            }
        }
        Ok(result)
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> DriverResult<RawQueryResult> {
        tracing::debug!(sql, params = params.len(), "executing prepared statement");
        let statement = self.client.prepare(sql).await?;

        // Convert SqlValue params to the types the server inferred
        let converted_params: Vec<Param> = params
            .iter()
            .zip(statement.params())
            .map(|(v, ty)| sql_value_to_tosql(v, ty))
            .collect::<std::result::Result<_, _>>()?;

        let param_refs: Vec<&(dyn ToSql + Sync)> = converted_params
            .iter()
            .map(|b| b.as_ref() as &(dyn ToSql + Sync))
            .collect();

        if statement.columns().is_empty() {
            let rows_affected = self.client.execute(&statement, &param_refs).await?;
            return Ok(RawQueryResult::affected(rows_affected));
        }

        let rows = self.client.query(&statement, &param_refs).await?;

        // Extract column names
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let result_rows: Vec<Vec<SqlValue>> = rows
            .iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(i, col)| row_value(row, i, col.type_()))
                    .collect::<DriverResult<_>>()
            })
            .collect::<DriverResult<_>>()?;

        let mut result = RawQueryResult::new(columns, result_rows);
        result.rows_affected = rows.len() as u64;
        Ok(result)
    }
}

/// Convert a SqlValue to a boxed ToSql trait object matching the parameter type.
fn sql_value_to_tosql(value: &SqlValue, ty: &Type) -> std::result::Result<Param, BoxError> {
    let param: Param = match *ty {
        Type::INT2 => Box::new(as_int(value, ty)?.map(i16::try_from).transpose()?),
        Type::INT4 => Box::new(as_int(value, ty)?.map(i32::try_from).transpose()?),
        Type::INT8 => Box::new(as_int(value, ty)?),
        Type::FLOAT4 => Box::new(as_float(value, ty)?.map(|f| f as f32)),
        Type::FLOAT8 => Box::new(as_float(value, ty)?),
        Type::BOOL => Box::new(as_bool(value, ty)?),
        _ => Box::new(TextParam(match value {
            SqlValue::Null => None,
            other => Some(other.to_string()),
        })),
    };
    Ok(param)
}

/// A parameter sent in text format, leaving the server to parse it as
/// whatever type the statement expects (numeric, date, uuid, ...).
#[derive(Debug)]
struct TextParam(Option<String>);

impl ToSql for TextParam {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match &self.0 {
            None => Ok(IsNull::Yes),
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

fn mismatch(value: &SqlValue, ty: &Type) -> BoxError {
    format!("cannot bind {:?} to a parameter of type {}", value, ty).into()
}

fn as_int(value: &SqlValue, ty: &Type) -> std::result::Result<Option<i64>, BoxError> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Bool(b) => Ok(Some(i64::from(*b))),
        other => other.as_i64().map(Some).ok_or_else(|| mismatch(value, ty)),
    }
}

fn as_float(value: &SqlValue, ty: &Type) -> std::result::Result<Option<f64>, BoxError> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Float64(f) => Ok(Some(*f)),
        SqlValue::Int32(i) => Ok(Some(f64::from(*i))),
        SqlValue::Int64(i) => Ok(Some(*i as f64)),
        SqlValue::Text(s) => s.trim().parse().map(Some).map_err(|_| mismatch(value, ty)),
        SqlValue::Bool(_) => Err(mismatch(value, ty)),
    }
}

fn as_bool(value: &SqlValue, ty: &Type) -> std::result::Result<Option<bool>, BoxError> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Bool(b) => Ok(Some(*b)),
        SqlValue::Int32(i) => Ok(Some(*i != 0)),
        SqlValue::Int64(i) => Ok(Some(*i != 0)),
        SqlValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "1" => Ok(Some(true)),
            "f" | "false" | "0" => Ok(Some(false)),
            _ => Err(mismatch(value, ty)),
        },
        SqlValue::Float64(_) => Err(mismatch(value, ty)),
    }
}

/// The undecoded bytes of a column, whatever its type.
struct RawColumn<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawColumn<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(RawColumn(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Convert a row value at a given index to a SqlValue.
fn row_value(row: &tokio_postgres::Row, index: usize, type_: &Type) -> DriverResult<SqlValue> {
    let raw = row.try_get::<_, Option<RawColumn<'_>>>(index)?;
    decode_column(type_, raw.map(|r| r.0)).map_err(|e| {
        let column = row.columns()[index].name();
        BoxError::from(format!("cannot decode column `{}` of type {}: {}", column, type_, e))
    })
}

/// Decode binary column bytes. Types without a native counterpart come back
/// as text in the server's own output format.
fn decode_column(ty: &Type, raw: Option<&[u8]>) -> DriverResult<SqlValue> {
    let Some(raw) = raw else {
        return Ok(SqlValue::Null);
    };

    let value = match *ty {
        Type::INT2 => SqlValue::Int32(i32::from(i16::from_sql(ty, raw)?)),
        Type::INT4 => SqlValue::Int32(i32::from_sql(ty, raw)?),
        Type::INT8 => SqlValue::Int64(i64::from_sql(ty, raw)?),
        Type::OID => SqlValue::Int64(i64::from(u32::from_sql(ty, raw)?)),
        Type::FLOAT4 => SqlValue::Float64(f64::from(f32::from_sql(ty, raw)?)),
        Type::FLOAT8 => SqlValue::Float64(f64::from_sql(ty, raw)?),
        Type::BOOL => SqlValue::Bool(bool::from_sql(ty, raw)?),
        Type::NUMERIC => SqlValue::Text(render_numeric(raw)?),
        Type::DATE => SqlValue::Text(NaiveDate::from_sql(ty, raw)?.format("%Y-%m-%d").to_string()),
        Type::TIME => {
            let time = NaiveTime::from_sql(ty, raw)?;
            SqlValue::Text(with_fraction(time.format("%H:%M:%S").to_string(), time.nanosecond()))
        }
        Type::TIMESTAMP => {
            let ts = NaiveDateTime::from_sql(ty, raw)?;
            SqlValue::Text(with_fraction(
                ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                ts.nanosecond(),
            ))
        }
        Type::TIMESTAMPTZ => {
            let ts = DateTime::<Utc>::from_sql(ty, raw)?;
            let mut text = with_fraction(
                ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                ts.nanosecond(),
            );
            text.push_str("+00");
            SqlValue::Text(text)
        }
        Type::UUID => SqlValue::Text(Uuid::from_sql(ty, raw)?.to_string()),
        Type::JSON | Type::JSONB => SqlValue::Text(serde_json::Value::from_sql(ty, raw)?.to_string()),
        _ if <String as FromSql>::accepts(ty) => SqlValue::Text(String::from_sql(ty, raw)?),
        _ if matches!(ty.kind(), Kind::Enum(_)) => SqlValue::Text(std::str::from_utf8(raw)?.to_string()),
        _ => return Err(format!("unsupported column type {}", ty).into()),
    };
    Ok(value)
}

/// Appends fractional seconds as the server prints them: microsecond
/// precision, trailing zeros dropped.
fn with_fraction(mut text: String, nanos: u32) -> String {
    let micros = nanos / 1_000;
    if micros > 0 {
        let fraction = format!("{:06}", micros);
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render a binary `numeric` as its decimal text.
///
/// The wire form is a header of digit count, weight, sign and display scale,
/// then base-10000 digits with the first one at 10000^weight.
fn render_numeric(raw: &[u8]) -> DriverResult<String> {
    if raw.len() < 8 {
        return Err("numeric value is too short".into());
    }
    let ndigits = usize::from(u16::from_be_bytes([raw[0], raw[1]]));
    let weight = i32::from(i16::from_be_bytes([raw[2], raw[3]]));
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = usize::from(u16::from_be_bytes([raw[6], raw[7]]));

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid numeric sign {:#06x}", other).into()),
    }
    if raw.len() != 8 + ndigits * 2 {
        return Err("numeric digit count does not match its length".into());
    }

    let digits: Vec<u16> = raw[8..]
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    let digit = |i: i32| -> u16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                write!(out, "{}", digit(i))?;
            } else {
                write!(out, "{:04}", digit(i))?;
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        let mut i = weight + 1;
        while fraction.len() < dscale {
            write!(fraction, "{:04}", digit(i))?;
            i += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn decode(ty: &Type, raw: &[u8]) -> SqlValue {
        decode_column(ty, Some(raw)).unwrap()
    }

    fn bind(value: impl Into<SqlValue>, ty: &Type) -> std::result::Result<(Vec<u8>, Format), BoxError> {
        let param = sql_value_to_tosql(&value.into(), ty)?;
        let mut buf = BytesMut::new();
        match param.to_sql_checked(ty, &mut buf)? {
            IsNull::Yes => assert!(buf.is_empty()),
            IsNull::No => {}
        }
        Ok((buf.to_vec(), param.encode_format(ty)))
    }

    #[test]
    fn test_bind_native_types() {
        let (bytes, format) = bind("42", &Type::INT4).unwrap();
        assert_eq!(bytes, 42i32.to_be_bytes());
        assert!(matches!(format, Format::Binary));

        let (bytes, _) = bind(7, &Type::INT8).unwrap();
        assert_eq!(bytes, 7i64.to_be_bytes());

        let (bytes, _) = bind("1.5", &Type::FLOAT8).unwrap();
        assert_eq!(bytes, 1.5f64.to_be_bytes());

        let (bytes, _) = bind("true", &Type::BOOL).unwrap();
        assert_eq!(bytes, [1]);
    }

    #[test]
    fn test_bind_other_types_as_text() {
        for ty in [Type::DATE, Type::NUMERIC, Type::TIMESTAMP, Type::UUID, Type::TEXT] {
            let (bytes, format) = bind("2024-01-01", &ty).unwrap();
            assert_eq!(bytes, b"2024-01-01");
            assert!(matches!(format, Format::Text));
        }

        let (bytes, format) = bind(12, &Type::NUMERIC).unwrap();
        assert_eq!(bytes, b"12");
        assert!(matches!(format, Format::Text));

        let (bytes, _) = bind(SqlValue::Null, &Type::DATE).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_bind_rejects_mismatched_values() {
        assert!(bind("abc", &Type::INT4).is_err());
        assert!(bind(70000, &Type::INT2).is_err());
        assert!(bind("maybe", &Type::BOOL).is_err());
        assert!(bind(true, &Type::FLOAT8).is_err());
    }

    #[test]
    fn test_value_coercions() {
        assert_eq!(as_int(&SqlValue::from(" 12 "), &Type::INT4).unwrap(), Some(12));
        assert!(as_int(&SqlValue::Float64(1.5), &Type::INT4).is_err());
        assert_eq!(as_int(&SqlValue::from("12"), &Type::INT4).unwrap(), Some(12));
        assert_eq!(as_int(&SqlValue::Bool(true), &Type::INT4).unwrap(), Some(1));
        assert_eq!(as_int(&SqlValue::Null, &Type::INT4).unwrap(), None);
        assert_eq!(as_float(&SqlValue::Int32(3), &Type::FLOAT8).unwrap(), Some(3.0));
        assert_eq!(as_bool(&SqlValue::from("F"), &Type::BOOL).unwrap(), Some(false));
        assert_eq!(as_bool(&SqlValue::Int64(2), &Type::BOOL).unwrap(), Some(true));
    }

    #[test]
    fn test_decode_native_types() {
        assert_eq!(decode(&Type::INT2, &5i16.to_be_bytes()), SqlValue::Int32(5));
        assert_eq!(decode(&Type::INT8, &9i64.to_be_bytes()), SqlValue::Int64(9));
        assert_eq!(decode(&Type::FLOAT8, &2.5f64.to_be_bytes()), SqlValue::Float64(2.5));
        assert_eq!(decode(&Type::BOOL, &[0]), SqlValue::Bool(false));
        assert_eq!(decode_column(&Type::NUMERIC, None).unwrap(), SqlValue::Null);
        assert_eq!(decode(&Type::VARCHAR, b"hello"), SqlValue::from("hello"));
    }

    #[test]
    fn test_decode_temporal_and_uuid() {
        // days since 2000-01-01
        let date = 8830i32.to_be_bytes();
        assert_eq!(decode(&Type::DATE, &date), SqlValue::from("2024-03-05"));

        // microseconds since 2000-01-01 00:00:00
        let micros = 8830i64 * 86_400_000_000 + 37_230_000_000 + 500_000;
        assert_eq!(
            decode(&Type::TIMESTAMP, &micros.to_be_bytes()),
            SqlValue::from("2024-03-05 10:20:30.5")
        );
        assert_eq!(
            decode(&Type::TIMESTAMPTZ, &micros.to_be_bytes()),
            SqlValue::from("2024-03-05 10:20:30.5+00")
        );

        let time = 37_230_000_000i64.to_be_bytes();
        assert_eq!(decode(&Type::TIME, &time), SqlValue::from("10:20:30"));

        let uuid: [u8; 16] = [
            0x67, 0xe5, 0x50, 0x44, 0x10, 0xb1, 0x42, 0x6f, 0x92, 0x47, 0xbb, 0x68, 0x0e, 0x5f,
            0xe0, 0xc8,
        ];
        assert_eq!(
            decode(&Type::UUID, &uuid),
            SqlValue::from("67e55044-10b1-426f-9247-bb680e5fe0c8")
        );
    }

    #[test]
    fn test_decode_json() {
        let mut jsonb = vec![1u8];
        jsonb.extend_from_slice(br#"{"a":1}"#);
        assert_eq!(decode(&Type::JSONB, &jsonb), SqlValue::from(r#"{"a":1}"#));
    }

    #[test]
    fn test_decode_unsupported_type_is_an_error() {
        let bytea: &[u8] = &[0xde, 0xad];
        assert!(decode_column(&Type::BYTEA, Some(bytea)).is_err());
        let short: &[u8] = &[0, 1];
        assert!(decode_column(&Type::INT4, Some(short)).is_err());
    }

    #[test]
    fn test_render_numeric() {
        assert_eq!(render_numeric(&numeric(0, NUMERIC_POS, 2, &[123, 4500])).unwrap(), "123.45");
        assert_eq!(render_numeric(&numeric(0, NUMERIC_POS, 0, &[])).unwrap(), "0");
        assert_eq!(render_numeric(&numeric(1, NUMERIC_POS, 0, &[2])).unwrap(), "20000");
        assert_eq!(render_numeric(&numeric(1, NUMERIC_POS, 0, &[1234, 5678])).unwrap(), "12345678");
        assert_eq!(render_numeric(&numeric(-1, NUMERIC_NEG, 1, &[5000])).unwrap(), "-0.5");
        assert_eq!(render_numeric(&numeric(-2, NUMERIC_POS, 8, &[1234])).unwrap(), "0.00001234");
        assert_eq!(render_numeric(&numeric(0, NUMERIC_NAN, 0, &[])).unwrap(), "NaN");
        assert!(render_numeric(&[0, 1]).is_err());
        assert!(render_numeric(&numeric(0, 0x1234, 0, &[])).is_err());
    }
}
