//! JSON configuration for opening a connection.
//!
//! The file holds a single top-level `dblibConfig` object:
//!
//! ```json
//! {
//!   "dblibConfig": {
//!     "hostName": "127.0.0.1",
//!     "port": "3306",
//!     "username": "app",
//!     "password": "secret",
//!     "database": "shop",
//!     "pdoAttributes": [
//!       { "PDO::ATTR_CASE": "PDO::CASE_LOWER" }
//!     ]
//!   }
//! }
//! ```

mod attributes;

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DbLibError, Result};
use crate::sql::Dialect;

pub use attributes::{ColumnCase, ConnectionOptions, DriverAttribute, NullHandling};

const CONFIG_KEY: &str = "dblibConfig";

/// Which driver a configuration connects through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriverKind {
    #[default]
    MySql,
    Postgres,
}

impl DriverKind {
    fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(DriverKind::MySql),
            "pgsql" | "postgres" | "postgresql" => Ok(DriverKind::Postgres),
            other => Err(DbLibError::ConfigMalformed(format!(
                "unknown driver {:?}",
                other
            ))),
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DriverKind::MySql => Dialect::MySql,
            DriverKind::Postgres => Dialect::Postgres,
        }
    }

    fn dsn_prefix(&self) -> &'static str {
        match self {
            DriverKind::MySql => "mysql",
            DriverKind::Postgres => "pgsql",
        }
    }
}

/// Validated connection settings.
#[derive(Clone, PartialEq)]
pub struct ConnectionConfig {
    pub driver: DriverKind,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    pub attributes: Vec<DriverAttribute>,
}

impl ConnectionConfig {
    /// Parses and validates the contents of a config file.
    pub fn from_json(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| DbLibError::ConfigMalformed(e.to_string()))?;

        let section = match root.get(CONFIG_KEY) {
            Some(Value::Object(map)) if !map.is_empty() => Value::Object(map.clone()),
            _ => {
                return Err(DbLibError::ConfigMalformed(format!(
                    "missing top-level {} object",
                    CONFIG_KEY
                )))
            }
        };

        let raw: RawConfig = serde_json::from_value(section)
            .map_err(|e| DbLibError::ConfigMalformed(e.to_string()))?;
        raw.validate()
    }

    /// Driver connection string, without credentials.
    pub fn dsn(&self) -> String {
        let mut dsn = format!(
            "{}:host={};port={}",
            self.driver.dsn_prefix(),
            self.host,
            self.port
        );
        if let Some(database) = &self.database {
            dsn.push_str(";dbname=");
            dsn.push_str(database);
        }
        dsn
    }

    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions::from_attributes(&self.attributes)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Reads and validates a JSON config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ConnectionConfig> {
    let path = path.as_ref();
    tracing::debug!("Loading dblib config from: {}", path.display());

    if !path.is_file() {
        return Err(DbLibError::ConfigNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|_| DbLibError::ConfigNotFound(path.to_path_buf()))?;

    ConnectionConfig::from_json(&text)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    driver: Option<String>,
    host_name: Option<String>,
    port: Option<PortValue>,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
    pdo_attributes: Option<Vec<serde_json::Map<String, Value>>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

impl RawConfig {
    fn validate(self) -> Result<ConnectionConfig> {
        let host = required(self.host_name, "hostName")?;
        let port = match self.port {
            None => return Err(DbLibError::MissingConfigField("port")),
            Some(PortValue::Text(s)) if s.trim().is_empty() => {
                return Err(DbLibError::MissingConfigField("port"))
            }
            Some(PortValue::Number(n)) => parse_port(&n.to_string())?,
            Some(PortValue::Text(s)) => parse_port(&s)?,
        };
        let username = required(self.username, "username")?;
        let password = required(self.password, "password")?;

        let driver = match self.driver.as_deref() {
            Some(name) if !name.trim().is_empty() => DriverKind::parse(name)?,
            _ => DriverKind::default(),
        };

        let database = self.database.filter(|d| !d.is_empty());

        let mut attributes = Vec::new();
        for entry in self.pdo_attributes.unwrap_or_default() {
            for (name, value) in entry {
                let value = match value {
                    Value::Null => continue,
                    Value::String(s) if s.is_empty() => continue,
                    Value::String(s) => s,
                    other => {
                        return Err(DbLibError::UnsupportedAttributeValue {
                            attribute: name,
                            value: other.to_string(),
                        })
                    }
                };
                attributes.push(DriverAttribute::resolve(&name, &value)?);
            }
        }

        Ok(ConnectionConfig {
            driver,
            host,
            port,
            username,
            password,
            database,
            attributes,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DbLibError::MissingConfigField(field)),
    }
}

fn parse_port(s: &str) -> Result<u16> {
    match s.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(DbLibError::ConfigMalformed(format!("invalid port {:?}", s))),
    }
}
