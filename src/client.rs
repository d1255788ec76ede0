use std::path::Path;
use std::sync::Arc;

use crate::config::{load_config, ConnectionConfig, ConnectionOptions, DriverKind};
use crate::drivers::{MySqlDriver, TokioPostgresDriver};
use crate::error::Result;
use crate::executor::Executor;
use crate::prepared::PreparedStatements;
use crate::traits::DatabaseDriver;

/// Main entry point for dblib.
/// Holds one database connection and hands out executors that share it.
#[derive(Clone)]
pub struct DbLib {
    driver: Arc<dyn DatabaseDriver>,
    options: ConnectionOptions,
}

impl DbLib {
    /// Load a JSON config file and connect with it.
    ///
    /// # Example
    /// ```ignore
    /// let db = DbLib::from_config_file("/etc/app/dblib.json").await?;
    /// ```
    pub async fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = load_config(path)?;
        Self::connect(&config).await
    }

    /// Open a connection through the driver named in `config` and apply its
    /// driver attributes.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        tracing::info!(dsn = %config.dsn(), driver = ?config.driver, "connecting to database");

        let driver: Arc<dyn DatabaseDriver> = match config.driver {
            DriverKind::MySql => Arc::new(MySqlDriver::connect(config).await?),
            DriverKind::Postgres => Arc::new(TokioPostgresDriver::connect(config).await?),
        };

        Ok(Self {
            driver,
            options: config.options(),
        })
    }

    /// Create a new client with a custom driver.
    /// Useful for testing or for a connection opened elsewhere.
    pub fn with_driver(driver: Arc<dyn DatabaseDriver>) -> Self {
        Self {
            driver,
            options: ConnectionOptions::default(),
        }
    }

    /// Replace the options applied to fetched rows.
    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Create an Executor for raw and bound statements.
    pub fn executor(&self) -> Executor {
        Executor::new(Arc::clone(&self.driver), self.options)
    }

    /// Create the prepared-statement helpers.
    pub fn prepared(&self) -> PreparedStatements {
        PreparedStatements::new(self.executor())
    }
}
