//! dblib - A thin convenience layer over MySQL and PostgreSQL clients
//!
//! # Example
//! ```ignore
//! use dblib::{BindMap, DataSet, DataSetKind, DbLib, Row};
//!
//! // Connect using a JSON config file
//! let db = DbLib::from_config_file("dblib.json").await?;
//! let executor = db.executor();
//!
//! // Build and run an INSERT
//! let statement = DataSet::new(DataSetKind::Insert, [("name", "John"), ("city", "Oslo")])?
//!     .insert("clients")?;
//! executor.execute_statement(&statement).await?;
//!
//! // Fetch rows as column/value maps
//! let row: Option<Row> = executor
//!     .execute_bound_single_return(
//!         "SELECT * FROM `clients` WHERE `name` = :name",
//!         &BindMap::new().with("name", "John"),
//!     )
//!     .await?;
//! ```

pub mod builders;
pub mod config;
pub mod drivers;
pub mod error;
pub mod executor;
pub mod prepared;
pub mod sql;
pub mod traits;
pub mod types;

mod client;

// Re-export main types for convenient access
pub use builders::{DataSet, DataSetKind, Statement};
pub use client::DbLib;
pub use config::{load_config, ConnectionConfig, ConnectionOptions, DriverKind};
pub use error::{DbLibError, Result};
pub use executor::Executor;
pub use prepared::PreparedStatements;
pub use sql::Dialect;
pub use traits::DatabaseDriver;
pub use types::{BindMap, FromRow, QueryResult, RawQueryResult, Row, SqlValue};
