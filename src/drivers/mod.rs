mod in_memory_test;
mod mysql;
mod tokio_postgres;

pub use self::in_memory_test::{
    ExecutionPath, InMemoryTestDriver, InMemoryTestError, InMemoryTestResponseBuilder,
    RecordedQuery,
};
pub use self::mysql::MySqlDriver;
pub use self::tokio_postgres::TokioPostgresDriver;
