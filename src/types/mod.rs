mod bind_map;
mod row;
mod sql_value;

pub use bind_map::BindMap;
pub use row::{FromRow, QueryResult, RawQueryResult, Row};
pub use sql_value::SqlValue;
