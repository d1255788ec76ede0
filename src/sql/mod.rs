mod dialect;
mod placeholders;

pub use dialect::Dialect;
pub(crate) use placeholders::is_placeholder_byte;
pub use placeholders::{compile, CompiledSql, NamedSql};
