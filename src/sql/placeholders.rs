use crate::error::{DbLibError, Result};
use crate::sql::Dialect;
use crate::types::{BindMap, SqlValue};

/// A SQL template split around its `:name` placeholders.
///
/// Placeholders are `:` followed by `[A-Za-z0-9_]+`. Quoted strings, quoted
/// identifiers, comments, `::` casts and `:=` assignments are left alone.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSql {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    /// Placeholder name including its `:` sentinel.
    Placeholder(String),
}

/// A template rewritten into a driver's positional form.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl NamedSql {
    pub fn parse(sql: &str, dialect: Dialect) -> Self {
        let bytes = sql.as_bytes();
        let mut segments = Vec::new();
        let mut text_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                q @ (b'\'' | b'"' | b'`') => {
                    let backslash_escapes = dialect == Dialect::MySql && q != b'`';
                    i = skip_quoted(bytes, i, backslash_escapes);
                }
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    i = bytes[i..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(bytes.len(), |p| i + p + 1);
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    i = bytes[i + 2..]
                        .windows(2)
                        .position(|w| w == b"*/")
                        .map_or(bytes.len(), |p| i + 2 + p + 2);
                }
                b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
                b':' => {
                    let name_len = bytes[i + 1..]
                        .iter()
                        .take_while(|b| is_placeholder_byte(**b))
                        .count();
                    if name_len == 0 {
                        i += 1;
                        continue;
                    }
                    if text_start < i {
                        segments.push(Segment::Text(sql[text_start..i].to_string()));
                    }
                    let end = i + 1 + name_len;
                    segments.push(Segment::Placeholder(sql[i..end].to_string()));
                    text_start = end;
                    i = end;
                }
                _ => i += 1,
            }
        }

        if text_start < sql.len() {
            segments.push(Segment::Text(sql[text_start..].to_string()));
        }

        Self { segments }
    }

    /// Distinct placeholder names, sentinel included, in order of first use.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Rewrites the template for `dialect`, pulling each placeholder's value
    /// from `binds`.
    ///
    /// Every placeholder needs an entry and every entry needs a placeholder.
    pub fn compile(&self, binds: &BindMap, dialect: Dialect) -> Result<CompiledSql> {
        let names = self.placeholders();
        if let Some(extra) = binds.keys().find(|k| !names.contains(k)) {
            return Err(DbLibError::BindFailed(format!(
                "bound value {} has no matching placeholder",
                extra
            )));
        }

        let mut sql = String::new();
        let mut params = Vec::new();
        let mut positions: Vec<(&str, usize)> = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Placeholder(name) => {
                    let value = binds.get(name).ok_or_else(|| {
                        DbLibError::BindFailed(format!("no value bound for placeholder {}", name))
                    })?;
                    if dialect.reuses_positions() {
                        if let Some((_, index)) = positions.iter().find(|(n, _)| n == name) {
                            sql.push_str(&dialect.placeholder(*index));
                            continue;
                        }
                    }
                    params.push(value.clone());
                    positions.push((name, params.len()));
                    sql.push_str(&dialect.placeholder(params.len()));
                }
            }
        }

        Ok(CompiledSql { sql, params })
    }
}

/// Parses and compiles in one step.
pub fn compile(sql: &str, binds: &BindMap, dialect: Dialect) -> Result<CompiledSql> {
    NamedSql::parse(sql, dialect).compile(binds, dialect)
}

pub(crate) fn is_placeholder_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Returns the index just past the closing quote, or the end of input.
fn skip_quoted(bytes: &[u8], start: usize, backslash_escapes: bool) -> usize {
    let quote = bytes[start];
    let mut j = start + 1;
    while j < bytes.len() {
        let b = bytes[j];
        if backslash_escapes && b == b'\\' {
            j += 2;
        } else if b == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
            } else {
                return j + 1;
            }
        } else {
            j += 1;
        }
    }
    bytes.len()
}
