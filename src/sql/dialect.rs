/// SQL flavor spoken by a driver.
///
/// Covers the handful of places where generated SQL differs between servers:
/// identifier quoting, the insert values keyword, and positional placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    #[default]
    MySql,
    Postgres,
}

impl Dialect {
    /// Quotes an identifier, doubling any embedded quote character.
    pub fn quote_identifier(&self, ident: &str) -> String {
        let quote = match self {
            Dialect::MySql => '`',
            Dialect::Postgres => '"',
        };
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(quote);
        for c in ident.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);
        out
    }

    pub fn values_keyword(&self) -> &'static str {
        match self {
            Dialect::MySql => "VALUE",
            Dialect::Postgres => "VALUES",
        }
    }

    /// Renders the positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${}", index),
        }
    }

    /// Whether a repeated named placeholder may refer back to an earlier
    /// positional parameter instead of binding the value again.
    pub fn reuses_positions(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::MySql.quote_identifier("test"), "`test`");
        assert_eq!(Dialect::MySql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(Dialect::Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(Dialect::MySql.placeholder(3), "?");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
    }
}
