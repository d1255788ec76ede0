use crate::error::{DbLibError, Result};

/// Case applied to result column names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnCase {
    #[default]
    Natural,
    Lower,
    Upper,
}

/// Conversion applied to NULL and empty-string result values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NullHandling {
    #[default]
    Natural,
    EmptyStringToNull,
    NullToEmptyString,
}

/// A post-connect driver attribute resolved from the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverAttribute {
    Case(ColumnCase),
    Nulls(NullHandling),
    /// Errors are always surfaced as `DbLibError`; only the exception mode
    /// is accepted and it changes nothing.
    ErrorModeException,
}

/// Effect of the applied driver attributes on fetched rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub column_case: ColumnCase,
    pub nulls: NullHandling,
}

impl ConnectionOptions {
    /// Applies attributes in order; a later attribute overrides an earlier one.
    pub fn from_attributes(attributes: &[DriverAttribute]) -> Self {
        let mut options = Self::default();
        for attribute in attributes {
            match *attribute {
                DriverAttribute::Case(case) => options.column_case = case,
                DriverAttribute::Nulls(nulls) => options.nulls = nulls,
                DriverAttribute::ErrorModeException => {}
            }
        }
        options
    }
}

impl DriverAttribute {
    /// Resolves an attribute name and value pair, e.g.
    /// `("PDO::ATTR_CASE", "PDO::CASE_LOWER")`. The `PDO::` prefix is optional.
    pub fn resolve(name: &str, value: &str) -> Result<Self> {
        let unsupported = || DbLibError::UnsupportedAttributeValue {
            attribute: name.to_string(),
            value: value.to_string(),
        };

        match strip_prefix(name) {
            "ATTR_CASE" => match strip_prefix(value) {
                "CASE_NATURAL" => Ok(DriverAttribute::Case(ColumnCase::Natural)),
                "CASE_LOWER" => Ok(DriverAttribute::Case(ColumnCase::Lower)),
                "CASE_UPPER" => Ok(DriverAttribute::Case(ColumnCase::Upper)),
                _ => Err(unsupported()),
            },
            "ATTR_ORACLE_NULLS" => match strip_prefix(value) {
                "NULL_NATURAL" => Ok(DriverAttribute::Nulls(NullHandling::Natural)),
                "NULL_EMPTY_STRING" => Ok(DriverAttribute::Nulls(NullHandling::EmptyStringToNull)),
                "NULL_TO_STRING" => Ok(DriverAttribute::Nulls(NullHandling::NullToEmptyString)),
                _ => Err(unsupported()),
            },
            "ATTR_ERRMODE" => match strip_prefix(value) {
                "ERRMODE_EXCEPTION" => Ok(DriverAttribute::ErrorModeException),
                _ => Err(unsupported()),
            },
            _ => Err(DbLibError::UnknownAttribute(name.to_string())),
        }
    }
}

fn strip_prefix(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("PDO::").unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_attributes() {
        assert_eq!(
            DriverAttribute::resolve("PDO::ATTR_CASE", "PDO::CASE_LOWER").unwrap(),
            DriverAttribute::Case(ColumnCase::Lower)
        );
        assert_eq!(
            DriverAttribute::resolve("ATTR_ORACLE_NULLS", "NULL_TO_STRING").unwrap(),
            DriverAttribute::Nulls(NullHandling::NullToEmptyString)
        );
        assert_eq!(
            DriverAttribute::resolve("PDO::ATTR_ERRMODE", "PDO::ERRMODE_EXCEPTION").unwrap(),
            DriverAttribute::ErrorModeException
        );
    }

    #[test]
    fn test_resolve_rejects_unknown() {
        assert!(matches!(
            DriverAttribute::resolve("PDO::ATTR_PERSISTENT", "true"),
            Err(DbLibError::UnknownAttribute(ref n)) if n == "PDO::ATTR_PERSISTENT"
        ));
        assert!(matches!(
            DriverAttribute::resolve("PDO::ATTR_ERRMODE", "PDO::ERRMODE_SILENT"),
            Err(DbLibError::UnsupportedAttributeValue { .. })
        ));
    }

    #[test]
    fn test_later_attribute_wins() {
        let options = ConnectionOptions::from_attributes(&[
            DriverAttribute::Case(ColumnCase::Upper),
            DriverAttribute::ErrorModeException,
            DriverAttribute::Case(ColumnCase::Lower),
        ]);
        assert_eq!(options.column_case, ColumnCase::Lower);
        assert_eq!(options.nulls, NullHandling::Natural);
    }
}
