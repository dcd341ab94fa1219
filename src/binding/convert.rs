//! Conversion between field text and typed values

use super::content::{ScalarKind, Value};
use std::fmt;

/// A value that could not be converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError(pub String);

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConversionError {}

/// Converts between field text and scalar values
///
/// Used for every mapped field that has no formatter.
pub trait Converter {
    /// Convert field text into a value of the given kind
    fn to_value(&self, text: &str, kind: ScalarKind) -> Result<Value, ConversionError>;

    /// Convert a scalar value into field text
    fn to_text(&self, value: &Value) -> Result<String, ConversionError>;
}

/// Converter built on the standard parsing and display rules
///
/// Booleans accept `true`/`false` in any case.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConverter;

impl Converter for DefaultConverter {
    fn to_value(&self, text: &str, kind: ScalarKind) -> Result<Value, ConversionError> {
        match kind {
            ScalarKind::String => Ok(Value::String(text.to_string())),
            ScalarKind::Integer => text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| ConversionError(format!("'{}' is not an integer: {}", text, e))),
            ScalarKind::Decimal => text
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| ConversionError(format!("'{}' is not a decimal: {}", text, e))),
            ScalarKind::Boolean => {
                if text.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(ConversionError(format!("'{}' is not a boolean", text)))
                }
            }
        }
    }

    fn to_text(&self, value: &Value) -> Result<String, ConversionError> {
        match value {
            Value::Nil => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(n) => Ok(n.to_string()),
            Value::String(s) => Ok(s.clone()),
            Value::Record(_) | Value::List(_) | Value::Windowed(_) => Err(ConversionError(
                format!("a {} can not be written as text", kind_name(value)),
            )),
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Record(_) => "record",
        Value::List(_) | Value::Windowed(_) => "list",
        _ => "scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_value() {
        let c = DefaultConverter;
        assert_eq!(c.to_value("42", ScalarKind::Integer), Ok(Value::Int(42)));
        assert_eq!(c.to_value("-1.5", ScalarKind::Decimal), Ok(Value::Float(-1.5)));
        assert_eq!(c.to_value("TRUE", ScalarKind::Boolean), Ok(Value::Bool(true)));
        assert_eq!(c.to_value("abc", ScalarKind::String), Ok(Value::string("abc")));
        assert!(c.to_value("4x", ScalarKind::Integer).is_err());
        assert!(c.to_value("yes", ScalarKind::Boolean).is_err());
    }

    #[test]
    fn test_to_text() {
        let c = DefaultConverter;
        assert_eq!(c.to_text(&Value::Int(7)).unwrap(), "7");
        assert_eq!(c.to_text(&Value::Float(31.0)).unwrap(), "31");
        assert_eq!(c.to_text(&Value::Nil).unwrap(), "");
        assert!(c.to_text(&Value::List(vec![])).is_err());
    }
}
