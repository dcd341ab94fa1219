//! Pluggable field formatters
//!
//! A field naming a `formatter` is converted by the registered [`Formatter`]
//! instead of the binding's converter. Formatters receive the field's extra
//! attributes, filtered down to the keys they declare.
//!
//! # Example
//!
//! ```rust
//! use flatbind::binding::formatter::*;
//! use flatbind::binding::content::Value;
//!
//! struct Upper;
//!
//! impl Formatter for Upper {
//!     fn name(&self) -> &str {
//!         "upper"
//!     }
//!
//!     fn unmarshal(&self, text: &str, _: &FormatterParams) -> Result<Value, FormatFailure> {
//!         Ok(Value::string(text.to_lowercase()))
//!     }
//!
//!     fn marshal(&self, value: &Value, _: &FormatterParams) -> Result<String, FormatFailure> {
//!         value
//!             .as_str()
//!             .map(str::to_uppercase)
//!             .ok_or_else(|| FormatFailure::new("expected text"))
//!     }
//! }
//!
//! let mut registry = FormatterRegistry::default();
//! registry.register(Upper);
//! assert!(registry.contains("upper"));
//! assert!(registry.contains("implied-decimal"));
//! ```

use super::content::Value;
use super::error::{BindingError, Result};
use super::schema::{Field, Fragment, Record};
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Formatter Trait
// ============================================================================

/// Failure reported by a formatter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatFailure(String);

impl FormatFailure {
    /// Create a failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        FormatFailure(message.into())
    }
}

impl fmt::Display for FormatFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FormatFailure {}

/// Parameters handed to a formatter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatterParams {
    values: BTreeMap<String, String>,
}

impl FormatterParams {
    /// Collect the attributes of `field` that `formatter` declares
    pub fn for_field(field: &Field, formatter: &dyn Formatter) -> Self {
        let declared = formatter.parameters();
        let values = field
            .other_attributes
            .iter()
            .filter(|(key, _)| declared.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { values }
    }

    /// Get a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a parameter or a default
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Set a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// Converts a field's text to a value and back
pub trait Formatter {
    /// Registry key
    fn name(&self) -> &str;

    /// Attribute keys this formatter reads
    fn parameters(&self) -> &[&str] {
        &[]
    }

    /// Convert field text into a value
    fn unmarshal(&self, text: &str, params: &FormatterParams) -> std::result::Result<Value, FormatFailure>;

    /// Convert a value into field text
    fn marshal(&self, value: &Value, params: &FormatterParams) -> std::result::Result<String, FormatFailure>;
}

// ============================================================================
// Built-in Formatters
// ============================================================================

/// Booleans written as configurable texts (`true`/`false` by default)
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanFormatter;

impl Formatter for BooleanFormatter {
    fn name(&self) -> &str {
        "boolean"
    }

    fn parameters(&self) -> &[&str] {
        &["true", "false"]
    }

    fn unmarshal(&self, text: &str, params: &FormatterParams) -> std::result::Result<Value, FormatFailure> {
        let yes = params.get_or("true", "true");
        let no = params.get_or("false", "false");
        if text == yes {
            Ok(Value::Bool(true))
        } else if text == no {
            Ok(Value::Bool(false))
        } else {
            Err(FormatFailure::new(format!(
                "'{}' is neither '{}' nor '{}'",
                text, yes, no
            )))
        }
    }

    fn marshal(&self, value: &Value, params: &FormatterParams) -> std::result::Result<String, FormatFailure> {
        match value {
            Value::Bool(true) => Ok(params.get_or("true", "true").to_string()),
            Value::Bool(false) => Ok(params.get_or("false", "false").to_string()),
            Value::Nil => Ok(String::new()),
            other => Err(FormatFailure::new(format!("{} is not a boolean", other))),
        }
    }
}

/// Decimals stored without their decimal point
///
/// With the default `scale` of 2, `"012345"` reads as `123.45`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpliedDecimalFormatter;

impl ImpliedDecimalFormatter {
    fn scale(params: &FormatterParams) -> std::result::Result<i32, FormatFailure> {
        params
            .get_or("scale", "2")
            .parse::<i32>()
            .map_err(|e| FormatFailure::new(format!("invalid scale: {}", e)))
    }
}

impl Formatter for ImpliedDecimalFormatter {
    fn name(&self) -> &str {
        "implied-decimal"
    }

    fn parameters(&self) -> &[&str] {
        &["scale"]
    }

    fn unmarshal(&self, text: &str, params: &FormatterParams) -> std::result::Result<Value, FormatFailure> {
        let scale = Self::scale(params)?;
        let unscaled = text
            .trim()
            .parse::<i64>()
            .map_err(|e| FormatFailure::new(format!("'{}' is not a number: {}", text, e)))?;
        Ok(Value::Float(unscaled as f64 / 10f64.powi(scale)))
    }

    fn marshal(&self, value: &Value, params: &FormatterParams) -> std::result::Result<String, FormatFailure> {
        let scale = Self::scale(params)?;
        let number = match value {
            Value::Nil => return Ok(String::new()),
            other => other
                .as_float()
                .ok_or_else(|| FormatFailure::new(format!("{} is not a number", other)))?,
        };
        Ok(format!("{}", (number * 10f64.powi(scale)).round() as i64))
    }
}

// ============================================================================
// Formatter Registry
// ============================================================================

/// Formatters by registry key
#[derive(Clone)]
pub struct FormatterRegistry {
    formatters: HashMap<String, Rc<dyn Formatter>>,
}

impl FormatterRegistry {
    /// Create a registry without any formatters
    pub fn empty() -> Self {
        Self {
            formatters: HashMap::new(),
        }
    }

    /// Register a formatter under its own name, replacing any previous one
    pub fn register<F: Formatter + 'static>(&mut self, formatter: F) {
        self.formatters
            .insert(formatter.name().to_string(), Rc::new(formatter));
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<F: Formatter + 'static>(mut self, formatter: F) -> Self {
        self.register(formatter);
        self
    }

    /// Look up a formatter
    pub fn get(&self, key: &str) -> Option<&Rc<dyn Formatter>> {
        self.formatters.get(key)
    }

    /// Check if a formatter exists
    pub fn contains(&self, key: &str) -> bool {
        self.formatters.contains_key(key)
    }

    /// Get the number of registered formatters
    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    /// Check that every formatter named in a record tree is registered
    pub fn validate(&self, record: &Record) -> Result<()> {
        for child in &record.children {
            match child {
                Fragment::Record(nested) => self.validate(nested)?,
                Fragment::Field(field) => {
                    if let Some(key) = field.formatter.as_deref() {
                        if !self.contains(key) {
                            return Err(BindingError::Formatter {
                                formatter: key.to_string(),
                                fragment: field.to_string(),
                                cause: "no formatter registered under this key".to_string(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for FormatterRegistry {
    /// A registry holding the built-in formatters
    fn default() -> Self {
        Self::empty()
            .with(BooleanFormatter)
            .with(ImpliedDecimalFormatter)
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("FormatterRegistry")
            .field("formatters", &keys)
            .finish()
    }
}
