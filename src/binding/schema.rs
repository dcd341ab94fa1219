//! Schema types for flat bindings
//!
//! This module defines the in-memory representation of a binding definition:
//! a tree of [`Fragment`]s, each either a [`Record`] (a group of children with
//! repetition bounds) or a [`Field`] (a single scalar value).
//!
//! Definitions are usually loaded from JSON:
//!
//! ```json
//! {
//!   "complexType": "company",
//!   "children": [
//!     { "record": { "separator": "\\n", "children": [
//!         { "field": { "fixed": "H", "separator": ";" } },
//!         { "field": { "map": "name", "canEnd": true } }
//!     ] } }
//!   ]
//! }
//! ```
//!
//! or built in code with the builder methods on [`Record`] and [`Field`].

use super::error::{BindingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Default bound for delimiter lookahead (characters)
pub const DEFAULT_MAX_LOOK_AHEAD: usize = 1_024_000;

/// Replace the escaped forms `\n`, `\r` and `\t` with the real characters
pub fn normalize_separator(separator: &str) -> String {
    separator
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
}

/// How a fragment delimits the text it reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Read up to a separator
    Delimited,
    /// Read exactly this many characters
    Fixed(usize),
    /// Read to the end of the enclosing window (or the stream)
    Unbounded,
}

/// Attributes shared by records and fields
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentAttrs {
    /// Separator that terminates the fragment (escapes are normalized)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,

    /// When set, the separator is a pattern matched against exactly this many characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator_length: Option<usize>,

    /// Target path, absent for structural fragments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,

    /// Exact width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,

    /// Lookahead bound for the separator scan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Minimum width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Free-form description, used in messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FragmentAttrs {
    /// The read strategy selected by the present attributes
    #[inline]
    pub fn strategy(&self) -> ReadStrategy {
        match (&self.separator, self.length) {
            (Some(_), _) => ReadStrategy::Delimited,
            (None, Some(length)) => ReadStrategy::Fixed(length),
            (None, None) => ReadStrategy::Unbounded,
        }
    }

    /// The separator with escapes normalized
    #[inline]
    pub fn normalized_separator(&self) -> Option<String> {
        self.separator.as_deref().map(normalize_separator)
    }

    fn label(&self) -> &str {
        self.map
            .as_deref()
            .or(self.description.as_deref())
            .unwrap_or("")
    }
}

/// A node of the binding tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fragment {
    /// A group of child fragments
    Record(Record),
    /// A single scalar value
    Field(Field),
}

impl Fragment {
    /// Attributes shared by both kinds
    #[inline]
    pub fn attrs(&self) -> &FragmentAttrs {
        match self {
            Fragment::Record(record) => &record.attrs,
            Fragment::Field(field) => &field.attrs,
        }
    }

    /// The target path, if mapped
    #[inline]
    pub fn map(&self) -> Option<&str> {
        self.attrs().map.as_deref()
    }

    /// Get as record
    #[inline]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Fragment::Record(record) => Some(record),
            Fragment::Field(_) => None,
        }
    }

    /// Get as field
    #[inline]
    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Fragment::Record(_) => None,
            Fragment::Field(field) => Some(field),
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Record(record) => record.fmt(f),
            Fragment::Field(field) => field.fmt(f),
        }
    }
}

impl From<Record> for Fragment {
    fn from(record: Record) -> Self {
        Fragment::Record(record)
    }
}

impl From<Field> for Fragment {
    fn from(field: Field) -> Self {
        Fragment::Field(field)
    }
}

/// Builder methods for the attributes every fragment shares
macro_rules! attr_builders {
    () => {
        /// Set the separator (escaped `\n`, `\r`, `\t` are allowed)
        pub fn separator(mut self, separator: impl Into<String>) -> Self {
            self.attrs.separator = Some(separator.into());
            self
        }

        /// Treat the separator as a pattern over exactly `length` characters
        pub fn separator_length(mut self, length: usize) -> Self {
            self.attrs.separator_length = Some(length);
            self
        }

        /// Map onto a target path
        pub fn map(mut self, path: impl Into<String>) -> Self {
            self.attrs.map = Some(path.into());
            self
        }

        /// Set the exact width
        pub fn length(mut self, length: usize) -> Self {
            self.attrs.length = Some(length);
            self
        }

        /// Set the separator lookahead bound
        pub fn max_length(mut self, length: usize) -> Self {
            self.attrs.max_length = Some(length);
            self
        }

        /// Set the minimum width
        pub fn min_length(mut self, length: usize) -> Self {
            self.attrs.min_length = Some(length);
            self
        }

        /// Set the description
        pub fn description(mut self, description: impl Into<String>) -> Self {
            self.attrs.description = Some(description.into());
            self
        }
    };
}

/// A structural node grouping child fragments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Shared attributes
    #[serde(flatten)]
    pub attrs: FragmentAttrs,

    /// Ordered children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Fragment>,

    /// Minimum occurrences (defaults to the target element's)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_occurs: Option<u32>,

    /// Maximum occurrences, 0 = unbounded (defaults to the target element's)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurs: Option<u32>,

    /// Accept a partial occurrence and stop repeating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_partial: Option<bool>,

    /// Name used for root selection and inheritance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Name of the record this one extends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Type name used when this record is selected as root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex_type: Option<String>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    attr_builders!();

    /// Append a child
    pub fn child(mut self, child: impl Into<Fragment>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Set the name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Extend another named record
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the complex type name
    pub fn complex_type(mut self, complex_type: impl Into<String>) -> Self {
        self.complex_type = Some(complex_type.into());
        self
    }

    /// Set the minimum occurrences
    pub fn min_occurs(mut self, min: u32) -> Self {
        self.min_occurs = Some(min);
        self
    }

    /// Set the maximum occurrences (0 = unbounded)
    pub fn max_occurs(mut self, max: u32) -> Self {
        self.max_occurs = Some(max);
        self
    }

    /// Allow partial matches
    pub fn allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = Some(allow);
        self
    }

    /// Whether partial matches are accepted
    #[inline]
    pub fn is_partial_allowed(&self) -> bool {
        self.allow_partial.unwrap_or(false)
    }

    /// Whether this record may be skipped entirely
    #[inline]
    pub fn is_optional(&self) -> bool {
        self.min_occurs == Some(0)
    }

    /// Whether the content alone can tell this record apart
    ///
    /// True if this record or any descendant field declares `fixed` or `match`.
    pub fn identifiable(&self) -> bool {
        self.children.iter().any(|child| match child {
            Fragment::Record(record) => record.identifiable(),
            Fragment::Field(field) => field.fixed.is_some() || field.pattern.is_some(),
        })
    }

    /// Whether a rewind buffer has to be kept alive across child iterations
    pub fn should_buffer(&self) -> bool {
        let records = self.children.iter().filter_map(Fragment::as_record);
        let mut count = 0;
        for record in records {
            if matches!(record.max_occurs, Some(max) if max != 1) {
                return true;
            }
            count += 1;
        }
        self.is_partial_allowed() && count >= 2
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record[{}]", self.attrs.label())
    }
}

/// A leaf node holding one scalar value
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Shared attributes
    #[serde(flatten)]
    pub attrs: FragmentAttrs,

    /// Exact value the field must hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,

    /// Pattern the whole value must match
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Pad string for fixed-length values (default: a single space)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pad: Option<String>,

    /// Values are aligned left (padded and trimmed on the right)
    #[serde(default)]
    pub left_align: bool,

    /// The separator may be missing at the end of the enclosing window
    #[serde(default)]
    pub can_end: bool,

    /// Formatter registry key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<String>,

    /// Identity used when an extending record overrides this field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Extra parameters forwarded to the formatter
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other_attributes: BTreeMap<String, String>,
}

impl Field {
    /// Create an empty field
    pub fn new() -> Self {
        Self::default()
    }

    attr_builders!();

    /// Require an exact value
    pub fn fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed = Some(value.into());
        self
    }

    /// Require the value to match a pattern
    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set the pad string
    pub fn pad(mut self, pad: impl Into<String>) -> Self {
        self.pad = Some(pad.into());
        self
    }

    /// Align values to the left
    pub fn left_align(mut self) -> Self {
        self.left_align = true;
        self
    }

    /// Allow the separator to be missing at the end
    pub fn can_end(mut self) -> Self {
        self.can_end = true;
        self
    }

    /// Use a registered formatter
    pub fn formatter(mut self, key: impl Into<String>) -> Self {
        self.formatter = Some(key.into());
        self
    }

    /// Set the identity used for overrides
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a formatter parameter
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.other_attributes.insert(key.into(), value.into());
        self
    }

    /// The pad string, defaulting to a single space
    #[inline]
    pub fn pad_str(&self) -> &str {
        match self.pad.as_deref() {
            Some(pad) if !pad.is_empty() => pad,
            _ => " ",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field[{}]", self.attrs.label())
    }
}

fn default_max_look_ahead() -> usize {
    DEFAULT_MAX_LOOK_AHEAD
}

/// A complete binding definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingConfig {
    /// Top-level fragments
    #[serde(default)]
    pub children: Vec<Fragment>,

    /// Named record to use as root instead of all children
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,

    /// Name of the root complex type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex_type: Option<String>,

    /// Global bound for delimiter lookahead
    #[serde(default = "default_max_look_ahead")]
    pub max_look_ahead: usize,

    /// Tolerate text after the root record
    #[serde(default)]
    pub allow_trailing: bool,

    /// Pattern trailing text has to match when it is tolerated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_match: Option<String>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            record: None,
            complex_type: None,
            max_look_ahead: DEFAULT_MAX_LOOK_AHEAD,
            allow_trailing: false,
            trailing_match: None,
        }
    }
}

impl BindingConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a top-level fragment
    pub fn child(mut self, child: impl Into<Fragment>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Select a named record as root
    pub fn root_record(mut self, name: impl Into<String>) -> Self {
        self.record = Some(name.into());
        self
    }

    /// Set the root complex type name
    pub fn complex_type(mut self, name: impl Into<String>) -> Self {
        self.complex_type = Some(name.into());
        self
    }

    /// Set the global lookahead bound
    pub fn max_look_ahead(mut self, max: usize) -> Self {
        self.max_look_ahead = max;
        self
    }

    /// Tolerate trailing text
    pub fn allow_trailing(mut self, allow: bool) -> Self {
        self.allow_trailing = allow;
        self
    }

    /// Constrain tolerated trailing text
    pub fn trailing_match(mut self, pattern: impl Into<String>) -> Self {
        self.trailing_match = Some(pattern.into());
        self
    }

    /// Find a top-level record by name
    pub fn find_record(&self, name: &str) -> Option<&Record> {
        self.children
            .iter()
            .filter_map(Fragment::as_record)
            .find(|record| record.name.as_deref() == Some(name))
    }

    /// The root type name, falling back to the selected record's `complexType`
    pub fn root_complex_type(&self) -> Option<&str> {
        if let Some(name) = self.complex_type.as_deref() {
            return Some(name);
        }
        self.record
            .as_deref()
            .and_then(|name| self.find_record(name))
            .and_then(|record| record.complex_type.as_deref())
    }

    /// Serialize to JSON
    #[inline]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON
    #[inline]
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Deserialize from a reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load a definition file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(BindingError::Io)?;
        Self::from_reader(std::io::BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection() {
        let delimited = Field::new().separator(",").length(4);
        assert_eq!(delimited.attrs.strategy(), ReadStrategy::Delimited);

        let fixed = Field::new().length(4);
        assert_eq!(fixed.attrs.strategy(), ReadStrategy::Fixed(4));

        let unbounded = Field::new();
        assert_eq!(unbounded.attrs.strategy(), ReadStrategy::Unbounded);
    }

    #[test]
    fn test_normalize_separator() {
        assert_eq!(normalize_separator("\\r\\n"), "\r\n");
        assert_eq!(normalize_separator(";"), ";");
        let record = Record::new().separator("\\n");
        assert_eq!(record.attrs.normalized_separator().as_deref(), Some("\n"));
    }

    #[test]
    fn test_identifiable() {
        let plain = Record::new().child(Field::new().map("a"));
        assert!(!plain.identifiable());

        let nested = Record::new().child(Record::new().child(Field::new().fixed("F")));
        assert!(nested.identifiable());

        let matched = Record::new().child(Field::new().matching("[0-9]+"));
        assert!(matched.identifiable());
    }

    #[test]
    fn test_should_buffer() {
        let single = Record::new().child(Record::new().map("a"));
        assert!(!single.should_buffer());

        let repeated = Record::new().child(Record::new().map("a").max_occurs(0));
        assert!(repeated.should_buffer());

        let partial = Record::new()
            .allow_partial(true)
            .child(Record::new().map("a"))
            .child(Record::new().map("b"));
        assert!(partial.should_buffer());

        let partial_single = Record::new()
            .allow_partial(true)
            .child(Record::new().map("a"));
        assert!(!partial_single.should_buffer());
    }

    #[test]
    fn test_json_round_trip() {
        let config = BindingConfig::new()
            .complex_type("company")
            .child(
                Record::new()
                    .separator("\\n")
                    .child(Field::new().fixed("H").separator(";"))
                    .child(Field::new().map("name").can_end()),
            )
            .child(
                Record::new()
                    .map("employees")
                    .max_occurs(0)
                    .child(Field::new().map("age").formatter("implied-decimal").attribute("scale", "1")),
            );
        let json = config.to_json().unwrap();
        let parsed = BindingConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.max_look_ahead, DEFAULT_MAX_LOOK_AHEAD);
    }

    #[test]
    fn test_json_attribute_names() {
        let json = r#"{
            "record": "company",
            "allowTrailing": true,
            "children": [
                { "record": { "name": "company", "complexType": "company", "maxOccurs": 0,
                  "children": [
                    { "field": { "map": "name", "length": 4, "leftAlign": true, "match": "[A-Z].*" } }
                  ] } }
            ]
        }"#;
        let config = BindingConfig::from_json(json).unwrap();
        assert!(config.allow_trailing);
        assert_eq!(config.root_complex_type(), Some("company"));
        let record = config.find_record("company").unwrap();
        assert_eq!(record.max_occurs, Some(0));
        let field = record.children[0].as_field().unwrap();
        assert!(field.left_align);
        assert_eq!(field.pattern.as_deref(), Some("[A-Z].*"));
        assert_eq!(field.attrs.length, Some(4));
        assert_eq!(field.pad_str(), " ");
    }

    #[test]
    fn test_display() {
        let field = Fragment::from(Field::new().map("name"));
        assert_eq!(field.to_string(), "Field[name]");
        let record = Fragment::from(Record::new().description("footer"));
        assert_eq!(record.to_string(), "Record[footer]");
    }
}
