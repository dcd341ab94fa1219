//! Flat text bindings
//!
//! This module binds fixed-width and delimited text to typed content and back.
//!
//! # Module Organization
//!
//! ## Schema
//! - [`schema`] - Records, fields and the binding configuration
//! - [`resolver`] - Record inheritance and root selection
//!
//! ## Parsing
//! - [`cursor`] - Character cursor with bounded lookahead and marks
//! - [`charset`] - Byte/character conversion
//! - [`unmarshal`] - Recursive-descent parser
//!
//! ## Writing
//! - [`marshal`] - Encoder for content trees
//!
//! ## Values
//! - [`content`] - Complex types, content instances and values
//! - [`convert`] - Text/value conversion
//! - [`formatter`] - Pluggable per-field formatters
//!
//! ## Large Inputs
//! - [`window`] - Windowed lists paged in on demand
//! - [`source`] - Re-openable byte sources
//!
//! ## Facade
//! - [`FlatBinding`] - Resolved binding, entry point for both directions

// ============================================================================
// Module Declarations
// ============================================================================

pub mod charset;
pub mod content;
pub mod convert;
pub mod cursor;
pub mod error;
pub mod flat;
pub mod formatter;
pub mod marshal;
pub mod regex_cache;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod unmarshal;
pub mod window;

// ============================================================================
// Schema
// ============================================================================

pub use resolver::{resolve, resolve_tree, select_root};
pub use schema::{
    normalize_separator, BindingConfig, Field, Fragment, FragmentAttrs, ReadStrategy, Record,
    DEFAULT_MAX_LOOK_AHEAD,
};

// ============================================================================
// Content
// ============================================================================

pub use content::{ComplexType, Content, Element, ElementKind, ScalarKind, TypeRegistry, Value};
pub use convert::{ConversionError, Converter, DefaultConverter};
pub use formatter::{
    BooleanFormatter, FormatFailure, Formatter, FormatterParams, FormatterRegistry,
    ImpliedDecimalFormatter,
};

// ============================================================================
// Parsing and Writing
// ============================================================================

pub use charset::Charset;
pub use cursor::{Delimiter, Mark, ParseCursor, Scan};
pub use error::{BindingError, Diagnostic, Diagnostics, Result, Severity};
pub use flat::{BindingContext, FlatBinding};
pub use source::{FileSource, MemorySource, ReadableSource};
pub use unmarshal::Resolution;
pub use window::{PartialFlatUnmarshaller, PartialUnmarshaller, Window, WindowedList};
