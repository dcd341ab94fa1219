//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from flatbind.
//! Importing this module with a wildcard import brings the core types into scope:
//!
//! ```
//! use flatbind::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Schema
//! - [`BindingConfig`] - A complete binding definition
//! - [`Record`] - Structural node grouping child fragments
//! - [`Field`] - Leaf node holding one scalar value
//! - [`Fragment`] - Either of the two
//!
//! ## Content
//! - [`ComplexType`] - Record type with named elements
//! - [`Content`] - Instance of a complex type
//! - [`Value`] - Value held by a content slot
//! - [`ScalarKind`] - Kind of scalar element
//! - [`TypeRegistry`] - Complex types by name
//!
//! ## Binding
//! - [`FlatBinding`] - Resolved binding
//! - [`Window`] - Paging limit for repeated records
//! - [`MemorySource`], [`FileSource`] - Re-openable inputs
//! - [`Charset`] - Text encoding
//!
//! ## Extension Points
//! - [`Converter`] - Text/value conversion
//! - [`Formatter`] - Per-field formatter
//! - [`FormatterRegistry`] - Formatters by key
//!
//! ## Error Handling
//! - [`BindingError`] - Fatal binding error
//! - [`Diagnostics`] - Soft mismatches collected while parsing

// ============================================================================
// Schema
// ============================================================================

pub use crate::binding::schema::{BindingConfig, Field, Fragment, Record};

// ============================================================================
// Content
// ============================================================================

pub use crate::binding::content::{ComplexType, Content, ScalarKind, TypeRegistry, Value};

// ============================================================================
// Binding
// ============================================================================

pub use crate::binding::charset::Charset;
pub use crate::binding::flat::FlatBinding;
pub use crate::binding::source::{FileSource, MemorySource, ReadableSource};
pub use crate::binding::window::Window;

// ============================================================================
// Extension Points
// ============================================================================

pub use crate::binding::convert::Converter;
pub use crate::binding::formatter::{FormatFailure, Formatter, FormatterParams, FormatterRegistry};

// ============================================================================
// Error Handling
// ============================================================================

pub use crate::binding::error::{BindingError, Diagnostics, Severity};
