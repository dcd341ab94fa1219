//! flatbind - Schema-driven binding of flat text files
//!
//! Reads and writes fixed-width and delimited text (CSV-like files, mainframe
//! exports, bank statements) according to a declarative binding:
//! - Records and fields with separators, fixed widths, padding and alignment
//! - Repetition with occurrence bounds and backtracking between alternatives
//! - Record inheritance through named parents
//! - Pluggable formatters for per-field value conversion
//! - Windowed lists that keep huge repeated sections out of memory
//! - Diagnostics explaining why a document did not match
//!
//! ## Quick Start
//!
//! ```rust
//! use flatbind::prelude::*;
//! use std::rc::Rc;
//!
//! let employee = Rc::new(
//!     ComplexType::new("employee")
//!         .scalar("name", ScalarKind::String)
//!         .scalar("age", ScalarKind::Integer),
//! );
//! let company = Rc::new(ComplexType::new("company").list("employees", employee));
//!
//! // Define the binding via JSON
//! let config = BindingConfig::from_json(r#"{
//!     "children": [
//!         { "record": { "map": "employees", "separator": "\\n", "children": [
//!             { "field": { "map": "name", "separator": ";" } },
//!             { "field": { "map": "age" } }
//!         ] } }
//!     ]
//! }"#).unwrap();
//!
//! let binding = FlatBinding::for_type(config, company).unwrap();
//! let content = binding.unmarshal_str("Ann;31\nBob;45\n").unwrap();
//! assert_eq!(content.get("employees").and_then(Value::len), Some(2));
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::module_inception)]

// Prelude module for convenient imports
pub mod prelude;

// Binding engine
pub mod binding;

/// Re-export commonly used types for convenience
pub use binding::{
    // Schema
    BindingConfig,
    Field,
    Fragment,
    Record,
    // Content
    ComplexType,
    Content,
    ScalarKind,
    TypeRegistry,
    Value,
    // Errors
    BindingError,
    Diagnostics,
    Result,
    // Facade
    FlatBinding,
    MemorySource,
    ReadableSource,
    Window,
};
