//! The flat binding facade
//!
//! [`FlatBinding`] resolves a [`BindingConfig`] once, checks it against the
//! target type and then unmarshals and marshals any number of documents.
//!
//! # Example
//!
//! ```rust
//! use flatbind::prelude::*;
//! use std::rc::Rc;
//!
//! let person = Rc::new(
//!     ComplexType::new("person")
//!         .scalar("first", ScalarKind::String)
//!         .scalar("last", ScalarKind::String),
//! );
//! let config = BindingConfig::new().child(
//!     Record::new()
//!         .separator("\\n")
//!         .child(Field::new().map("first").separator(","))
//!         .child(Field::new().map("last")),
//! );
//! let binding = FlatBinding::for_type(config, person).unwrap();
//!
//! let content = binding.unmarshal_str("John,Doe\n").unwrap();
//! assert_eq!(content.get("last").and_then(Value::as_str), Some("Doe"));
//! assert_eq!(binding.marshal_to_string(&content).unwrap(), "John,Doe\n");
//! ```

use super::charset::Charset;
use super::content::{ComplexType, Content, TypeRegistry};
use super::convert::{Converter, DefaultConverter};
use super::cursor::ParseCursor;
use super::error::{BindingError, Diagnostics, Result};
use super::formatter::FormatterRegistry;
use super::marshal::Marshaller;
use super::regex_cache;
use super::resolver::select_root;
use super::schema::{BindingConfig, Fragment, Record};
use super::source::{MemorySource, ReadableSource};
use super::unmarshal::Unmarshaller;
use super::window::Window;
use std::fmt;
use std::io::{Read, Write};
use std::rc::Rc;

// ============================================================================
// Binding Context
// ============================================================================

/// Settings shared by every parse of a binding, including re-parses of
/// windowed lists
#[derive(Clone)]
pub struct BindingContext {
    pub(crate) max_look_ahead: usize,
    pub(crate) formatters: FormatterRegistry,
    pub(crate) converter: Rc<dyn Converter>,
    pub(crate) charset: Charset,
    pub(crate) allow_trailing: bool,
    pub(crate) trailing_match: Option<String>,
}

impl BindingContext {
    fn from_config(config: &BindingConfig) -> Self {
        Self {
            max_look_ahead: config.max_look_ahead,
            formatters: FormatterRegistry::default(),
            converter: Rc::new(DefaultConverter),
            charset: Charset::default(),
            allow_trailing: config.allow_trailing,
            trailing_match: config.trailing_match.clone(),
        }
    }

    /// Text encoding
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Default separator lookahead
    pub fn max_look_ahead(&self) -> usize {
        self.max_look_ahead
    }

    /// Registered formatters
    pub fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("max_look_ahead", &self.max_look_ahead)
            .field("formatters", &self.formatters)
            .field("charset", &self.charset)
            .field("allow_trailing", &self.allow_trailing)
            .field("trailing_match", &self.trailing_match)
            .finish()
    }
}

// ============================================================================
// Flat Binding
// ============================================================================

/// A resolved, validated binding between flat text and a complex type
#[derive(Debug, Clone)]
pub struct FlatBinding {
    config: BindingConfig,
    root: Rc<Record>,
    root_type: Rc<ComplexType>,
    types: TypeRegistry,
    context: Rc<BindingContext>,
}

impl FlatBinding {
    /// Build a binding whose root type is looked up in `types`
    ///
    /// The root type is the configuration's `complexType`, or the one of the
    /// selected root record.
    pub fn new(config: BindingConfig, types: &TypeRegistry) -> Result<Self> {
        let name = config.root_complex_type().ok_or_else(|| {
            BindingError::schema("The binding does not name a complex type for its root")
        })?;
        let root_type = types.resolve(name)?;
        let context = Rc::new(BindingContext::from_config(&config));
        Self::build(config, root_type, types.clone(), context)
    }

    /// Build a binding for an explicit root type
    pub fn for_type(config: BindingConfig, root_type: Rc<ComplexType>) -> Result<Self> {
        let types = TypeRegistry::new().with(Rc::clone(&root_type));
        let context = Rc::new(BindingContext::from_config(&config));
        Self::build(config, root_type, types, context)
    }

    fn build(
        config: BindingConfig,
        root_type: Rc<ComplexType>,
        types: TypeRegistry,
        context: Rc<BindingContext>,
    ) -> Result<Self> {
        let root = select_root(&config)?;
        let binding = Self {
            config,
            root: Rc::new(root),
            root_type,
            types,
            context,
        };
        binding.validate()?;
        Ok(binding)
    }

    /// The same binding rooted at the named record
    ///
    /// The root type becomes the named record's `complexType`.
    pub fn named(&self, name: &str) -> Result<Self> {
        let mut config = self.config.clone();
        config.record = Some(name.to_string());
        config.complex_type = None;
        let type_name = config.root_complex_type().ok_or_else(|| {
            BindingError::schema(format!("The record '{}' does not name a complex type", name))
        })?;
        let root_type = self.types.resolve(type_name)?;
        Self::build(config, root_type, self.types.clone(), Rc::clone(&self.context))
    }

    /// Replace the formatter registry
    pub fn with_formatters(mut self, formatters: FormatterRegistry) -> Result<Self> {
        formatters.validate(&self.root)?;
        Rc::make_mut(&mut self.context).formatters = formatters;
        Ok(self)
    }

    /// Replace the converter used for fields without a formatter
    pub fn with_converter<C: Converter + 'static>(mut self, converter: C) -> Self {
        Rc::make_mut(&mut self.context).converter = Rc::new(converter);
        self
    }

    /// Set the text encoding
    pub fn with_charset(mut self, charset: Charset) -> Self {
        Rc::make_mut(&mut self.context).charset = charset;
        self
    }

    /// Tolerate or reject text after the root record
    pub fn with_allow_trailing(mut self, allow: bool) -> Self {
        self.config.allow_trailing = allow;
        Rc::make_mut(&mut self.context).allow_trailing = allow;
        self
    }

    /// The configuration this binding was built from
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// The resolved root record
    pub fn root(&self) -> &Record {
        &self.root
    }

    /// The root type
    pub fn root_type(&self) -> &Rc<ComplexType> {
        &self.root_type
    }

    /// Shared parse settings
    pub fn context(&self) -> &BindingContext {
        &self.context
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn validate(&self) -> Result<()> {
        self.context.formatters.validate(&self.root)?;
        if let Some(pattern) = self.config.trailing_match.as_deref() {
            compile(pattern)?;
        }
        validate_record(&self.root, &self.root_type)
    }

    // ========================================================================
    // Unmarshal
    // ========================================================================

    /// Parse a document
    ///
    /// Repeated records on the paths of `windows` are paged in from `source`
    /// on demand.
    pub fn unmarshal(&self, source: Rc<dyn ReadableSource>, windows: &[Window]) -> Result<Content> {
        let mut diagnostics = Diagnostics::scoped();
        self.unmarshal_with_diagnostics(source, windows, &mut diagnostics)
    }

    /// Parse a document, collecting every soft mismatch in `diagnostics`
    pub fn unmarshal_with_diagnostics(
        &self,
        source: Rc<dyn ReadableSource>,
        windows: &[Window],
        diagnostics: &mut Diagnostics,
    ) -> Result<Content> {
        let reader = source.open()?;
        let cursor = ParseCursor::new(reader, self.context.charset);
        let mut engine = Unmarshaller::new(&self.context, &source, windows, cursor, diagnostics);
        engine.unmarshal_root(&self.root, &self.root_type)
    }

    /// Parse an in-memory document
    pub fn unmarshal_str(&self, text: &str) -> Result<Content> {
        self.unmarshal(Rc::new(MemorySource::from(text)), &[])
    }

    /// Parse everything a reader yields
    pub fn unmarshal_reader<R: Read>(&self, mut reader: R) -> Result<Content> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.unmarshal(Rc::new(MemorySource::new(bytes)), &[])
    }

    // ========================================================================
    // Marshal
    // ========================================================================

    /// Write a content as flat text
    pub fn marshal<W: Write>(&self, writer: W, content: &Content) -> Result<()> {
        Marshaller::new(&self.context, writer).marshal_root(&self.root, content)
    }

    /// Write a content into a string
    pub fn marshal_to_string(&self, content: &Content) -> Result<String> {
        let mut bytes = Vec::new();
        self.marshal(&mut bytes, content)?;
        let text = match self.context.charset {
            Charset::Utf8 => String::from_utf8(bytes)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?,
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        };
        Ok(text)
    }
}

fn compile(pattern: &str) -> Result<()> {
    regex_cache::get_or_compile(pattern)
        .map(|_| ())
        .map_err(|e| BindingError::schema(format!("Invalid regex '{}': {}", pattern, e)))
}

/// Check a resolved record tree against the type it fills
fn validate_record(record: &Record, ty: &ComplexType) -> Result<()> {
    if let (Some(separator), Some(_)) = (record.attrs.normalized_separator(), record.attrs.separator_length) {
        compile(&separator)?;
    }
    for child in &record.children {
        match child {
            Fragment::Record(nested) => match nested.attrs.map.as_deref() {
                None => validate_record(nested, ty)?,
                Some(map) => {
                    let element = ty.get(map).ok_or_else(|| {
                        BindingError::schema(format!(
                            "The {} maps to '{}' which does not exist in type '{}'",
                            nested,
                            map,
                            ty.name()
                        ))
                    })?;
                    let nested_type = element.complex_type().ok_or_else(|| {
                        BindingError::schema(format!(
                            "The {} maps to the scalar element '{}'",
                            nested, map
                        ))
                    })?;
                    if !element.is_list() && nested.max_occurs.is_some_and(|max| max != 1) {
                        return Err(BindingError::schema(format!(
                            "The {} repeats but '{}' holds a single value",
                            nested, map
                        )));
                    }
                    validate_record(nested, nested_type)?;
                }
            },
            Fragment::Field(field) => {
                if let Some(pattern) = field.pattern.as_deref() {
                    compile(pattern)?;
                }
                if let (Some(separator), Some(_)) =
                    (field.attrs.normalized_separator(), field.attrs.separator_length)
                {
                    compile(&separator)?;
                }
                if let Some(map) = field.attrs.map.as_deref() {
                    let element = ty.get(map).ok_or_else(|| {
                        BindingError::schema(format!(
                            "The {} maps to '{}' which does not exist in type '{}'",
                            field,
                            map,
                            ty.name()
                        ))
                    })?;
                    if element.scalar_kind().is_none() && field.formatter.is_none() {
                        return Err(BindingError::schema(format!(
                            "The {} maps to the complex element '{}'",
                            field, map
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}
