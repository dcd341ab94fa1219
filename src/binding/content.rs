//! Target data model for bindings
//!
//! Parsed records land in [`Content`] instances, a typed bag of [`Value`]s
//! described by a [`ComplexType`]. Element lookups go by name or by a
//! `/`-separated path through nested complex elements.
//!
//! # Example
//!
//! ```rust
//! use flatbind::binding::content::*;
//! use std::rc::Rc;
//!
//! let employee = Rc::new(
//!     ComplexType::new("employee")
//!         .scalar("firstName", ScalarKind::String)
//!         .scalar("age", ScalarKind::Integer),
//! );
//! let company = Rc::new(ComplexType::new("company").list("employees", employee.clone()));
//!
//! let mut john = employee.new_instance();
//! john.set("firstName", Value::string("John")).unwrap();
//!
//! let mut root = company.new_instance();
//! root.push("employees", Value::Record(john)).unwrap();
//! assert_eq!(root.get("employees").and_then(Value::len), Some(1));
//! ```

use super::error::{BindingError, Result};
use super::window::WindowedList;
use hashbrown::HashMap;
use std::fmt;
use std::rc::Rc;

/// Kind of a scalar element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// Text
    String,
    /// Signed 64-bit integer
    Integer,
    /// Floating point number
    Decimal,
    /// true/false
    Boolean,
}

/// What an element holds
#[derive(Debug, Clone)]
pub enum ElementKind {
    /// A scalar value
    Scalar(ScalarKind),
    /// A nested record
    Complex(Rc<ComplexType>),
}

/// A named slot of a complex type
#[derive(Debug, Clone)]
pub struct Element {
    /// Element name
    pub name: String,
    /// Scalar kind or nested type
    pub kind: ElementKind,
    /// Minimum occurrences
    pub min_occurs: u32,
    /// Maximum occurrences, 0 = unbounded
    pub max_occurs: u32,
}

impl Element {
    /// Create a single, required element
    pub fn new(name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            kind,
            min_occurs: 1,
            max_occurs: 1,
        }
    }

    /// Set the occurrence bounds (0 = unbounded maximum)
    pub fn occurs(mut self, min: u32, max: u32) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    /// Whether the element holds a list of values
    #[inline]
    pub fn is_list(&self) -> bool {
        self.max_occurs != 1
    }

    /// The nested type, if complex
    #[inline]
    pub fn complex_type(&self) -> Option<&Rc<ComplexType>> {
        match &self.kind {
            ElementKind::Complex(ty) => Some(ty),
            ElementKind::Scalar(_) => None,
        }
    }

    /// The scalar kind, if scalar
    #[inline]
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match &self.kind {
            ElementKind::Scalar(kind) => Some(*kind),
            ElementKind::Complex(_) => None,
        }
    }
}

/// A record type: an ordered set of named elements
#[derive(Debug, Clone)]
pub struct ComplexType {
    name: String,
    elements: Vec<Element>,
}

impl ComplexType {
    /// Create an empty type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }

    /// Add an element
    pub fn element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Add a single scalar element
    pub fn scalar(self, name: impl Into<String>, kind: ScalarKind) -> Self {
        self.element(Element::new(name, ElementKind::Scalar(kind)))
    }

    /// Add a single nested element
    pub fn complex(self, name: impl Into<String>, ty: Rc<ComplexType>) -> Self {
        self.element(Element::new(name, ElementKind::Complex(ty)))
    }

    /// Add an unbounded list of nested elements
    pub fn list(self, name: impl Into<String>, ty: Rc<ComplexType>) -> Self {
        self.element(Element::new(name, ElementKind::Complex(ty)).occurs(0, 0))
    }

    /// Type name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared elements
    #[inline]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Look up a direct element by name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|element| element.name == name)
    }

    /// Look up an element by `/`-separated path
    pub fn get(&self, path: &str) -> Option<&Element> {
        match path.split_once('/') {
            None => self.child(path),
            Some((head, rest)) => self.child(head)?.complex_type()?.get(rest),
        }
    }

    /// Create an empty instance of this type
    pub fn new_instance(self: &Rc<Self>) -> Content {
        Content {
            ty: Rc::clone(self),
            values: HashMap::new(),
        }
    }
}

impl PartialEq for ComplexType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// A value held by a [`Content`] slot
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value
    #[default]
    Nil,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Decimal value
    Float(f64),
    /// Text value
    String(String),
    /// Nested record
    Record(Content),
    /// Repeated values
    List(Vec<Value>),
    /// Repeated records paged in from the source on demand
    Windowed(WindowedList),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Check if this is nil
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as float (integers are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as record
    pub fn as_record(&self) -> Option<&Content> {
        match self {
            Value::Record(content) => Some(content),
            _ => None,
        }
    }

    /// Get as a plain list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as a windowed list
    pub fn as_windowed(&self) -> Option<&WindowedList> {
        match self {
            Value::Windowed(list) => Some(list),
            _ => None,
        }
    }

    /// Number of elements of a list or windowed list
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::List(items) => Some(items.len()),
            Value::Windowed(list) => Some(list.len()),
            _ => None,
        }
    }

    /// Element `index` of a list, paging windowed lists in as needed
    pub fn item(&self, index: usize) -> Result<Option<Value>> {
        match self {
            Value::List(items) => Ok(items.get(index).cloned()),
            Value::Windowed(list) => Ok(list.get(index)?.map(Value::Record)),
            _ => Ok(None),
        }
    }

    /// Convert to JSON, materializing windowed lists completely
    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value as Json;
        Ok(match self {
            Value::Nil => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Record(content) => content.to_json()?,
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Windowed(list) => {
                let mut items = Vec::with_capacity(list.len());
                for content in list.iter() {
                    items.push(content?.to_json()?);
                }
                Json::Array(items)
            }
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Record(content) => write!(f, "{}", content),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Windowed(list) => write!(f, "[{} windowed]", list.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Content> for Value {
    fn from(content: Content) -> Self {
        Value::Record(content)
    }
}

/// An instance of a [`ComplexType`]
#[derive(Debug, Clone)]
pub struct Content {
    ty: Rc<ComplexType>,
    values: HashMap<String, Value>,
}

impl Content {
    /// The type of this instance
    #[inline]
    pub fn complex_type(&self) -> &Rc<ComplexType> {
        &self.ty
    }

    fn element(&self, name: &str) -> Result<&Element> {
        self.ty.child(name).ok_or_else(|| {
            BindingError::schema(format!(
                "The element '{}' does not exist in type '{}'",
                name,
                self.ty.name()
            ))
        })
    }

    /// Get the value at a path (`None` if unset)
    pub fn get(&self, path: &str) -> Option<&Value> {
        match path.split_once('/') {
            None => self.values.get(path),
            Some((head, rest)) => self.values.get(head)?.as_record()?.get(rest),
        }
    }

    /// Get the value at a path mutably
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        match path.split_once('/') {
            None => self.values.get_mut(path),
            Some((head, rest)) => match self.values.get_mut(head)? {
                Value::Record(content) => content.get_mut(rest),
                _ => None,
            },
        }
    }

    /// The nested record for the first segment of a path, created if unset
    fn nested(&mut self, head: &str) -> Result<&mut Content> {
        let element = self.element(head)?;
        let ty = match (element.complex_type(), element.is_list()) {
            (Some(ty), false) => Rc::clone(ty),
            _ => {
                return Err(BindingError::schema(format!(
                    "The element '{}' of type '{}' is not a single complex element",
                    head,
                    self.ty.name()
                )))
            }
        };
        if !matches!(self.values.get(head), Some(Value::Record(_))) {
            self.values
                .insert(head.to_string(), Value::Record(ty.new_instance()));
        }
        match self.values.get_mut(head) {
            Some(Value::Record(content)) => Ok(content),
            _ => Err(BindingError::schema(format!("Can not descend into '{}'", head))),
        }
    }

    /// Set the value at a path, creating intermediate records as needed
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        match path.split_once('/') {
            None => {
                self.element(path)?;
                self.values.insert(path.to_string(), value);
                Ok(())
            }
            Some((head, rest)) => self.nested(head)?.set(rest, value),
        }
    }

    /// Append to the list at a path, returning the new element's index
    pub fn push(&mut self, path: &str, value: Value) -> Result<usize> {
        if let Some((head, rest)) = path.split_once('/') {
            return self.nested(head)?.push(rest, value);
        }
        self.element(path)?;
        let slot = self.values.entry(path.to_string()).or_insert(Value::Nil);
        match slot {
            Value::Nil => {
                *slot = Value::List(vec![value]);
                Ok(0)
            }
            Value::List(items) => {
                items.push(value);
                Ok(items.len() - 1)
            }
            other => Err(BindingError::schema(format!(
                "Can not append to '{}', it holds {}",
                path, other
            ))),
        }
    }

    /// Set element `index` of the list at a path, growing it with nils
    pub fn set_indexed(&mut self, path: &str, index: usize, value: Value) -> Result<()> {
        if let Some((head, rest)) = path.split_once('/') {
            return self.nested(head)?.set_indexed(rest, index, value);
        }
        self.element(path)?;
        let slot = self.values.entry(path.to_string()).or_insert(Value::Nil);
        if slot.is_nil() {
            *slot = Value::List(Vec::new());
        }
        match slot {
            Value::List(items) => {
                if items.len() <= index {
                    items.resize(index + 1, Value::Nil);
                }
                items[index] = value;
                Ok(())
            }
            other => Err(BindingError::schema(format!(
                "Can not index into '{}', it holds {}",
                path, other
            ))),
        }
    }

    /// Remove the value at a direct element
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Iterate the set values in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.ty
            .elements()
            .iter()
            .filter_map(|element| {
                self.values
                    .get_key_value(element.name.as_str())
                    .map(|(name, value)| (name.as_str(), value))
            })
    }

    /// Convert to a JSON object
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut object = serde_json::Map::new();
        for (name, value) in self.iter() {
            object.insert(name.to_string(), value.to_json()?);
        }
        Ok(serde_json::Value::Object(object))
    }
}

impl PartialEq for Content {
    /// Nil values are equal to unset ones
    fn eq(&self, other: &Self) -> bool {
        if self.ty != other.ty {
            return false;
        }
        let covers = |a: &Content, b: &Content| {
            a.values
                .iter()
                .all(|(name, value)| match b.values.get(name) {
                    Some(theirs) => theirs == value,
                    None => value.is_nil(),
                })
        };
        covers(self, other) && covers(other, self)
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.ty.name())?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: {}", name, value)?;
        }
        write!(f, " }}")
    }
}

/// Named complex types available to bindings
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Rc<ComplexType>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type and every complex type nested in it
    pub fn register(&mut self, ty: Rc<ComplexType>) {
        for element in ty.elements() {
            if let Some(nested) = element.complex_type() {
                if !self.types.contains_key(nested.name()) {
                    self.register(Rc::clone(nested));
                }
            }
        }
        self.types.insert(ty.name().to_string(), ty);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, ty: Rc<ComplexType>) -> Self {
        self.register(ty);
        self
    }

    /// Look up a type by name
    pub fn get(&self, name: &str) -> Option<&Rc<ComplexType>> {
        self.types.get(name)
    }

    /// Look up a type by name, failing with a schema error
    pub fn resolve(&self, name: &str) -> Result<Rc<ComplexType>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| BindingError::schema(format!("Unknown complex type '{}'", name)))
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
