//! Error and Diagnostic Reporting for flat bindings
//!
//! Two kinds of failure exist while binding flat text:
//!
//! - **Soft mismatches** are not errors at all. A field that does not satisfy
//!   its constraints resolves as [`Resolution::NoMatch`](super::unmarshal::Resolution)
//!   and the engine backtracks to try the next alternative. Each of these is
//!   recorded as a [`Diagnostic`] so a failed parse can be explained afterwards.
//! - **Fatal errors** are [`BindingError`]s. They abort the whole call.
//!
//! # Example Output
//!
//! ```text
//! Could not parse anything:
//!   [Error @ 0] The field 'Field[header]' does not have the correct fixed value, expecting 'H', received 'X'
//!   [Warning @ 0] Parsing employees failed after 0 of [1, unbounded] iterations
//! ```

use std::fmt;
use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BindingError>;

/// Errors that abort a binding operation
#[derive(Debug)]
pub enum BindingError {
    /// A record names a parent that can not be found (or the chain is cyclic)
    Resolution {
        /// The record being resolved
        record: String,
        /// The parent that could not be resolved
        parent: String,
    },

    /// The schema is inconsistent with itself or with the target type
    Schema(String),

    /// A required structure could not be parsed and nothing can backtrack
    StructuralMismatch {
        /// Description of what failed
        message: String,
        /// Character offset where the failure was detected
        offset: u64,
    },

    /// A record closed with a width different from the declared one
    LengthViolation {
        /// The offending fragment
        fragment: String,
        /// Declared length (or minimum length)
        expected: u64,
        /// Characters actually consumed
        actual: u64,
        /// Whether `expected` is a minimum rather than an exact width
        minimum: bool,
        /// Character offset where the record ended
        offset: u64,
    },

    /// Unread characters remain inside a record's read window
    DanglingContent {
        /// The offending fragment
        fragment: String,
        /// The characters left unread
        remainder: String,
        /// Character offset of the first unread character
        offset: u64,
    },

    /// Input remains after the root record
    TrailingContent {
        /// The trailing text
        trailing: String,
        /// The `trailingMatch` pattern it failed, if any
        pattern: Option<String>,
    },

    /// A formatter is unknown or failed to convert a value
    Formatter {
        /// Registry key of the formatter
        formatter: String,
        /// The fragment using it
        fragment: String,
        /// Underlying cause
        cause: String,
    },

    /// A value could not be written
    Marshal {
        /// The fragment being written
        fragment: String,
        /// What went wrong
        message: String,
    },

    /// I/O error on the underlying stream
    Io(io::Error),

    /// The binding definition could not be (de)serialized
    Json(serde_json::Error),
}

impl BindingError {
    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        BindingError::Schema(message.into())
    }

    /// Create a fatal structural mismatch
    pub fn mismatch(message: impl Into<String>, offset: u64) -> Self {
        BindingError::StructuralMismatch {
            message: message.into(),
            offset,
        }
    }

    /// Create a marshal error
    pub fn marshal(fragment: impl Into<String>, message: impl Into<String>) -> Self {
        BindingError::Marshal {
            fragment: fragment.into(),
            message: message.into(),
        }
    }

    /// The character offset the error refers to, if it has one
    pub fn offset(&self) -> Option<u64> {
        match self {
            BindingError::StructuralMismatch { offset, .. }
            | BindingError::LengthViolation { offset, .. }
            | BindingError::DanglingContent { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolution { record, parent } => {
                write!(f, "Can not find parent '{}' of record '{}'", parent, record)
            }
            Self::Schema(msg) => write!(f, "Invalid binding: {}", msg),
            Self::StructuralMismatch { message, offset } => {
                write!(f, "{} (at offset {})", message, offset)
            }
            Self::LengthViolation {
                fragment,
                expected,
                actual,
                minimum,
                offset,
            } => {
                if *minimum {
                    write!(
                        f,
                        "There were not enough characters for the {}: {} < {} (at offset {})",
                        fragment, actual, expected, offset
                    )
                } else {
                    write!(
                        f,
                        "There were not enough characters for the {}: {} != {} (at offset {})",
                        fragment, actual, expected, offset
                    )
                }
            }
            Self::DanglingContent {
                fragment,
                remainder,
                offset,
            } => write!(
                f,
                "There are dangling characters at the end of the {}: '{}' (at offset {})",
                fragment, remainder, offset
            ),
            Self::TrailingContent { trailing, pattern } => match pattern {
                Some(pattern) => write!(
                    f,
                    "The trailing section did not match the allowed regex '{}': {}",
                    pattern, trailing
                ),
                None => write!(f, "Trailing characters not allowed: {}", trailing),
            },
            Self::Formatter {
                formatter,
                fragment,
                cause,
            } => write!(f, "Formatter '{}' failed for {}: {}", formatter, fragment, cause),
            Self::Marshal { fragment, message } => {
                write!(f, "Can not marshal {}: {}", fragment, message)
            }
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Json(e) => write!(f, "Invalid binding definition: {}", e),
        }
    }
}

impl std::error::Error for BindingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BindingError {
    fn from(e: io::Error) -> Self {
        BindingError::Io(e)
    }
}

impl From<serde_json::Error> for BindingError {
    fn from(e: serde_json::Error) -> Self {
        BindingError::Json(e)
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Just a note
    Note,
    /// An optional structure was skipped
    Warning,
    /// A required structure did not match (may still be backtracked)
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "Note"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// A single message recorded while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Human readable message
    pub message: String,
    /// Character offset the message refers to
    pub offset: u64,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} @ {}] {}", self.severity, self.offset, self.message)
    }
}

/// Collector for diagnostics, passed by reference into a parse call
///
/// When `scoped` is set, the collector is cleared every time a record
/// commits, so after a failure only the messages of the last attempt remain.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
    scoped: bool,
}

impl Diagnostics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector that only keeps messages since the last commit
    pub fn scoped() -> Self {
        Self {
            messages: Vec::new(),
            scoped: true,
        }
    }

    /// Record a message
    pub fn push(&mut self, severity: Severity, message: impl Into<String>, offset: u64) {
        self.messages.push(Diagnostic {
            severity,
            message: message.into(),
            offset,
        });
    }

    /// Record a warning
    pub fn warn(&mut self, message: impl Into<String>, offset: u64) {
        self.push(Severity::Warning, message, offset);
    }

    /// Record an error
    pub fn error(&mut self, message: impl Into<String>, offset: u64) {
        self.push(Severity::Error, message, offset);
    }

    /// Called by the engine whenever a record commits
    pub(crate) fn committed(&mut self) {
        if self.scoped {
            self.messages.clear();
        }
    }

    /// All recorded messages
    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    /// Number of recorded messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages at or above the given severity
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(move |m| m.severity >= severity)
    }

    /// Remove all messages
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}", message)?;
        }
        Ok(())
    }
}
