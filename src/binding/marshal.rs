//! Marshalling content back into flat text
//!
//! The marshaller walks the resolved binding tree in declaration order and
//! writes each fragment against the content in scope. Mapped records switch
//! the scope to their value (once per list element); everything else writes
//! against the current scope.

use super::charset::Charset;
use super::content::{Content, Value};
use super::error::{BindingError, Result};
use super::flat::BindingContext;
use super::formatter::FormatterParams;
use super::schema::{Field, Fragment, FragmentAttrs, Record};
use std::io::Write;

/// Encodes text and counts the characters written
struct Sink<W: Write> {
    writer: W,
    charset: Charset,
    written: u64,
    bytes: Vec<u8>,
}

impl<W: Write> Sink<W> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.bytes.clear();
        self.charset.encode(text, &mut self.bytes)?;
        self.writer.write_all(&self.bytes)?;
        self.written += text.chars().count() as u64;
        Ok(())
    }
}

/// Fit `text` into exactly `length` characters
///
/// Longer text is cut on the side opposite to the alignment, shorter text is
/// padded there.
pub(crate) fn fit(text: &str, length: usize, pad: &str, left_align: bool) -> String {
    let count = text.chars().count();
    if count >= length {
        return if left_align {
            text.chars().take(length).collect()
        } else {
            text.chars().skip(count - length).collect()
        };
    }
    let padding: String = pad.chars().cycle().take(length - count).collect();
    if left_align {
        format!("{}{}", text, padding)
    } else {
        format!("{}{}", padding, text)
    }
}

/// One marshal call over a writer
pub(crate) struct Marshaller<'a, W: Write> {
    context: &'a BindingContext,
    sink: Sink<W>,
}

impl<'a, W: Write> Marshaller<'a, W> {
    pub(crate) fn new(context: &'a BindingContext, writer: W) -> Self {
        Self {
            context,
            sink: Sink {
                writer,
                charset: context.charset,
                written: 0,
                bytes: Vec::new(),
            },
        }
    }

    /// Write the root record against the root content
    pub(crate) fn marshal_root(&mut self, root: &Record, content: &Content) -> Result<()> {
        self.emit(root, content)?;
        self.sink.writer.flush()?;
        Ok(())
    }

    fn write(&mut self, fragment: &Fragment, scope: &Content) -> Result<()> {
        match fragment {
            Fragment::Record(record) => self.write_record(record, scope),
            Fragment::Field(field) => self.write_field(field, scope),
        }
    }

    fn write_record(&mut self, record: &Record, scope: &Content) -> Result<()> {
        let map = match record.attrs.map.as_deref() {
            Some(map) => map,
            None => return self.emit(record, scope),
        };
        match scope.get(map) {
            None | Some(Value::Nil) => Ok(()),
            Some(Value::Record(content)) => self.emit(record, content),
            Some(Value::List(items)) => {
                for item in items {
                    match item {
                        Value::Record(content) => self.emit(record, content)?,
                        Value::Nil => {}
                        other => {
                            return Err(BindingError::marshal(
                                record.to_string(),
                                format!("expected a record, found {}", other),
                            ))
                        }
                    }
                }
                Ok(())
            }
            Some(Value::Windowed(list)) => {
                for content in list.iter() {
                    self.emit(record, &content?)?;
                }
                Ok(())
            }
            Some(other) => Err(BindingError::marshal(
                record.to_string(),
                format!("expected a record, found {}", other),
            )),
        }
    }

    /// Write one instance of a record
    fn emit(&mut self, record: &Record, scope: &Content) -> Result<()> {
        let start = self.sink.written;
        for child in &record.children {
            self.write(child, scope)?;
        }
        match separator(&record.attrs, &record.to_string())? {
            Some(separator) => self.sink.write_str(&separator)?,
            None => {
                if let Some(length) = record.attrs.length {
                    let written = (self.sink.written - start) as usize;
                    if written < length {
                        self.sink.write_str(&" ".repeat(length - written))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_field(&mut self, field: &Field, scope: &Content) -> Result<()> {
        // fixed literals are written as configured
        let text = match (field.fixed.as_deref(), field.attrs.map.as_deref()) {
            (Some(fixed), _) => fixed.to_string(),
            (None, map) => {
                let text = match map {
                    Some(map) => self.format(field, scope.get(map).unwrap_or(&Value::Nil))?,
                    None => String::new(),
                };
                match field.attrs.length {
                    Some(length) => fit(&text, length, field.pad_str(), field.left_align),
                    None => text,
                }
            }
        };
        self.sink.write_str(&text)?;
        if let Some(separator) = separator(&field.attrs, &field.to_string())? {
            self.sink.write_str(&separator)?;
        }
        Ok(())
    }

    fn format(&self, field: &Field, value: &Value) -> Result<String> {
        if matches!(value, Value::Record(_) | Value::List(_) | Value::Windowed(_)) {
            return Err(BindingError::marshal(
                field.to_string(),
                format!("a scalar is required, found {}", value),
            ));
        }
        if let Some(key) = field.formatter.as_deref() {
            let formatter =
                self.context
                    .formatters
                    .get(key)
                    .ok_or_else(|| BindingError::Formatter {
                        formatter: key.to_string(),
                        fragment: field.to_string(),
                        cause: "no formatter registered under this key".to_string(),
                    })?;
            let params = FormatterParams::for_field(field, formatter.as_ref());
            return formatter
                .marshal(value, &params)
                .map_err(|e| BindingError::Formatter {
                    formatter: key.to_string(),
                    fragment: field.to_string(),
                    cause: e.to_string(),
                });
        }
        self.context
            .converter
            .to_text(value)
            .map_err(|e| BindingError::marshal(field.to_string(), e.to_string()))
    }
}

/// The separator to write after a fragment
///
/// Pattern separators can only be written when they are plain text.
fn separator(attrs: &FragmentAttrs, fragment: &str) -> Result<Option<String>> {
    let separator = match attrs.normalized_separator() {
        Some(separator) => separator,
        None => return Ok(None),
    };
    if attrs.separator_length.is_some() && regex::escape(&separator) != separator {
        return Err(BindingError::marshal(
            fragment,
            format!("the separator pattern '{}' can not be written", separator),
        ));
    }
    Ok(Some(separator))
}
