//! Recursive-descent unmarshalling of flat text
//!
//! Every fragment is parsed against a read window:
//!
//! | Fragment attributes | Window |
//! |---|---|
//! | `separator` | up to the first separator within `maxLength` (or `maxLookAhead`) |
//! | `length` | exactly `length` characters |
//! | neither | up to the enclosing window, or the end of the stream |
//!
//! A fragment answers with a [`Resolution`]. `NoMatch` is not an error: the
//! caller rewinds to its mark and tries the next alternative. Only
//! inconsistencies that no amount of backtracking can fix are returned as
//! [`BindingError`]s.

use super::content::{ComplexType, Content, Element, Value};
use super::cursor::{Delimiter, ParseCursor, Scan};
use super::error::{BindingError, Diagnostics, Result};
use super::flat::BindingContext;
use super::formatter::FormatterParams;
use super::regex_cache;
use super::schema::{Field, Fragment, FragmentAttrs, Record};
use super::source::ReadableSource;
use super::window::{PartialFlatUnmarshaller, Window, WindowedList};
use std::io::Read;
use std::rc::Rc;

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

/// Outcome of parsing one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The fragment matched exactly
    Match,
    /// The fragment matched, but the last `n` consumed characters belong to the parent
    Partial(u64),
    /// The fragment does not match here
    NoMatch,
}

/// Join a parent path and a `map` attribute
pub(crate) fn child_path(path: &str, map: &str) -> String {
    if path.is_empty() {
        map.to_string()
    } else {
        format!("{}/{}", path, map)
    }
}

/// Remove padding from the side opposite to the alignment
fn trim_pad<'t>(text: &'t str, pad: &str, left_align: bool) -> &'t str {
    if left_align {
        text.trim_end_matches(pad)
    } else {
        text.trim_start_matches(pad)
    }
}

/// The text a fragment may read
struct ReadWindow {
    start: u64,
    /// Inner limit for the children
    end: Option<u64>,
    /// Result of the separator scan, for delimited fragments
    scan: Option<Scan>,
    /// Whether the window is narrower than the enclosing one by construction
    bounded: bool,
}

/// One parse over a cursor
pub(crate) struct Unmarshaller<'a, R: Read> {
    context: &'a Rc<BindingContext>,
    source: &'a Rc<dyn ReadableSource>,
    windows: &'a [Window],
    cursor: ParseCursor<R>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a, R: Read> Unmarshaller<'a, R> {
    pub(crate) fn new(
        context: &'a Rc<BindingContext>,
        source: &'a Rc<dyn ReadableSource>,
        windows: &'a [Window],
        cursor: ParseCursor<R>,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            context,
            source,
            windows,
            cursor,
            diagnostics,
        }
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Parse the whole stream into an instance of `root_type`
    pub(crate) fn unmarshal_root(
        &mut self,
        root: &Record,
        root_type: &Rc<ComplexType>,
    ) -> Result<Content> {
        let mut content = root_type.new_instance();
        match self.parse_record("", root, &mut content, None)? {
            Resolution::Match => {}
            Resolution::Partial(n) => self.cursor.unread(n)?,
            Resolution::NoMatch => {
                let message = if self.diagnostics.is_empty() {
                    "Could not parse anything".to_string()
                } else {
                    format!("Could not parse anything:\n{}", self.diagnostics)
                };
                return Err(BindingError::mismatch(message, self.cursor.position()));
            }
        }

        let trailing = self.cursor.read_rest()?;
        if !trailing.is_empty() {
            log_debug!("{} trailing characters after the root", trailing.chars().count());
            if !self.context.allow_trailing {
                return Err(BindingError::TrailingContent {
                    trailing,
                    pattern: None,
                });
            }
            if let Some(pattern) = self.context.trailing_match.as_deref() {
                if !regex_cache::full_match(pattern, &trailing) {
                    return Err(BindingError::TrailingContent {
                        trailing,
                        pattern: Some(pattern.to_string()),
                    });
                }
            }
        }
        Ok(content)
    }

    /// Parse up to `count` consecutive occurrences of `record`
    pub(crate) fn parse_batch(
        &mut self,
        path: &str,
        record: &Record,
        element_type: &Rc<ComplexType>,
        count: usize,
    ) -> Result<Vec<Content>> {
        let mut contents = Vec::with_capacity(count);
        while contents.len() < count && !self.cursor.at_end(None)? {
            let mark = self.cursor.mark();
            let mut occurrence = element_type.new_instance();
            let resolution = match self.parse_record(path, record, &mut occurrence, None) {
                Ok(resolution) => resolution,
                Err(e) => {
                    self.cursor.release(mark);
                    return Err(e);
                }
            };
            match resolution {
                Resolution::Match => {
                    self.cursor.release(mark);
                    contents.push(occurrence);
                    self.cursor.compact();
                }
                Resolution::Partial(n) if record.is_partial_allowed() => {
                    self.cursor.release(mark);
                    self.cursor.unread(n)?;
                    contents.push(occurrence);
                    break;
                }
                _ => {
                    self.cursor.reset(&mark);
                    self.cursor.release(mark);
                    break;
                }
            }
        }
        Ok(contents)
    }

    // ========================================================================
    // Fragments
    // ========================================================================

    fn parse(
        &mut self,
        path: &str,
        fragment: &Fragment,
        target: &mut Content,
        limit: Option<u64>,
    ) -> Result<Resolution> {
        match fragment {
            Fragment::Record(record) => self.parse_record(path, record, target, limit),
            Fragment::Field(field) => self.parse_field(field, target, limit),
        }
    }

    fn open_window(&mut self, attrs: &FragmentAttrs, limit: Option<u64>) -> Result<ReadWindow> {
        let start = self.cursor.position();
        if let Some(delimiter) = Delimiter::from_attrs(attrs) {
            let look_ahead = attrs.max_length.unwrap_or(self.context.max_look_ahead) as u64;
            let scan = self.cursor.scan(&delimiter, start + look_ahead, limit)?;
            return Ok(ReadWindow {
                start,
                end: Some(scan.content_end),
                scan: Some(scan),
                bounded: true,
            });
        }
        match attrs.length {
            Some(length) => {
                let wanted = start + length as u64;
                let wanted = limit.map_or(wanted, |limit| wanted.min(limit));
                let end = self.cursor.ensure(wanted)?.min(wanted);
                Ok(ReadWindow {
                    start,
                    end: Some(end),
                    scan: None,
                    bounded: true,
                })
            }
            None => Ok(ReadWindow {
                start,
                end: limit,
                scan: None,
                bounded: false,
            }),
        }
    }

    fn parse_field(
        &mut self,
        field: &Field,
        target: &mut Content,
        limit: Option<u64>,
    ) -> Result<Resolution> {
        let window = self.open_window(&field.attrs, limit)?;
        let start = window.start;

        let raw = match &window.scan {
            Some(scan) => {
                if !scan.found() && !(field.can_end && scan.reached_limit) {
                    self.diagnostics.error(
                        format!("Could not find the separator for the field '{}'", field),
                        start,
                    );
                    return Ok(Resolution::NoMatch);
                }
                let text = self.cursor.read_to(scan.content_end)?;
                self.cursor.skip(scan.delimiter_width())?;
                text
            }
            None => {
                if let (Some(length), Some(end)) = (field.attrs.length, window.end) {
                    if end - start < length as u64 {
                        self.diagnostics.error(
                            format!(
                                "There are not enough characters for the field '{}': {} < {}",
                                field,
                                end - start,
                                length
                            ),
                            start,
                        );
                        return Ok(Resolution::NoMatch);
                    }
                }
                match window.end {
                    Some(end) => self.cursor.read_to(end)?,
                    None => self.cursor.read_rest()?,
                }
            }
        };

        let text = match field.attrs.length {
            Some(_) => trim_pad(&raw, field.pad_str(), field.left_align),
            None => raw.as_str(),
        };
        log_trace!("{} read '{}' at {}", field, raw, start);

        if let Some(fixed) = field.fixed.as_deref() {
            if raw != fixed && text != fixed {
                self.diagnostics.error(
                    format!(
                        "The field '{}' does not have the correct fixed value, expecting '{}', received '{}'",
                        field, fixed, raw
                    ),
                    start,
                );
                return Ok(Resolution::NoMatch);
            }
        }
        if let Some(pattern) = field.pattern.as_deref() {
            if !regex_cache::full_match(pattern, &raw) && !regex_cache::full_match(pattern, text) {
                self.diagnostics.error(
                    format!(
                        "The field '{}' does not match the regex '{}', received '{}'",
                        field, pattern, raw
                    ),
                    start,
                );
                return Ok(Resolution::NoMatch);
            }
        }

        let map = match field.attrs.map.as_deref() {
            Some(map) => map,
            None => return Ok(Resolution::Match),
        };
        if let Some(min) = field.attrs.min_length {
            let actual = text.chars().count();
            if actual < min {
                self.diagnostics.error(
                    format!(
                        "The field '{}' is too short: {} < {}",
                        field, actual, min
                    ),
                    start,
                );
                return Ok(Resolution::NoMatch);
            }
        }

        let value = if text.is_empty() {
            Value::Nil
        } else {
            match self.convert(field, map, text, target, start)? {
                Some(value) => value,
                None => return Ok(Resolution::NoMatch),
            }
        };
        target.set(map, value)?;
        Ok(Resolution::Match)
    }

    /// Convert field text, `None` if the converter rejects it
    fn convert(
        &mut self,
        field: &Field,
        map: &str,
        text: &str,
        target: &Content,
        offset: u64,
    ) -> Result<Option<Value>> {
        let context = self.context;
        if let Some(key) = field.formatter.as_deref() {
            let formatter = context
                .formatters
                .get(key)
                .ok_or_else(|| BindingError::Formatter {
                    formatter: key.to_string(),
                    fragment: field.to_string(),
                    cause: "no formatter registered under this key".to_string(),
                })?;
            let params = FormatterParams::for_field(field, formatter.as_ref());
            return formatter
                .unmarshal(text, &params)
                .map(Some)
                .map_err(|e| BindingError::Formatter {
                    formatter: key.to_string(),
                    fragment: field.to_string(),
                    cause: e.to_string(),
                });
        }

        let kind = target
            .complex_type()
            .get(map)
            .and_then(Element::scalar_kind)
            .ok_or_else(|| {
                BindingError::schema(format!(
                    "The field '{}' maps to '{}' which is not a scalar element of '{}'",
                    field,
                    map,
                    target.complex_type().name()
                ))
            })?;
        match context.converter.to_value(text, kind) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.diagnostics.error(
                    format!("Can not convert the value of the field '{}': {}", field, e),
                    offset,
                );
                Ok(None)
            }
        }
    }

    fn parse_record(
        &mut self,
        path: &str,
        record: &Record,
        target: &mut Content,
        limit: Option<u64>,
    ) -> Result<Resolution> {
        let window = self.open_window(&record.attrs, limit)?;
        log_debug!("Parsing {} at {} (window end {:?})", record, window.start, window.end);
        let mut committed = 0usize;

        for child in &record.children {
            if let Fragment::Record(nested) = child {
                if let Some(map) = nested.attrs.map.as_deref() {
                    match self.parse_occurrences(path, record, nested, map, target, window.end)? {
                        Some(count) => committed += count,
                        None => return Ok(Resolution::NoMatch),
                    }
                    continue;
                }
            }

            let mark = self.cursor.mark();
            let offset = mark.position();
            let resolution = match self.parse(path, child, target, window.end) {
                Ok(resolution) => resolution,
                Err(e) => {
                    self.cursor.release(mark);
                    return Err(e);
                }
            };
            match (resolution, child) {
                (Resolution::Match, _) => {
                    self.cursor.release(mark);
                    if child.as_record().is_some() {
                        self.diagnostics.committed();
                    }
                    committed += 1;
                }
                (Resolution::Partial(n), Fragment::Record(nested)) if nested.is_partial_allowed() => {
                    self.cursor.release(mark);
                    self.cursor.unread(n)?;
                    self.diagnostics.committed();
                    committed += 1;
                }
                (Resolution::NoMatch, Fragment::Record(nested)) if nested.is_optional() => {
                    self.cursor.reset(&mark);
                    self.cursor.release(mark);
                    self.diagnostics
                        .warn(format!("Skipped the optional {} in {}", nested, record), offset);
                }
                _ => {
                    self.cursor.reset(&mark);
                    self.cursor.release(mark);
                    self.diagnostics
                        .error(format!("Could not parse {} in {}", child, record), offset);
                    return Ok(Resolution::NoMatch);
                }
            }
        }

        if committed == 0 {
            self.diagnostics
                .error(format!("Nothing could be parsed for {}", record), window.start);
            return Ok(Resolution::NoMatch);
        }

        let consumed_end = self.cursor.position();
        if let (true, Some(end)) = (window.bounded, window.end) {
            if consumed_end < end {
                let remaining = end - consumed_end;
                if window.scan.as_ref().is_some_and(|scan| !scan.found()) {
                    self.cursor.skip(remaining)?;
                    log_debug!("{} is partial, {} characters belong to the parent", record, remaining);
                    return Ok(Resolution::Partial(remaining));
                }
                return Err(BindingError::DanglingContent {
                    fragment: record.to_string(),
                    remainder: self.cursor.text(consumed_end, end),
                    offset: consumed_end,
                });
            }
        }

        let width = consumed_end - window.start;
        if let Some(length) = record.attrs.length {
            if width != length as u64 {
                return Err(BindingError::LengthViolation {
                    fragment: record.to_string(),
                    expected: length as u64,
                    actual: width,
                    minimum: false,
                    offset: consumed_end,
                });
            }
        } else if let Some(min) = record.attrs.min_length {
            if width < min as u64 {
                return Err(BindingError::LengthViolation {
                    fragment: record.to_string(),
                    expected: min as u64,
                    actual: width,
                    minimum: true,
                    offset: consumed_end,
                });
            }
        }

        if let Some(scan) = &window.scan {
            self.cursor.skip(scan.delimiter_width())?;
        }
        Ok(Resolution::Match)
    }

    // ========================================================================
    // Repetition
    // ========================================================================

    /// Parse the occurrences of a mapped record
    ///
    /// Returns the number of committed occurrences, or `None` if the parent
    /// has to resolve as NoMatch.
    fn parse_occurrences(
        &mut self,
        path: &str,
        parent: &Record,
        record: &Record,
        map: &str,
        target: &mut Content,
        limit: Option<u64>,
    ) -> Result<Option<usize>> {
        let element = target.complex_type().get(map).cloned().ok_or_else(|| {
            BindingError::schema(format!(
                "The element '{}' does not exist in type '{}'",
                map,
                target.complex_type().name()
            ))
        })?;
        let element_type = element.complex_type().cloned().ok_or_else(|| {
            BindingError::schema(format!(
                "The {} maps to '{}' which is not a complex element",
                record, map
            ))
        })?;
        let max = record.max_occurs.unwrap_or(element.max_occurs) as usize;
        let min = record.min_occurs.unwrap_or(element.min_occurs) as usize;
        let full_path = child_path(path, map);
        let windows = self.windows;
        let window = if element.is_list() {
            windows.iter().find(|window| window.path == full_path)
        } else {
            None
        };
        // repeating occurrences release everything before them once committed
        let buffer = max != 1 || parent.should_buffer();

        let mut count = 0usize;
        while max == 0 || count < max {
            if self.cursor.at_end(limit)? {
                break;
            }
            let mark = self.cursor.mark();
            let offset = mark.position();
            let mut occurrence = element_type.new_instance();
            let resolution = match self.parse_record(&full_path, record, &mut occurrence, limit) {
                Ok(resolution) => resolution,
                Err(e) => {
                    self.cursor.release(mark);
                    return Err(e);
                }
            };
            match resolution {
                Resolution::Match => {
                    self.cursor.release(mark);
                    self.commit(target, map, &element, window, record, &element_type, offset, occurrence)?;
                    count += 1;
                    self.diagnostics.committed();
                    if buffer {
                        self.cursor.compact();
                    }
                }
                Resolution::Partial(n) if record.is_partial_allowed() => {
                    self.cursor.release(mark);
                    self.cursor.unread(n)?;
                    self.commit(target, map, &element, window, record, &element_type, offset, occurrence)?;
                    count += 1;
                    self.diagnostics.committed();
                    break;
                }
                Resolution::Partial(_) => {
                    self.cursor.reset(&mark);
                    self.cursor.release(mark);
                    if count == 0 {
                        self.diagnostics.error(
                            format!("The {} only matched partially", record),
                            offset,
                        );
                        return Ok(None);
                    }
                    break;
                }
                Resolution::NoMatch => {
                    self.cursor.reset(&mark);
                    self.cursor.release(mark);
                    break;
                }
            }
        }
        log_debug!("Committed {} occurrences of {}", count, full_path);

        if count < min {
            let bounds = match max {
                0 => format!("[{}, unbounded]", min),
                max => format!("[{}, {}]", min, max),
            };
            if count == 0 {
                self.diagnostics.warn(
                    format!("Parsing {} failed after 0 of {} iterations", map, bounds),
                    self.cursor.position(),
                );
                return Ok(None);
            }
            return Err(BindingError::mismatch(
                format!(
                    "The {} does not have enough iterations: {} of {}",
                    record, count, bounds
                ),
                self.cursor.position(),
            ));
        }
        Ok(Some(count))
    }

    /// Store a parsed occurrence in its parent
    #[allow(clippy::too_many_arguments)]
    fn commit(
        &mut self,
        target: &mut Content,
        map: &str,
        element: &Element,
        window: Option<&Window>,
        record: &Record,
        element_type: &Rc<ComplexType>,
        offset: u64,
        occurrence: Content,
    ) -> Result<()> {
        if !element.is_list() {
            return target.set(map, Value::Record(occurrence));
        }
        let window = match window {
            Some(window) => window,
            None => {
                target.push(map, Value::Record(occurrence))?;
                return Ok(());
            }
        };

        let fresh = match target.get(map) {
            None | Some(Value::Nil) => true,
            Some(Value::List(items)) => items.is_empty(),
            Some(_) => false,
        };
        if fresh {
            let others: Vec<Window> = self
                .windows
                .iter()
                .filter(|other| other.path != window.path)
                .cloned()
                .collect();
            let unmarshaller = PartialFlatUnmarshaller::new(
                Rc::clone(self.context),
                Rc::clone(self.source),
                Rc::new(record.clone()),
                Rc::clone(element_type),
                window.path.clone(),
                others,
            );
            log_debug!("Windowing {} (size {}, batch {})", window.path, window.size, window.batch_size);
            target.set(
                map,
                Value::Windowed(WindowedList::new(window.clone(), Rc::new(unmarshaller))),
            )?;
        }
        match target.get_mut(map) {
            Some(Value::Windowed(list)) => {
                list.record_offset(offset, occurrence);
                Ok(())
            }
            _ => Err(BindingError::schema(format!(
                "The element '{}' already holds values and can not be windowed",
                window.path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::charset::Charset;
    use crate::binding::content::ScalarKind;
    use crate::binding::convert::DefaultConverter;
    use crate::binding::cursor::COMPACT_THRESHOLD;
    use crate::binding::error::Severity;
    use crate::binding::formatter::FormatterRegistry;
    use crate::binding::schema::DEFAULT_MAX_LOOK_AHEAD;
    use crate::binding::source::MemorySource;
    use std::io::Cursor;

    fn context() -> Rc<BindingContext> {
        Rc::new(BindingContext {
            max_look_ahead: DEFAULT_MAX_LOOK_AHEAD,
            formatters: FormatterRegistry::default(),
            converter: Rc::new(DefaultConverter),
            charset: Charset::Utf8,
            allow_trailing: false,
            trailing_match: None,
        })
    }

    fn person() -> Rc<ComplexType> {
        Rc::new(
            ComplexType::new("person")
                .scalar("first", ScalarKind::String)
                .scalar("last", ScalarKind::String)
                .scalar("age", ScalarKind::Integer),
        )
    }

    fn roster() -> Rc<ComplexType> {
        Rc::new(
            ComplexType::new("roster")
                .list("people", person())
                .scalar("rest", ScalarKind::String),
        )
    }

    struct Outcome {
        result: Result<Resolution>,
        content: Content,
        position: u64,
        buffered: usize,
        diagnostics: Diagnostics,
    }

    fn run_as(ty: &Rc<ComplexType>, record: &Record, input: &str) -> Outcome {
        let context = context();
        let source: Rc<dyn ReadableSource> = Rc::new(MemorySource::from(input));
        let cursor = ParseCursor::new(Cursor::new(input.as_bytes().to_vec()), Charset::Utf8);
        let mut diagnostics = Diagnostics::new();
        let mut content = ty.new_instance();
        let (result, position, buffered) = {
            let mut engine = Unmarshaller::new(&context, &source, &[], cursor, &mut diagnostics);
            let result = engine.parse_record("", record, &mut content, None);
            (result, engine.cursor.position(), engine.cursor.buffered())
        };
        Outcome {
            result,
            content,
            position,
            buffered,
            diagnostics,
        }
    }

    /// Parse `record` into a fresh person
    ///
    /// Returns the resolution, the filled content, the cursor position and
    /// the collected diagnostics.
    fn run(record: &Record, input: &str) -> (Result<Resolution>, Content, u64, Diagnostics) {
        let outcome = run_as(&person(), record, input);
        (
            outcome.result,
            outcome.content,
            outcome.position,
            outcome.diagnostics,
        )
    }

    fn firsts(content: &Content) -> Vec<String> {
        content
            .get("people")
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.as_record()?.get("first")?.as_str().map(str::to_string))
            .collect()
    }

    /// Two-character people inside `|`-separated windows of at most 5 characters
    fn pairs(allow_partial: bool) -> Record {
        Record::new()
            .child(
                Record::new()
                    .map("people")
                    .separator("|")
                    .max_length(5)
                    .allow_partial(allow_partial)
                    .child(Field::new().map("first").length(2)),
            )
            .child(Field::new().map("rest"))
    }

    /// One person per line followed by a `rest` line
    fn lines(people: Record) -> Record {
        Record::new()
            .child(
                people
                    .map("people")
                    .separator("\\n")
                    .child(Field::new().map("first").matching("[a-z]+")),
            )
            .child(Field::new().map("rest").separator("\\n"))
    }

    #[test]
    fn test_delimited_fields() {
        let record = Record::new()
            .separator("\\n")
            .child(Field::new().map("first").separator(","))
            .child(Field::new().map("last").separator(",").can_end());
        let (result, content, position, _) = run(&record, "John,Doe\nrest");
        assert_eq!(result.unwrap(), Resolution::Match);
        assert_eq!(content.get("first").and_then(Value::as_str), Some("John"));
        assert_eq!(content.get("last").and_then(Value::as_str), Some("Doe"));
        // the record separator is consumed
        assert_eq!(position, 9);
    }

    #[test]
    fn test_missing_separator_without_can_end() {
        let record = Record::new()
            .child(Field::new().map("first").separator(","))
            .child(Field::new().map("last").separator(","));
        let (result, _, _, diagnostics) = run(&record, "John,Doe");
        assert_eq!(result.unwrap(), Resolution::NoMatch);
        assert!(diagnostics.at_least(Severity::Error).count() >= 1);
    }

    #[test]
    fn test_can_end_stops_at_look_ahead_bound() {
        // the separator lies beyond maxLength, so the scan stops at the bound
        let record = Record::new().child(
            Field::new()
                .map("first")
                .separator(",")
                .max_length(3)
                .can_end(),
        );
        let (result, _, _, _) = run(&record, "Johnny,");
        assert_eq!(result.unwrap(), Resolution::NoMatch);
    }

    #[test]
    fn test_fixed_length_trims_pad() {
        let record = Record::new()
            .child(Field::new().map("first").length(4).left_align())
            .child(Field::new().map("age").length(3).pad("0"));
        let (result, content, _, _) = run(&record, "Jo  031");
        assert_eq!(result.unwrap(), Resolution::Match);
        assert_eq!(content.get("first").and_then(Value::as_str), Some("Jo"));
        assert_eq!(content.get("age").and_then(Value::as_int), Some(31));
    }

    #[test]
    fn test_short_fixed_field_is_no_match() {
        let record = Record::new().child(Field::new().map("first").length(4));
        let (result, _, _, _) = run(&record, "Jo");
        assert_eq!(result.unwrap(), Resolution::NoMatch);
    }

    #[test]
    fn test_fixed_and_match_constraints() {
        let fixed = Record::new()
            .child(Field::new().fixed("E").separator(";"))
            .child(Field::new().map("first"));
        assert_eq!(run(&fixed, "E;Ann").0.unwrap(), Resolution::Match);
        assert_eq!(run(&fixed, "X;Ann").0.unwrap(), Resolution::NoMatch);

        let matched = Record::new().child(Field::new().map("age").matching("[0-9]+"));
        assert_eq!(run(&matched, "42").0.unwrap(), Resolution::Match);
        assert_eq!(run(&matched, "4a").0.unwrap(), Resolution::NoMatch);
    }

    #[test]
    fn test_conversion_failure_is_soft() {
        let record = Record::new().child(Field::new().map("age"));
        let (result, _, _, diagnostics) = run(&record, "old");
        assert_eq!(result.unwrap(), Resolution::NoMatch);
        assert!(diagnostics.to_string().contains("Can not convert"));
    }

    #[test]
    fn test_empty_value_is_nil() {
        let record = Record::new()
            .child(Field::new().map("first").separator(";"))
            .child(Field::new().map("last"));
        let (result, content, _, _) = run(&record, ";Doe");
        assert_eq!(result.unwrap(), Resolution::Match);
        assert!(content.get("first").is_some_and(Value::is_nil));
    }

    #[test]
    fn test_dangling_content_is_fatal() {
        let record = Record::new()
            .separator("\\n")
            .child(Field::new().map("first").separator(","));
        let (result, _, _, _) = run(&record, "a,b\n");
        assert!(matches!(result, Err(BindingError::DanglingContent { ref remainder, .. }) if remainder == "b"));
    }

    #[test]
    fn test_partial_when_separator_missing() {
        // the record window ends at the look-ahead bound, the child stops early
        let record = Record::new()
            .separator("|")
            .max_length(5)
            .child(Field::new().map("first").length(2));
        let (result, _, position, _) = run(&record, "abcdefgh");
        assert_eq!(result.unwrap(), Resolution::Partial(3));
        assert_eq!(position, 5);
    }

    #[test]
    fn test_allowed_partial_occurrence_hands_back_its_tail() {
        let outcome = run_as(&roster(), &pairs(true), "ab|cd|efgh");
        assert_eq!(outcome.result.unwrap(), Resolution::Match);
        assert_eq!(firsts(&outcome.content), vec!["ab", "cd", "ef"]);
        // the unread tail is parsed by the next sibling
        assert_eq!(outcome.content.get("rest").and_then(Value::as_str), Some("gh"));
        assert_eq!(outcome.position, 10);
    }

    #[test]
    fn test_allowed_partial_first_occurrence_is_committed() {
        let outcome = run_as(&roster(), &pairs(true), "efgh");
        assert_eq!(outcome.result.unwrap(), Resolution::Match);
        assert_eq!(firsts(&outcome.content), vec!["ef"]);
        assert_eq!(outcome.content.get("rest").and_then(Value::as_str), Some("gh"));
    }

    #[test]
    fn test_partial_occurrence_keeps_earlier_commits() {
        let outcome = run_as(&roster(), &pairs(false), "ab|cd|efgh");
        assert_eq!(outcome.result.unwrap(), Resolution::Match);
        assert_eq!(firsts(&outcome.content), vec!["ab", "cd"]);
        // the partial occurrence is rolled back entirely
        assert_eq!(outcome.content.get("rest").and_then(Value::as_str), Some("efgh"));
    }

    #[test]
    fn test_partial_first_occurrence_is_no_match() {
        let outcome = run_as(&roster(), &pairs(false), "efgh");
        assert_eq!(outcome.result.unwrap(), Resolution::NoMatch);
        assert!(outcome.diagnostics.to_string().contains("only matched partially"));
    }

    #[test]
    fn test_max_occurs_stops_repetition() {
        let outcome = run_as(&roster(), &lines(Record::new().max_occurs(2)), "a\nb\nc\n");
        assert_eq!(outcome.result.unwrap(), Resolution::Match);
        assert_eq!(firsts(&outcome.content), vec!["a", "b"]);
        assert_eq!(outcome.content.get("rest").and_then(Value::as_str), Some("c"));
        assert_eq!(outcome.position, 6);
    }

    #[test]
    fn test_too_few_occurrences_is_fatal() {
        let people = || Record::new().min_occurs(3);
        for input in ["a\nb\n", "a\nb\n42\n"] {
            let outcome = run_as(&roster(), &lines(people()), input);
            assert!(matches!(
                outcome.result,
                Err(BindingError::StructuralMismatch { ref message, .. })
                    if message.contains("does not have enough iterations: 2 of [3, unbounded]")
            ));
        }
    }

    #[test]
    fn test_no_occurrence_below_min_is_no_match() {
        let outcome = run_as(&roster(), &lines(Record::new().min_occurs(1)), "42\n");
        assert_eq!(outcome.result.unwrap(), Resolution::NoMatch);
        assert!(outcome.diagnostics.to_string().contains("failed after 0 of [1, unbounded]"));
    }

    #[test]
    fn test_unbounded_list_releases_committed_input() {
        let rows = 20_000;
        let input: String = (0..rows).map(|i| format!("name{:06}\n", i)).collect();
        let record = Record::new().child(
            Record::new()
                .map("people")
                .separator("\\n")
                .child(Field::new().map("first")),
        );
        assert!(input.len() > 2 * COMPACT_THRESHOLD);

        let outcome = run_as(&roster(), &record, &input);
        assert_eq!(outcome.result.unwrap(), Resolution::Match);
        assert_eq!(firsts(&outcome.content).len(), rows);
        assert_eq!(outcome.position, input.len() as u64);
        assert!(outcome.buffered < 2 * COMPACT_THRESHOLD);
    }

    #[test]
    fn test_length_violation() {
        let record = Record::new()
            .min_length(6)
            .child(Field::new().map("first").separator(";"));
        let (result, _, _, _) = run(&record, "ab;");
        assert!(matches!(
            result,
            Err(BindingError::LengthViolation { minimum: true, actual: 3, .. })
        ));
    }

    #[test]
    fn test_optional_structural_record_is_skipped() {
        let record = Record::new()
            .child(
                Record::new()
                    .min_occurs(0)
                    .child(Field::new().fixed("X").separator(";")),
            )
            .child(Field::new().map("first"));
        let (result, content, _, diagnostics) = run(&record, "Ann");
        assert_eq!(result.unwrap(), Resolution::Match);
        assert_eq!(content.get("first").and_then(Value::as_str), Some("Ann"));
        assert!(diagnostics
            .messages()
            .iter()
            .any(|m| m.severity == Severity::Warning && m.message.contains("Skipped")));
    }

    #[test]
    fn test_trim_pad() {
        assert_eq!(trim_pad("Jo  ", " ", true), "Jo");
        assert_eq!(trim_pad("0031", "0", false), "31");
        assert_eq!(trim_pad("  Jo", " ", true), "  Jo");
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("", "employees"), "employees");
        assert_eq!(child_path("companies", "employees"), "companies/employees");
    }
}
