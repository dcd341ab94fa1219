//! Parse cursor over a character stream
//!
//! The cursor decodes characters lazily from a byte reader in fixed-size
//! chunks and keeps them in a buffer for as long as something may still
//! rewind to them.
//!
//! # Architecture
//!
//! ```text
//! base              earliest mark        position            buffered end
//!  │                     │                   │                     │
//!  ▼                     ▼                   ▼                     ▼
//!  [ compactable ........][ retained for rewinds ][ lookahead ......]  ← reader
//! ```
//!
//! - **Position** is an absolute, monotonically growing character count. A
//!   cursor created with [`ParseCursor::at_offset`] starts counting at that
//!   offset, so offsets recorded in one parse are valid in the next.
//! - **Marks** are nested rewind points. Characters from the earliest live
//!   mark onwards are never dropped.
//! - **Lookahead** is bounded by the caller: delimiter scans never read past
//!   the bound they are given.

use super::charset::Charset;
use super::regex_cache;
use super::schema::FragmentAttrs;
use std::io::{self, Read};

/// Size of each read from the underlying reader (bytes)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Unreachable characters tolerated before [`ParseCursor::compact`] shifts the buffer
pub const COMPACT_THRESHOLD: usize = CHUNK_SIZE;

/// A rewind point handed out by [`ParseCursor::mark`]
///
/// A mark must be given back through [`ParseCursor::release`]; until then
/// everything from its position onwards stays buffered.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a mark keeps its characters buffered until it is released"]
pub struct Mark {
    position: u64,
}

impl Mark {
    /// The position this mark rewinds to
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }
}

/// The separator a fragment scans for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delimiter {
    /// Literal text, matched character by character
    Literal(Vec<char>),
    /// A pattern matched against exactly `width` characters
    Pattern {
        /// The (unanchored) pattern
        pattern: String,
        /// Width of the window it is matched against
        width: usize,
    },
}

impl Delimiter {
    /// Build the delimiter described by a fragment's attributes
    pub fn from_attrs(attrs: &FragmentAttrs) -> Option<Self> {
        let separator = attrs.normalized_separator()?;
        Some(match attrs.separator_length {
            Some(width) => Delimiter::Pattern {
                pattern: separator,
                width,
            },
            None => Delimiter::Literal(separator.chars().collect()),
        })
    }

    /// Number of characters a match occupies
    #[inline]
    pub fn width(&self) -> usize {
        match self {
            Delimiter::Literal(chars) => chars.len(),
            Delimiter::Pattern { width, .. } => *width,
        }
    }
}

/// Outcome of a delimiter scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// Absolute position where the content ends (the delimiter starts)
    pub content_end: u64,
    /// The delimiter text actually matched, if found
    pub delimiter: Option<String>,
    /// When not found: whether the scan stopped at the enclosing limit or the
    /// end of the stream rather than at the lookahead bound
    pub reached_limit: bool,
}

impl Scan {
    /// Whether the delimiter was found
    #[inline]
    pub fn found(&self) -> bool {
        self.delimiter.is_some()
    }

    /// Width of the matched delimiter (0 if not found)
    #[inline]
    pub fn delimiter_width(&self) -> u64 {
        self.delimiter
            .as_ref()
            .map(|d| d.chars().count() as u64)
            .unwrap_or(0)
    }
}

/// Character cursor with bounded lookahead and rewindable marks
pub struct ParseCursor<R: Read> {
    reader: R,
    charset: Charset,
    /// Bytes read but not yet decoded (an incomplete multi-byte sequence)
    pending: Vec<u8>,
    /// Read buffer
    chunk: Vec<u8>,
    /// Decoded characters, `buffer[0]` sits at absolute position `base`
    buffer: Vec<char>,
    base: u64,
    position: u64,
    marks: Vec<u64>,
    exhausted: bool,
}

impl<R: Read> ParseCursor<R> {
    /// Create a cursor at the start of `reader`
    pub fn new(reader: R, charset: Charset) -> Self {
        Self {
            reader,
            charset,
            pending: Vec::new(),
            chunk: vec![0u8; CHUNK_SIZE],
            buffer: Vec::new(),
            base: 0,
            position: 0,
            marks: Vec::new(),
            exhausted: false,
        }
    }

    /// Create a cursor positioned `offset` characters into `reader`
    pub fn at_offset(reader: R, charset: Charset, offset: u64) -> io::Result<Self> {
        let mut cursor = Self::new(reader, charset);
        let mut remaining = offset;
        while remaining > 0 {
            if cursor.buffer.is_empty() && !cursor.fill()? {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("Could not skip to position {}", offset),
                ));
            }
            let drop = remaining.min(cursor.buffer.len() as u64) as usize;
            cursor.buffer.drain(..drop);
            cursor.base += drop as u64;
            remaining -= drop as u64;
        }
        cursor.position = cursor.base;
        Ok(cursor)
    }

    /// Decode the next chunk; returns false once the reader is exhausted
    fn fill(&mut self) -> io::Result<bool> {
        while !self.exhausted {
            let read = match self.reader.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            let before = self.buffer.len();
            if read == 0 {
                self.exhausted = true;
                if !self.pending.is_empty() {
                    let pending = std::mem::take(&mut self.pending);
                    self.charset.decode(&pending, &mut self.buffer, true)?;
                }
            } else {
                self.pending.extend_from_slice(&self.chunk[..read]);
                let consumed = self.charset.decode(&self.pending, &mut self.buffer, false)?;
                self.pending.drain(..consumed);
            }
            if self.buffer.len() > before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Make sure characters up to `end` (exclusive) are buffered if they exist
    ///
    /// Returns the absolute end of the buffered characters, which is below
    /// `end` only at the end of the stream.
    pub fn ensure(&mut self, end: u64) -> io::Result<u64> {
        while self.buffered_end() < end {
            if !self.fill()? {
                break;
            }
        }
        Ok(self.buffered_end())
    }

    /// Absolute end of the buffered characters
    #[inline]
    fn buffered_end(&self) -> u64 {
        self.base + self.buffer.len() as u64
    }

    #[inline]
    fn index(&self, position: u64) -> usize {
        (position - self.base) as usize
    }

    /// Number of characters consumed so far (absolute)
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of characters currently buffered
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the cursor sits at `limit` or at the end of the stream
    pub fn at_end(&mut self, limit: Option<u64>) -> io::Result<bool> {
        if limit.is_some_and(|limit| self.position >= limit) {
            return Ok(true);
        }
        Ok(self.ensure(self.position + 1)? <= self.position)
    }

    /// Characters available from the position up to `end`
    pub fn available(&mut self, end: u64) -> io::Result<u64> {
        Ok(self.ensure(end)?.min(end).saturating_sub(self.position))
    }

    /// Copy the buffered text between two absolute positions
    pub fn text(&self, from: u64, to: u64) -> String {
        let from = self.index(from.max(self.base));
        let to = self.index(to.min(self.buffered_end())).max(from);
        self.buffer[from..to].iter().collect()
    }

    /// Consume and return the text up to `end`
    pub fn read_to(&mut self, end: u64) -> io::Result<String> {
        let end = self.ensure(end)?.min(end).max(self.position);
        let text = self.text(self.position, end);
        self.position = end;
        Ok(text)
    }

    /// Consume and return everything left in the stream
    pub fn read_rest(&mut self) -> io::Result<String> {
        while self.fill()? {}
        self.read_to(self.buffered_end())
    }

    /// Place a rewind point at the current position
    pub fn mark(&mut self) -> Mark {
        self.marks.push(self.position);
        Mark {
            position: self.position,
        }
    }

    /// Rewind to a mark (the mark stays live)
    #[inline]
    pub fn reset(&mut self, mark: &Mark) {
        self.position = mark.position;
    }

    /// Give a mark back, allowing its characters to be compacted
    pub fn release(&mut self, mark: Mark) {
        if let Some(index) = self.marks.iter().rposition(|&p| p == mark.position) {
            self.marks.remove(index);
        }
    }

    /// Skip up to `n` buffered-or-readable characters, returning how many were skipped
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let end = self.ensure(self.position + n)?.min(self.position + n);
        let skipped = end - self.position;
        self.position = end;
        Ok(skipped)
    }

    /// Step back over the last `n` consumed characters
    pub fn unread(&mut self, n: u64) -> io::Result<()> {
        let target = self.position.saturating_sub(n);
        self.seek(target)
    }

    /// Move to an absolute position inside the buffered region (or ahead of it)
    pub fn seek(&mut self, position: u64) -> io::Result<()> {
        if position < self.base {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Can not rewind to {}, the earliest buffered position is {}",
                    position, self.base
                ),
            ));
        }
        if self.ensure(position)? < position {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("Can not seek past the end of the stream to {}", position),
            ));
        }
        self.position = position;
        Ok(())
    }

    /// Drop characters no mark or rewind can reach anymore
    ///
    /// The buffer only shifts once at least [`COMPACT_THRESHOLD`] characters
    /// are unreachable, so frequent calls stay cheap.
    pub fn compact(&mut self) {
        let keep_from = self
            .marks
            .iter()
            .copied()
            .min()
            .unwrap_or(self.position)
            .min(self.position);
        let drop = keep_from.saturating_sub(self.base) as usize;
        if drop >= COMPACT_THRESHOLD {
            self.buffer.drain(..drop);
            self.base = keep_from;
        }
    }

    /// Scan ahead for `delimiter` without consuming anything
    ///
    /// The delimiter has to start at or before `bound` and end within `limit`
    /// (if any). On failure `content_end` is the end of the content actually
    /// available up to `bound`.
    pub fn scan(&mut self, delimiter: &Delimiter, bound: u64, limit: Option<u64>) -> io::Result<Scan> {
        let width = delimiter.width() as u64;
        let bound = limit.map_or(bound, |limit| bound.min(limit));
        let mut candidate = String::new();

        let mut at = self.position;
        while at <= bound {
            let end = at + width;
            if limit.is_some_and(|limit| end > limit) || self.ensure(end)? < end {
                break;
            }
            let window = &self.buffer[self.index(at)..self.index(end)];
            let matched = match delimiter {
                Delimiter::Literal(chars) => window == chars.as_slice(),
                Delimiter::Pattern { pattern, .. } => {
                    candidate.clear();
                    candidate.extend(window.iter());
                    regex_cache::full_match(pattern, &candidate)
                }
            };
            if matched {
                return Ok(Scan {
                    content_end: at,
                    delimiter: Some(window.iter().collect()),
                    reached_limit: false,
                });
            }
            at += 1;
        }

        let available = self.ensure(bound)?.min(bound);
        let reached_limit = available < bound
            || limit.is_some_and(|limit| limit <= bound)
            || self.ensure(bound + 1)? <= bound;
        Ok(Scan {
            content_end: available,
            delimiter: None,
            reached_limit,
        })
    }
}

impl<R: Read> std::fmt::Debug for ParseCursor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseCursor")
            .field("charset", &self.charset)
            .field("base", &self.base)
            .field("position", &self.position)
            .field("buffered", &self.buffer.len())
            .field("marks", &self.marks)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
