//! Windowed lists: repeated records paged in from the source on demand
//!
//! A [`Window`] on a path keeps only the first `size` occurrences of that
//! path in memory while parsing. Every occurrence's start offset is recorded,
//! so any element can be re-parsed later from a freshly opened source.
//!
//! ```text
//! offsets:  [ 0 | 27 | 54 | 81 | 108 | 135 | ... ]
//! page:     [ e0  e1  e2 ]                          size = 3
//! get(4):          re-parse from offsets[3] ──► [ e3  e4  e5 ]   batch_size = 3
//! ```

use super::content::{ComplexType, Content};
use super::cursor::ParseCursor;
use super::error::{BindingError, Diagnostics, Result};
use super::flat::BindingContext;
use super::schema::Record;
use super::source::ReadableSource;
use super::unmarshal::Unmarshaller;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Limits how many occurrences of a path are kept in memory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Window {
    /// Path of a repeated element relative to the root, e.g. `companies/employees`
    pub path: String,
    /// Number of occurrences kept materialized
    pub size: usize,
    /// Number of occurrences re-parsed per fetch
    pub batch_size: usize,
}

impl Window {
    /// Create a window (sizes below 1 are raised to 1)
    pub fn new(path: impl Into<String>, size: usize, batch_size: usize) -> Self {
        Self {
            path: path.into(),
            size: size.max(1),
            batch_size: batch_size.max(1),
        }
    }
}

/// Re-parses a run of occurrences starting at a character offset
pub trait PartialUnmarshaller {
    /// Parse `count` occurrences starting at `offset`
    fn unmarshal(&self, offset: u64, count: usize) -> Result<Vec<Content>>;
}

/// Re-parses occurrences of one record on a freshly opened source
pub struct PartialFlatUnmarshaller {
    context: Rc<BindingContext>,
    source: Rc<dyn ReadableSource>,
    record: Rc<Record>,
    element_type: Rc<ComplexType>,
    path: String,
    windows: Vec<Window>,
}

impl PartialFlatUnmarshaller {
    /// Create an unmarshaller for the occurrences at `path`
    ///
    /// `windows` are the other active windows; nested windowed paths stay
    /// windowed in re-parsed elements.
    pub fn new(
        context: Rc<BindingContext>,
        source: Rc<dyn ReadableSource>,
        record: Rc<Record>,
        element_type: Rc<ComplexType>,
        path: impl Into<String>,
        windows: Vec<Window>,
    ) -> Self {
        Self {
            context,
            source,
            record,
            element_type,
            path: path.into(),
            windows,
        }
    }
}

impl PartialUnmarshaller for PartialFlatUnmarshaller {
    fn unmarshal(&self, offset: u64, count: usize) -> Result<Vec<Content>> {
        let reader = self.source.open()?;
        let cursor = ParseCursor::at_offset(reader, self.context.charset, offset)?;
        let mut diagnostics = Diagnostics::scoped();
        let mut engine = Unmarshaller::new(
            &self.context,
            &self.source,
            &self.windows,
            cursor,
            &mut diagnostics,
        );
        let contents = engine.parse_batch(&self.path, &self.record, &self.element_type, count)?;
        if contents.len() < count {
            return Err(BindingError::mismatch(
                format!(
                    "Can not reparse windowed elements of '{}': expected {}, parsed {}",
                    self.path,
                    count,
                    contents.len()
                ),
                offset,
            ));
        }
        Ok(contents)
    }
}

#[derive(Debug, Clone, Default)]
struct Page {
    start: usize,
    items: Vec<Content>,
}

impl Page {
    fn get(&self, index: usize) -> Option<&Content> {
        index
            .checked_sub(self.start)
            .and_then(|relative| self.items.get(relative))
    }
}

/// A list of records of which only one page is held in memory
///
/// Elements outside the current page are re-parsed in batches when read.
/// Returned elements are clones; paging never changes them.
#[derive(Clone)]
pub struct WindowedList {
    window: Window,
    offsets: Vec<u64>,
    page: RefCell<Page>,
    unmarshaller: Rc<dyn PartialUnmarshaller>,
    fetches: Cell<usize>,
}

impl WindowedList {
    /// Create an empty list
    pub fn new(window: Window, unmarshaller: Rc<dyn PartialUnmarshaller>) -> Self {
        Self {
            window,
            offsets: Vec::new(),
            page: RefCell::new(Page::default()),
            unmarshaller,
            fetches: Cell::new(0),
        }
    }

    /// The window this list was created for
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the list is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Character offset where element `index` starts
    pub fn offset(&self, index: usize) -> Option<u64> {
        self.offsets.get(index).copied()
    }

    /// Number of re-parse batches run so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    /// Register the next parsed occurrence
    ///
    /// Only the first `size` occurrences are kept.
    pub fn record_offset(&mut self, offset: u64, content: Content) {
        let index = self.offsets.len();
        self.offsets.push(offset);
        if index < self.window.size {
            self.page.get_mut().items.push(content);
        }
    }

    /// Get element `index`, re-parsing its batch if it is not in memory
    pub fn get(&self, index: usize) -> Result<Option<Content>> {
        if index >= self.len() {
            return Ok(None);
        }
        if let Some(content) = self.page.borrow().get(index) {
            return Ok(Some(content.clone()));
        }

        let batch = self.window.batch_size;
        let start = index - index % batch;
        let count = batch.min(self.len() - start);
        let items = self.unmarshaller.unmarshal(self.offsets[start], count)?;
        self.fetches.set(self.fetches.get() + 1);

        let content = items.get(index - start).cloned();
        *self.page.borrow_mut() = Page { start, items };
        Ok(content)
    }

    /// Iterate all elements, paging them in as needed
    pub fn iter(&self) -> impl Iterator<Item = Result<Content>> + '_ {
        (0..self.len()).map(move |index| {
            self.get(index)?.ok_or_else(|| {
                BindingError::mismatch(
                    format!("Can not reparse windowed element {}", index),
                    self.offsets[index],
                )
            })
        })
    }

    /// Read every element into memory
    pub fn materialize(&self) -> Result<Vec<Content>> {
        self.iter().collect()
    }
}

impl fmt::Debug for WindowedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let page = self.page.borrow();
        f.debug_struct("WindowedList")
            .field("window", &self.window)
            .field("len", &self.offsets.len())
            .field("page_start", &page.start)
            .field("page_len", &page.items.len())
            .field("fetches", &self.fetches.get())
            .finish()
    }
}

impl PartialEq for WindowedList {
    /// Lists are equal when they cover the same occurrences of the same window
    fn eq(&self, other: &Self) -> bool {
        self.window == other.window && self.offsets == other.offsets
    }
}
