//! Re-openable byte sources
//!
//! Windowed lists re-read the input long after the original parse returned,
//! so they need a source that can be opened again, not a one-shot reader.

use std::cell::Cell;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::rc::Rc;

/// A byte stream that can be opened any number of times
pub trait ReadableSource {
    /// Open a fresh reader positioned at the start
    fn open(&self) -> io::Result<Box<dyn Read>>;
}

/// An in-memory source
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Rc<[u8]>,
    opened: Rc<Cell<usize>>,
}

impl MemorySource {
    /// Create a source over the given bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            bytes: Rc::from(bytes),
            opened: Rc::new(Cell::new(0)),
        }
    }

    /// How many times this source (or a clone of it) was opened
    pub fn open_count(&self) -> usize {
        self.opened.get()
    }

    /// The raw bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<&str> for MemorySource {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl From<String> for MemorySource {
    fn from(text: String) -> Self {
        Self::new(text.into_bytes())
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl ReadableSource for MemorySource {
    fn open(&self) -> io::Result<Box<dyn Read>> {
        self.opened.set(self.opened.get() + 1);
        Ok(Box::new(io::Cursor::new(Rc::clone(&self.bytes))))
    }
}

/// A file on disk, opened anew for every read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a source for a path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ReadableSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_reopens() {
        let source = MemorySource::from("abc");
        for _ in 0..2 {
            let mut text = String::new();
            source.open().unwrap().read_to_string(&mut text).unwrap();
            assert_eq!(text, "abc");
        }
        assert_eq!(source.clone().open_count(), 2);
    }

    #[test]
    fn test_open_readers_are_independent() {
        let source = MemorySource::from("abcdef");
        let mut first = source.open().unwrap();
        let mut second = source.open().unwrap();

        let mut buf = [0u8; 4];
        first.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abcd");

        let mut rest = Vec::new();
        second.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"abcdef".to_vec());

        rest.clear();
        first.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"ef".to_vec());
    }

    #[test]
    fn test_missing_file() {
        let source = FileSource::new("/definitely/not/here.txt");
        assert!(source.open().is_err());
    }
}
