//! Thread-local regex cache for schema patterns
//!
//! `match` constraints, pattern separators and `trailingMatch` are all
//! whole-value matches. Patterns are anchored once, compiled once per thread
//! and reused for every field value.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    /// Thread-local cache of compiled, anchored regex patterns
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Wrap a pattern so it has to match the entire input
#[inline]
fn anchor(pattern: &str) -> String {
    format!("^(?:{})$", pattern)
}

/// Get or compile an anchored version of `pattern`
///
/// # Returns
/// * `Ok(Regex)` if the pattern is valid
/// * `Err(regex::Error)` if the pattern is invalid
pub fn get_or_compile(pattern: &str) -> Result<Regex, regex::Error> {
    REGEX_CACHE.with(|cache| {
        if let Some(regex) = cache.borrow().get(pattern) {
            return Ok(regex.clone());
        }

        let regex = Regex::new(&anchor(pattern))?;
        cache
            .borrow_mut()
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    })
}

/// Check whether `text` matches `pattern` in its entirety
///
/// Invalid patterns never match; they are rejected when a binding is built.
#[inline]
pub fn full_match(pattern: &str, text: &str) -> bool {
    get_or_compile(pattern)
        .map(|regex| regex.is_match(text))
        .unwrap_or(false)
}

/// Clear the regex cache
#[cfg(test)]
fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Get the number of cached patterns
#[cfg(test)]
fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
