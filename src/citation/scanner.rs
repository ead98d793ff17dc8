/*!
 * Document scanner.
 *
 * Applies a marker grammar to a whole document or to a window of text
 * around the cursor. Offsets are byte offsets into the scanned text.
 */

use std::collections::HashSet;

use super::grammar::{CiteKey, MarkerGrammar};

/// Default number of characters scanned on each side of the cursor
pub const DEFAULT_WINDOW_RADIUS: usize = 50;

/// A located citation marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSpan {
    /// Offset of the first byte of the marker
    pub start: usize,
    /// Offset one past the last byte of the marker
    pub end: usize,
    /// Keys in textual order
    pub keys: Vec<CiteKey>,
}

impl MarkerSpan {
    /// Inclusive on both ends
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset <= self.end
    }

    pub fn shifted(&self, by: usize) -> Self {
        Self {
            start: self.start + by,
            end: self.end + by,
            keys: self.keys.clone(),
        }
    }
}

/// Result of scanning a window around the cursor.
///
/// Span offsets are relative to `window_start`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowScan {
    pub window_start: usize,
    pub spans: Vec<MarkerSpan>,
}

impl WindowScan {
    /// Spans translated to offsets in the full document
    pub fn absolute_spans(&self) -> impl Iterator<Item = MarkerSpan> + '_ {
        self.spans.iter().map(move |span| span.shifted(self.window_start))
    }
}

/// Scan the whole text, left to right, without overlapping matches
pub fn scan_full(text: &str, grammar: &MarkerGrammar) -> Vec<MarkerSpan> {
    let Some(regex) = grammar.marker_regex() else {
        return Vec::new();
    };

    regex
        .find_iter(text)
        .map(|m| MarkerSpan {
            start: m.start(),
            end: m.end(),
            keys: grammar.extract_keys(m.as_str()),
        })
        .collect()
}

/// Scan `radius` characters on each side of `cursor`
pub fn scan_window(text: &str, cursor: usize, grammar: &MarkerGrammar, radius: usize) -> WindowScan {
    if !grammar.dialect().is_supported() {
        return WindowScan::default();
    }

    let cursor = floor_char_boundary(text, cursor);
    let window_start = retreat_chars(text, cursor, radius);
    let window_end = advance_chars(text, cursor, radius);

    WindowScan {
        window_start,
        spans: scan_full(&text[window_start..window_end], grammar),
    }
}

/// Concatenate the keys of every span, in span order
pub fn flatten_keys(spans: &[MarkerSpan]) -> Vec<CiteKey> {
    spans.iter().flat_map(|span| span.keys.iter().cloned()).collect()
}

/// Drop repeated keys, keeping the first occurrence of each
pub fn unique_keys(keys: &[CiteKey]) -> Vec<CiteKey> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect()
}

pub(crate) fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn retreat_chars(text: &str, from: usize, count: usize) -> usize {
    if count == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .take(count)
        .last()
        .map(|(index, _)| index)
        .unwrap_or(from)
}

fn advance_chars(text: &str, from: usize, count: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(count)
        .map(|(index, _)| from + index)
        .unwrap_or(text.len())
}
