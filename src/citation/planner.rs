/*!
 * Insertion planner.
 *
 * Decides whether new keys extend the marker under the cursor or start a
 * new marker, and renders the text to insert for each dialect.
 */

use super::grammar::{CiteKey, Dialect, MarkerGrammar};
use super::scanner::{scan_window, WindowScan};

/// Text to insert and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub text: String,
    /// Absolute offset in the document
    pub offset: usize,
}

/// End offset of the marker containing `cursor`, if any.
///
/// Boundaries are inclusive: a cursor sitting right before the opening
/// bracket or right after the closing one counts as inside.
pub fn locate_insertion_point(cursor: usize, scan: &WindowScan) -> Option<usize> {
    scan.absolute_spans()
        .find(|span| span.contains(cursor))
        .map(|span| span.end)
}

/// Render the insertion for `new_keys`.
///
/// With `extend_at = Some(end)` the keys are spliced in just before the
/// marker's closing delimiter; otherwise a new marker goes at the cursor.
pub fn render_insertion(
    dialect: Dialect,
    new_keys: &[CiteKey],
    cursor: usize,
    extend_at: Option<usize>,
) -> Option<Insertion> {
    if new_keys.is_empty() {
        return None;
    }

    let text = match (dialect, extend_at) {
        (Dialect::Markdown, None) => format!("[{}]", pandoc_keys(new_keys)),
        (Dialect::Markdown, Some(_)) => format!("; {}", pandoc_keys(new_keys)),
        (Dialect::Latex, None) => format!("\\cite{{{}}}", new_keys.join(", ")),
        (Dialect::Latex, Some(_)) => format!(", {}", new_keys.join(", ")),
        (Dialect::Unsupported, _) => return None,
    };

    let offset = match extend_at {
        Some(end) => end.saturating_sub(1),
        None => cursor,
    };

    Some(Insertion { text, offset })
}

/// Scan around the cursor and render the insertion in one step
pub fn plan_insertion(
    text: &str,
    cursor: usize,
    grammar: &MarkerGrammar,
    radius: usize,
    new_keys: &[CiteKey],
) -> Option<Insertion> {
    let scan = scan_window(text, cursor, grammar, radius);
    let extend_at = locate_insertion_point(cursor, &scan);
    render_insertion(grammar.dialect(), new_keys, cursor, extend_at)
}

/// `[^k1][^k2]` footnote-style marker
pub fn render_footnote_marker(keys: &[CiteKey]) -> String {
    keys.iter().map(|key| format!("[^{}]", key)).collect()
}

/// `[^key]: text` footnote definition line
pub fn render_footnote_definition(key: &str, bibliography: &str) -> String {
    format!("[^{}]: {}", key, bibliography.trim_end())
}

/// `[^key]: <url>` footnote definition pointing at a link
pub fn render_link_definition(key: &str, url: &str) -> String {
    format!("[^{}]: <{}>", key, url.trim())
}

fn pandoc_keys(keys: &[CiteKey]) -> String {
    keys.iter()
        .map(|key| format!("@{}", key))
        .collect::<Vec<_>>()
        .join("; ")
}
