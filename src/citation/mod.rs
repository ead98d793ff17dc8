/*!
 * Citation key extraction and insertion engine.
 *
 * - `grammar`: per-dialect marker patterns and key extraction
 * - `scanner`: locating markers in a document or around the cursor
 * - `planner`: extend-or-create decision and marker rendering
 * - `merge`: deduplicated bibliography text across libraries
 */

pub mod grammar;
pub mod merge;
pub mod planner;
pub mod scanner;

pub use grammar::{CiteKey, Dialect, KeyCharset, MarkerGrammar};
pub use merge::{BibliographyMerger, MergeProgress, MergeReport, MergeStatus};
pub use planner::{locate_insertion_point, plan_insertion, render_insertion, Insertion};
pub use scanner::{flatten_keys, scan_full, scan_window, unique_keys, MarkerSpan, WindowScan, DEFAULT_WINDOW_RADIUS};
