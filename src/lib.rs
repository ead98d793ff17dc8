/*!
 * # zotcite - Zotero citations for Markdown and LaTeX
 *
 * A Rust library that inserts citation markers into text documents and
 * keeps their bibliography in sync with a Zotero library served by the
 * Better BibTeX plugin.
 *
 * ## Features
 *
 * - Pick items with the Cite-As-You-Write picker and insert `[@key]` or
 *   `\cite{key}` at the cursor, extending the marker already there
 * - Export the bibliography of every key cited in a document
 * - Append only missing entries to an existing `.bib` file
 * - Markdown footnote bibliographies and hyperlink footnotes
 * - Multi-library merges with progress and cancellation
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `citation`: the citation engine:
 *   - `citation::grammar`: marker patterns and key extraction per dialect
 *   - `citation::scanner`: locating markers in text
 *   - `citation::planner`: extend-or-create decision and marker rendering
 *   - `citation::merge`: bibliography merge across libraries
 * - `document`: editable document with a cursor
 * - `bib_file`: `.bib` file keys, path templates and writes
 * - `providers`: bibliographic service clients (`better_bibtex`, `mock`)
 * - `cancellation`: cancellable task values
 * - `session`: state remembered between commands
 * - `app_config`: configuration management
 * - `app_controller`: the user-facing commands
 * - `file_utils`: file system operations
 * - `errors`: custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod bib_file;
pub mod cancellation;
pub mod citation;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod providers;
pub mod session;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{CommandOutcome, Controller, UserInterface};
pub use cancellation::{CancellableTask, Cancellation, TaskOutcome};
pub use citation::{CiteKey, Dialect, MarkerGrammar};
pub use document::{Document, InsertAt};
pub use errors::{CiteError, ProviderError};
pub use session::Session;
