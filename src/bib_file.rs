/*!
 * Persisted bibliography (`.bib`) files.
 *
 * Reads the keys already present in a file so that only new entries are
 * fetched, resolves the configured file name against the document, and
 * writes exported text.
 */

use anyhow::Result;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::citation::CiteKey;
use crate::errors::CiteError;
use crate::file_utils::FileManager;

/// Required extension of bibliography files
pub const BIB_EXTENSION: &str = "bib";

/// Shortest accepted file name, e.g. `a.bib`
pub const MIN_BIB_NAME_LEN: usize = 5;

/// Entry heads such as `@article{doe2020,`
static ENTRY_HEAD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@\s*([A-Za-z]+)\s*[{(]\s*([^,\s{}()]+)\s*,").expect("Invalid entry head regex")
});

/// Check a bibliography file name before anything is fetched or written
pub fn validate_bib_name(name: &str) -> Result<(), CiteError> {
    let has_bib_extension = Path::new(name)
        .extension()
        .is_some_and(|ext| ext == BIB_EXTENSION);

    if name.chars().count() < MIN_BIB_NAME_LEN || !has_bib_extension {
        return Err(CiteError::Validation(format!(
            "Bibliography name '{}' is invalid: it must end with .{} and be at least {} characters long.",
            name, BIB_EXTENSION, MIN_BIB_NAME_LEN
        )));
    }
    Ok(())
}

/// Expand `${...}` placeholders and anchor relative names at the document.
///
/// Supported: `${workspaceFolder}`, `${fileBasename}`,
/// `${fileBasenameNoExtension}`, `${fileDirname}`, `${fileExtname}`.
pub fn resolve_bib_path(template: &str, document: &Path, workspace: Option<&Path>) -> PathBuf {
    let document_dir = document.parent().unwrap_or(Path::new(""));
    let workspace = workspace.unwrap_or(document_dir);
    let basename = document.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let stem = document.file_stem().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let extname = document
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let expanded = template
        .replace("${workspaceFolder}", &workspace.to_string_lossy())
        .replace("${fileBasenameNoExtension}", &stem)
        .replace("${fileBasename}", &basename)
        .replace("${fileDirname}", &document_dir.to_string_lossy())
        .replace("${fileExtname}", &extname);

    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        path
    } else {
        document_dir.join(path)
    }
}

/// Keys of the entries in BibTeX/BibLaTeX source, in file order
pub fn parse_entry_keys(content: &str) -> Vec<CiteKey> {
    match biblatex::Bibliography::parse(content) {
        Ok(bibliography) => bibliography.iter().map(|entry| entry.key.clone()).collect(),
        Err(e) => {
            warn!("Bibliography did not parse cleanly ({}), scanning entry heads instead", e);
            ENTRY_HEAD_REGEX
                .captures_iter(content)
                .filter(|cap| {
                    let kind = cap[1].to_lowercase();
                    kind != "comment" && kind != "string" && kind != "preamble"
                })
                .map(|cap| cap[2].to_string())
                .collect()
        }
    }
}

/// `requested` minus anything in `existing`, first occurrences only, order kept
pub fn filter_new_keys(requested: &[CiteKey], existing: &[CiteKey]) -> Vec<CiteKey> {
    let mut seen: HashSet<&str> = existing.iter().map(String::as_str).collect();
    requested
        .iter()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect()
}

/// A bibliography file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibFile {
    path: PathBuf,
}

impl BibFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keys already in the file; a missing file has none
    pub fn keys(&self) -> Result<Vec<CiteKey>> {
        if !FileManager::file_exists(&self.path) {
            debug!("Bibliography {:?} does not exist yet", self.path);
            return Ok(Vec::new());
        }
        let content = FileManager::read_to_string(&self.path)?;
        Ok(parse_entry_keys(&content))
    }

    /// Replace the file content with `text`
    pub fn overwrite(&self, text: &str) -> Result<()> {
        FileManager::write_to_file(&self.path, &format!("{}\n", text))
    }

    /// Append `text` to the end of the file
    pub fn append(&self, text: &str) -> Result<()> {
        FileManager::append_to_file(&self.path, &format!("{}\n", text))
    }
}
