/*!
 * Editable text document with a cursor.
 *
 * Stands in for the host editor: holds the full text, a cursor offset, the
 * dialect derived from the file type, and applies insertions atomically.
 * Offsets are byte offsets that always sit on a char boundary.
 */

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::citation::scanner::floor_char_boundary;
use crate::citation::Dialect;
use crate::file_utils::FileManager;

/// Where an insertion is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    /// At the current cursor
    Cursor,
    /// At the end of the document
    End,
    /// At an absolute offset
    Offset(usize),
}

/// A text document open for citation edits
#[derive(Debug, Clone)]
pub struct Document {
    path: Option<PathBuf>,
    text: String,
    cursor: usize,
    dialect: Dialect,
    dirty: bool,
}

impl Document {
    /// In-memory document that has never been saved
    pub fn new(text: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            path: None,
            text: text.into(),
            cursor: 0,
            dialect,
            dirty: false,
        }
    }

    /// Load a document from disk; the dialect follows the file extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = FileManager::read_to_string(path)
            .with_context(|| format!("Failed to open document {:?}", path))?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            text,
            cursor: 0,
            dialect: Dialect::from_path(path),
            dirty: false,
        })
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_cursor(mut self, offset: usize) -> Self {
        self.set_cursor(offset);
        self
    }

    /// Move the cursor, clamped to the text and to a char boundary
    pub fn set_cursor(&mut self, offset: usize) {
        self.cursor = floor_char_boundary(&self.text, offset);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether edits were applied since loading or saving
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    /// Offset of zero-based `line` and character `column`.
    ///
    /// Out-of-range values clamp to the end of the line or document.
    pub fn offset_at(&self, line: usize, column: usize) -> usize {
        let mut line_start = 0;
        for (index, current) in self.text.split('\n').enumerate() {
            if index == line {
                let within = current
                    .char_indices()
                    .nth(column)
                    .map(|(i, _)| i)
                    .unwrap_or(current.len());
                return line_start + within;
            }
            line_start += current.len() + 1;
        }
        self.text.len()
    }

    /// Zero-based `(line, column)` of `offset`, column counted in chars
    pub fn position_at(&self, offset: usize) -> (usize, usize) {
        let offset = floor_char_boundary(&self.text, offset);
        let before = &self.text[..offset];
        let line = before.matches('\n').count();
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        (line, before[line_start..].chars().count())
    }

    /// Insert `text` and return the offset it landed at.
    ///
    /// A cursor at or after the insertion point moves with the text.
    pub fn insert(&mut self, at: InsertAt, text: &str) -> usize {
        let offset = match at {
            InsertAt::Cursor => self.cursor,
            InsertAt::End => self.text.len(),
            InsertAt::Offset(offset) => floor_char_boundary(&self.text, offset),
        };

        self.text.insert_str(offset, text);
        if self.cursor >= offset {
            self.cursor += text.len();
        }
        self.dirty = true;
        debug!("Inserted {} byte(s) at offset {}", text.len(), offset);
        offset
    }

    /// Append `line` at the tail, starting a new line when needed
    pub fn append_line(&mut self, line: &str) -> usize {
        let text = if self.text.is_empty() || self.text.ends_with('\n') {
            line.to_string()
        } else {
            format!("\n{}", line)
        };
        self.insert(InsertAt::End, &text)
    }

    /// Write the text back to the file the document came from
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Err(anyhow::anyhow!("Document has no file path"));
        };
        FileManager::write_to_file(path, &self.text)?;
        self.dirty = false;
        Ok(())
    }
}
