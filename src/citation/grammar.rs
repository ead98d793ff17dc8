/*!
 * Marker grammar for citation markers.
 *
 * Each dialect owns one compiled pattern that recognises a whole citation
 * marker, plus the rule used to split a matched marker into its keys:
 * - Markdown: `[@doe2020; @lee2021]`, `[^note]`
 * - LaTeX: `\cite{a, b}`, `\citet[p. 3]{a}`, `\citep{a}`
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Opaque citation key as used by the reference manager
pub type CiteKey = String;

/// Pandoc-style bracketed citations and footnote back-references
static MARKDOWN_MARKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([@^][\w\-:]+(;| ){0,2})+\]").expect("Invalid markdown marker regex")
});

/// `cite`, `citet` or `citep` with an optional note and a braced key list
static LATEX_MARKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"cite[tp]?(\[[^\]]*\])?\{([\w\-:]+(,| ){0,2})+\}").expect("Invalid latex marker regex")
});

/// Command token (and its note) stripped before key extraction
static LATEX_COMMAND_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^cite[tp]?(\[[^\]]*\])?").expect("Invalid latex command regex")
});

static WORD_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\w+").expect("Invalid word key regex")
});

static EXTENDED_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w\-:]+").expect("Invalid extended key regex")
});

/// Markup language governing marker syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Markdown,
    Latex,
    Unsupported,
}

impl Dialect {
    /// Resolve the dialect from a document's file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "md" | "markdown" | "mdown" | "mkd" | "qmd" | "rmd" => Self::Markdown,
            "tex" | "latex" | "ltx" => Self::Latex,
            _ => Self::Unsupported,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
            Self::Latex => "LaTeX",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Character class used to cut keys out of a matched marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyCharset {
    /// Word characters only; `doe-2020` yields `doe` and `2020`
    #[default]
    Word,
    /// Word characters plus `-` and `:`, the same class the markers accept
    Extended,
}

impl KeyCharset {
    fn regex(&self) -> &'static Regex {
        match self {
            Self::Word => &WORD_KEY_REGEX,
            Self::Extended => &EXTENDED_KEY_REGEX,
        }
    }
}

/// Pattern and extraction rule for one dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerGrammar {
    dialect: Dialect,
    charset: KeyCharset,
}

impl MarkerGrammar {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            charset: KeyCharset::default(),
        }
    }

    pub fn with_charset(mut self, charset: KeyCharset) -> Self {
        self.charset = charset;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn charset(&self) -> KeyCharset {
        self.charset
    }

    /// Marker pattern for this dialect, `None` when unsupported
    pub fn marker_regex(&self) -> Option<&'static Regex> {
        match self.dialect {
            Dialect::Markdown => Some(&MARKDOWN_MARKER_REGEX),
            Dialect::Latex => Some(&LATEX_MARKER_REGEX),
            Dialect::Unsupported => None,
        }
    }

    /// Split a matched marker into its keys.
    ///
    /// Order is preserved and repeated keys are kept; callers dedupe.
    pub fn extract_keys(&self, marker: &str) -> Vec<CiteKey> {
        let body = LATEX_COMMAND_REGEX.replace(marker, "");

        self.charset
            .regex()
            .find_iter(&body)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
