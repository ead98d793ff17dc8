use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;

use crate::bib_file::validate_bib_name;
use crate::citation::KeyCharset;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the Zotero connector server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// CSL style used for footnote bibliography entries
    #[serde(default = "default_bibliography_style")]
    pub bibliography_style: String,

    /// Better BibTeX translator used when exporting `.bib` entries
    #[serde(default = "default_latex_bib_style")]
    pub latex_bib_style: String,

    /// Bibliography file name, may contain `${...}` path templates
    #[serde(default = "default_bib_name")]
    pub default_bib_name: String,

    /// Minimize Zotero after picking items
    #[serde(default)]
    pub minimize_picker: bool,

    /// Output format requested from the picker
    #[serde(default)]
    pub picker_format: PickerFormat,

    /// Characters scanned on each side of the cursor
    #[serde(default = "default_window_radius")]
    pub window_radius: usize,

    /// Keep `-` and `:` inside keys read back from the document
    #[serde(default)]
    pub extended_key_chars: bool,

    /// JSON-RPC request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Picker timeout in seconds
    #[serde(default = "default_picker_timeout_secs")]
    pub picker_timeout_secs: u64,

    /// Retry count for transient JSON-RPC failures
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Output format of the Cite-As-You-Write picker
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PickerFormat {
    // @format: `[@key1; @key2]`
    #[default]
    Pandoc,
    // @format: CSL items carrying `citationKey`
    Json,
}

impl PickerFormat {
    // @returns: Value of the `format` query parameter
    pub fn query_value(&self) -> &'static str {
        match self {
            Self::Pandoc => "pandoc",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for PickerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.query_value())
    }
}

impl std::str::FromStr for PickerFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pandoc" => Ok(Self::Pandoc),
            "json" => Ok(Self::Json),
            _ => Err(anyhow!("Invalid picker format: {}", s)),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:23119".to_string()
}

fn default_bibliography_style() -> String {
    "http://www.zotero.org/styles/apa".to_string()
}

fn default_latex_bib_style() -> String {
    "Better BibLaTeX".to_string()
}

fn default_bib_name() -> String {
    "ref.bib".to_string()
}

fn default_window_radius() -> usize {
    crate::citation::DEFAULT_WINDOW_RADIUS
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_picker_timeout_secs() -> u64 {
    600 // the picker waits for the user
}

fn default_retry_count() -> u32 {
    2
}

/// Upper bound for `retry_count`; backoff doubles on every retry
pub const MAX_RETRY_COUNT: u32 = 10;

fn default_retry_backoff_ms() -> u64 {
    500 // doubled on each retry
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server_url)
            .map_err(|e| anyhow!("Invalid server URL '{}': {}", self.server_url, e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(anyhow!("Server URL must use http or https: {}", self.server_url));
        }

        if self.retry_count > MAX_RETRY_COUNT {
            return Err(anyhow!("retry_count must be at most {}", MAX_RETRY_COUNT));
        }

        if self.window_radius == 0 {
            return Err(anyhow!("window_radius must be greater than zero"));
        }

        if self.latex_bib_style.trim().is_empty() {
            return Err(anyhow!("latex_bib_style must not be empty"));
        }

        validate_bib_name(&self.default_bib_name)
            .map_err(|e| anyhow!("Invalid default_bib_name: {}", e))?;

        Ok(())
    }

    /// Character class used when reading keys back from documents
    pub fn key_charset(&self) -> KeyCharset {
        if self.extended_key_chars {
            KeyCharset::Extended
        } else {
            KeyCharset::Word
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: default_server_url(),
            bibliography_style: default_bibliography_style(),
            latex_bib_style: default_latex_bib_style(),
            default_bib_name: default_bib_name(),
            minimize_picker: false,
            picker_format: PickerFormat::default(),
            window_radius: default_window_radius(),
            extended_key_chars: false,
            timeout_secs: default_timeout_secs(),
            picker_timeout_secs: default_picker_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            log_level: LogLevel::default(),
        }
    }
}
