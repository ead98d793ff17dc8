/*!
 * Session state shared between commands.
 *
 * Remembers the bibliography file name the user last confirmed so the next
 * export proposes it again. The session is passed explicitly into each
 * command; the CLI stores it as JSON between runs.
 */

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::app_config::Config;
use crate::file_utils::FileManager;

const SESSION_FILE: &str = "session.json";

/// Per-user command state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Last bibliography name confirmed for a successful export
    #[serde(default)]
    pub last_used_name: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name proposed to the user: the remembered one, else the configured default
    pub fn effective_bib_name<'a>(&'a self, config: &'a Config) -> &'a str {
        self.last_used_name
            .as_deref()
            .unwrap_or(&config.default_bib_name)
    }

    /// Record a confirmed name after a successful export
    pub fn remember(&mut self, name: impl Into<String>) {
        self.last_used_name = Some(name.into());
    }

    /// Default session file under the user's local data directory
    pub fn default_path() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .context("Could not determine data directory")?;

        Ok(base_dir.join("zotcite").join(SESSION_FILE))
    }

    /// Load a session, or start a fresh one when the file is missing
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !FileManager::file_exists(path) {
            debug!("No session at {:?}, starting fresh", path);
            return Ok(Self::default());
        }

        let content = FileManager::read_to_string(path)?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse session file {:?}", path))
    }

    /// Load from the default location; unreadable state yields a fresh session
    pub fn load_or_default() -> Self {
        match Self::default_path().and_then(Self::load) {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring saved session: {}", e);
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize session")?;
        FileManager::write_to_file(path, &content)
    }

    /// Save to the default location, logging rather than failing
    pub fn persist(&self) {
        if let Err(e) = Self::default_path().and_then(|path| self.save(path)) {
            warn!("Failed to save session: {}", e);
        }
    }
}
