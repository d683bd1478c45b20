//! Server allow-list file.
//!
//! The server reads `whitelist.json`, a JSON array of player entries. The
//! bridge rewrites that file and then asks the server to reload it.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Console command that makes the server re-read its allow-list.
pub const RELOAD_COMMAND: &str = "whitelist reload";

/// One allowed player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllowListEntry {
    /// Player UUID, when known. The server fills it in on reload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Player name.
    pub name: String,
}

impl AllowListEntry {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: None,
            name: name.into(),
        }
    }
}

/// Errors from allow-list operations.
#[derive(thiserror::Error, Debug)]
pub enum AllowListError {
    #[error("Failed to access allow-list {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Failed to parse allow-list {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize allow-list: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// In-memory copy of the allow-list bound to its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    path: PathBuf,
    entries: Vec<AllowListEntry>,
}

impl AllowList {
    /// Create an empty allow-list that will be saved to `path`.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Load the allow-list from `path`. A missing file is an empty list.
    ///
    /// # Errors
    ///
    /// Returns `AllowListError` if the file exists but cannot be read or parsed.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, AllowListError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| AllowListError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No allow-list file found");
                Vec::new()
            }
            Err(source) => return Err(AllowListError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), count = entries.len(), "Loaded allow-list");
        Ok(Self { path, entries })
    }

    /// Write the allow-list atomically (temp file + sync + rename).
    ///
    /// # Errors
    ///
    /// Returns `AllowListError` if file operations fail.
    pub async fn save(&self) -> Result<(), AllowListError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        let io_err = |source| AllowListError::Io {
            path: self.path.clone(),
            source,
        };

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&temp_path).await.map_err(io_err)?;
        file.write_all(json.as_bytes()).await.map_err(io_err)?;
        file.sync_data().await.map_err(io_err)?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(io_err)?;
        tracing::info!(path = %self.path.display(), count = self.entries.len(), "Saved allow-list");
        Ok(())
    }

    /// Add a player. Returns `false` if the name was already present.
    pub fn add(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.entries.push(AllowListEntry::new(name));
        true
    }

    /// Remove a player. Returns `false` if the name was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !entry.name.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    /// Player names compare case-insensitively.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    #[must_use]
    pub fn entries(&self) -> &[AllowListEntry] {
        &self.entries
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
