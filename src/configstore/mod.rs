//! The dashboard's config file surface: `spec.md` §6 soul/memory/blocklist.
//!
//! `spec.md` treats this as plain file I/O and explicitly out of scope for
//! deeper modeling — there is no cache here, no watcher, no hot-reload.
//! Every [`ConfigStore::read`] reads the file fresh; every
//! [`ConfigStore::write`] does a temp-file-then-rename atomic replace.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const DEFAULT_SOUL: &str = include_str!("defaults/SOUL.md");
const DEFAULT_MEMORY: &str = include_str!("defaults/MEMORY.md");
const DEFAULT_BLOCKLIST: &str = include_str!("defaults/BLOCKLIST.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Soul,
    Memory,
    Blocklist,
}

impl ConfigKind {
    fn file_name(self) -> &'static str {
        match self {
            ConfigKind::Soul => "SOUL.md",
            ConfigKind::Memory => "MEMORY.md",
            ConfigKind::Blocklist => "BLOCKLIST.json",
        }
    }

    fn default_content(self) -> &'static str {
        match self {
            ConfigKind::Soul => DEFAULT_SOUL,
            ConfigKind::Memory => DEFAULT_MEMORY,
            ConfigKind::Blocklist => DEFAULT_BLOCKLIST,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    #[error("io error for {0}: {1}")]
    Io(&'static str, std::io::Error),

    #[error("invalid blocklist JSON: {0}")]
    InvalidBlocklist(serde_json::Error),
}

/// Parsed shape of `BLOCKLIST.json`, validated on write.
#[derive(Debug, Serialize, Deserialize)]
pub struct Blocklist {
    pub strict: Vec<String>,
    pub warn: Vec<String>,
}

pub struct ConfigDocument {
    pub content: String,
    pub last_modified_ms: i64,
    pub size_bytes: u64,
}

/// Read/write access to the three config documents the dashboard exposes.
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, kind: ConfigKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Read `kind`'s content, writing the embedded default first if the file
    /// does not yet exist.
    pub fn read(&self, kind: ConfigKind) -> Result<ConfigDocument, ConfigStoreError> {
        let path = self.path_for(kind);

        if !path.exists() {
            self.write_raw(kind, kind.default_content())?;
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigStoreError::Io(kind.file_name(), e))?;
        let metadata = fs::metadata(&path).map_err(|e| ConfigStoreError::Io(kind.file_name(), e))?;
        let last_modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Ok(ConfigDocument { content, last_modified_ms, size_bytes: metadata.len() })
    }

    /// Write `content` for `kind`. `blocklist` is validated as JSON matching
    /// [`Blocklist`]'s shape before the write is accepted; `soul` and
    /// `memory` are written verbatim.
    pub fn write(&self, kind: ConfigKind, content: &str) -> Result<(), ConfigStoreError> {
        if kind == ConfigKind::Blocklist {
            serde_json::from_str::<Blocklist>(content).map_err(ConfigStoreError::InvalidBlocklist)?;
        }
        self.write_raw(kind, content)
    }

    fn write_raw(&self, kind: ConfigKind, content: &str) -> Result<(), ConfigStoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| ConfigStoreError::Io(kind.file_name(), e))?;

        let path = self.path_for(kind);
        let tmp_path = path.with_extension("tmp");

        fs::write(&tmp_path, content).map_err(|e| ConfigStoreError::Io(kind.file_name(), e))?;
        fs::rename(&tmp_path, &path).map_err(|e| ConfigStoreError::Io(kind.file_name(), e))?;
        Ok(())
    }

    /// Build the system prompt from `soul` and `memory`, prepended in that
    /// order, per `spec.md` §4.4.
    pub fn build_system_prompt(&self) -> Result<String, ConfigStoreError> {
        let soul = self.read(ConfigKind::Soul)?.content;
        let memory = self.read(ConfigKind::Memory)?.content;
        Ok(format!("{soul}\n\n{memory}"))
    }
}
