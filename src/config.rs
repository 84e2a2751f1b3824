//! Connection configuration
//!
//! [`DatabaseConfig`] is plain data: it can be built in code through
//! [`DatabaseBuilder`](crate::DatabaseBuilder) or loaded from JSON.

use crate::{Error, Result};
use duckdb::{AccessMode, Config};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Path that selects an in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Settings used to open a [`Database`](crate::Database)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file, or `":memory:"`
    pub path: String,
    /// Open the file read-only
    pub read_only: bool,
    /// Worker threads for the engine
    pub threads: Option<u32>,
    /// Engine memory limit, e.g. `"2GB"`
    pub memory_limit: Option<String>,
    /// Let the engine autoload known extensions on first use
    pub autoload_extensions: Option<bool>,
    /// Extensions to install and load after opening
    pub extensions: Vec<String>,
    /// Additional engine settings passed through verbatim
    pub settings: BTreeMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: IN_MEMORY.to_string(),
            read_only: false,
            threads: None,
            memory_limit: None,
            autoload_extensions: None,
            extensions: Vec::new(),
            settings: BTreeMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// Config for the given database path with engine defaults
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// True if this config opens an in-memory database
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY
    }

    /// Parse a config from JSON text.
    ///
    /// # Errors
    /// Returns [`Error::Json`] on malformed input or unknown keys.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a config from a JSON file.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Json`]
    /// if it does not parse.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the config before handing it to the engine.
    ///
    /// # Errors
    /// - [`Error::InvalidPath`] if the parent directory of a file path does not exist
    /// - [`Error::InvalidArgument`] for read-only in-memory databases, zero
    ///   threads, or extension names that are not plain identifiers
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::InvalidPath("database path is empty".to_string()));
        }

        if self.is_in_memory() {
            if self.read_only {
                return Err(Error::InvalidArgument(
                    "an in-memory database cannot be opened read-only".to_string(),
                ));
            }
        } else {
            let parent = Path::new(&self.path).parent();
            if let Some(dir) = parent.filter(|d| !d.as_os_str().is_empty()) {
                if !dir.is_dir() {
                    return Err(Error::InvalidPath(format!(
                        "Invalid connection path: {}",
                        self.path
                    )));
                }
            }
        }

        if self.threads == Some(0) {
            return Err(Error::InvalidArgument(
                "threads must be at least 1".to_string(),
            ));
        }

        if let Some(bad) = self.extensions.iter().find(|e| !is_plain_identifier(e)) {
            return Err(Error::InvalidArgument(format!(
                "invalid extension name '{bad}'"
            )));
        }

        Ok(())
    }

    /// Translate into the engine's open flags.
    pub(crate) fn to_engine_config(&self) -> Result<Config> {
        let mut config = Config::default();
        if self.read_only {
            config = config.access_mode(AccessMode::ReadOnly)?;
        }
        if let Some(threads) = self.threads {
            config = config.threads(i64::from(threads))?;
        }
        if let Some(limit) = &self.memory_limit {
            config = config.max_memory(limit)?;
        }
        if let Some(autoload) = self.autoload_extensions {
            config = config.enable_autoload_extension(autoload)?;
        }
        for (key, value) in &self.settings {
            config = config.with(key, value)?;
        }
        Ok(config)
    }
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
