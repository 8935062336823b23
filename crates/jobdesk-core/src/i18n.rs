//! Localized message lookup.
//!
//! Resource files are nested JSON objects; lookups use dotted keys, so
//! `{"error": {"EMAIL_TAKEN": "..."}}` answers `error.EMAIL_TAKEN`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

/// Translation key used when an error carries no usable code
pub const UNKNOWN_ERROR_KEY: &str = "ui.common.unknownError";

/// Message shown when no catalog entry exists for the unknown-error key
pub const DEFAULT_UNKNOWN_ERROR: &str = "An unknown error occurred";

/// Source of translated strings.
pub trait Localizer: Send + Sync {
    /// Translation for `key`, or `None` when the key is not registered
    fn lookup(&self, key: &str) -> Option<String>;
}

/// In-memory translation table loaded from a JSON resource.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a nested JSON resource into dotted keys.
    /// Non-string leaves are ignored.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json).context("Failed to parse locale resource")?;
        let mut entries = HashMap::new();
        flatten("", &root, &mut entries);
        Ok(Self { entries })
    }

    /// Load a resource file; a missing file yields an empty catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Locale resource not found, using empty catalog");
            return Ok(Self::new());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read locale resource: {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Localizer for Catalog {
    fn lookup(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                let key = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", prefix, name)
                };
                flatten(&key, child, out);
            }
        }
        Value::String(text) if !prefix.is_empty() => {
            out.insert(prefix.to_string(), text.clone());
        }
        _ => {}
    }
}
