//! Core domain types shared by the Bindery crates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BinderyError, Result};

/// Name of the book configuration file at the root of a book.
pub const BOOK_CONFIG_FILE: &str = "book.json";

/// Name of the structured summary file at the root of a book.
pub const SUMMARY_FILE: &str = "SUMMARY.json";

/// Name of the optional introduction page.
pub const README_FILE: &str = "README.md";

// ---------------------------------------------------------------------------
// BuildStage
// ---------------------------------------------------------------------------

/// Pipeline stages, in the only order they can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Created,
    PluginsResolved,
    PluginsInstalled,
    PagesPrepared,
    AssetsPrepared,
    ConfigHookApplied,
    InitHookApplied,
    GeneratorInitialized,
    AssetsGenerated,
    PagesGenerated,
    FinishBeforeHookApplied,
    GeneratorFinished,
}

impl BuildStage {
    /// Every stage in pipeline order.
    pub const ALL: [BuildStage; 12] = [
        Self::Created,
        Self::PluginsResolved,
        Self::PluginsInstalled,
        Self::PagesPrepared,
        Self::AssetsPrepared,
        Self::ConfigHookApplied,
        Self::InitHookApplied,
        Self::GeneratorInitialized,
        Self::AssetsGenerated,
        Self::PagesGenerated,
        Self::FinishBeforeHookApplied,
        Self::GeneratorFinished,
    ];

    /// The stage that follows this one, or `None` once the build is done.
    pub fn next(self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::PluginsResolved => "plugins resolved",
            Self::PluginsInstalled => "plugins installed",
            Self::PagesPrepared => "pages prepared",
            Self::AssetsPrepared => "assets prepared",
            Self::ConfigHookApplied => "config hook applied",
            Self::InitHookApplied => "init hook applied",
            Self::GeneratorInitialized => "generator initialized",
            Self::AssetsGenerated => "assets generated",
            Self::PagesGenerated => "pages generated",
            Self::FinishBeforeHookApplied => "finish:before hook applied",
            Self::GeneratorFinished => "generator finished",
        }
    }
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConfigValues
// ---------------------------------------------------------------------------

/// Book configuration values (the parsed `book.json`).
///
/// Always a JSON object. Updates return a new value; the original is left
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigValues(Map<String, Value>);

impl ConfigValues {
    /// Build config values from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(BinderyError::validation(format!(
                "book config must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Borrow the underlying mapping.
    pub fn values(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Look up a top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a top-level string key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The values as a plain JSON payload.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Return a copy whose values are replaced by `values`.
    pub fn update_values(&self, values: Value) -> Result<Self> {
        Self::from_value(values)
    }

    /// Return a copy with one key set.
    pub fn with(&self, key: impl Into<String>, value: Value) -> Self {
        let mut map = self.0.clone();
        map.insert(key.into(), value);
        Self(map)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// A source page read from the book root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Path relative to the book root (e.g., `guide/intro.md`).
    pub path: String,
    /// Title from the summary, if the page is referenced there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Summary level of the referencing article, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Raw page content.
    pub content: String,
}

/// A reference to a file inside the book root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Path relative to the book root.
    pub path: PathBuf,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stages_advance_in_order() {
        assert_eq!(BuildStage::Created.next(), Some(BuildStage::PluginsResolved));
        assert_eq!(
            BuildStage::InitHookApplied.next(),
            Some(BuildStage::GeneratorInitialized)
        );
        assert_eq!(BuildStage::GeneratorFinished.next(), None);
        assert!(BuildStage::AssetsPrepared < BuildStage::ConfigHookApplied);
    }

    #[test]
    fn config_values_reject_non_objects() {
        assert!(ConfigValues::from_value(json!(["a"])).is_err());
        assert!(ConfigValues::from_value(Value::Null).unwrap().values().is_empty());
    }

    #[test]
    fn config_update_does_not_touch_original() {
        let original = ConfigValues::from_value(json!({"title": "Old"})).unwrap();
        let updated = original.update_values(json!({"title": "New"})).unwrap();
        let extended = updated.with("author", json!("Ada"));

        assert_eq!(original.get_str("title"), Some("Old"));
        assert_eq!(updated.get_str("title"), Some("New"));
        assert_eq!(updated.get("author"), None);
        assert_eq!(extended.get_str("author"), Some("Ada"));
    }
}
