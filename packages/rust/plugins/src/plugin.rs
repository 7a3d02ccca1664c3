//! Plugin requests and the declaration grammar.
//!
//! A book declares its plugins in `book.json` as a comma-separated string or
//! a list. Each entry is `name`, `name@range`, or `-name` (disable):
//!
//! ```json
//! { "plugins": "theme-x@^2,-search" }
//! { "plugins": ["theme-x@^2", {"name": "toc", "version": "1.x"}, "-search"] }
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bindery_shared::{BinderyError, ConfigValues, Result};

use crate::range::VersionRange;

/// Package id prefix used when none is configured.
pub const DEFAULT_PACKAGE_PREFIX: &str = "bindery-plugin-";

/// Prefix marking a disable directive.
const DISABLE_PREFIX: char = '-';

/// Config key holding the plugin declaration.
const PLUGINS_KEY: &str = "plugins";

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// A requested plugin, optionally pinned to the version that was installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    name: String,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_version: Option<String>,
    package_id: String,
}

impl Plugin {
    /// A plugin accepting any version.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            package_id: package_id_for(DEFAULT_PACKAGE_PREFIX, &name),
            name,
            version: "*".into(),
            resolved_version: None,
        }
    }

    /// Parse one declaration entry. Returns `None` for blank entries.
    pub fn parse(entry: &str) -> Result<Option<Self>> {
        static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(?P<name>-?@?[^@\s]+)(?:@(?P<version>.*))?$").expect("valid regex")
        });

        let entry = entry.trim();
        if entry.is_empty() {
            return Ok(None);
        }

        let caps = ENTRY_RE
            .captures(entry)
            .ok_or_else(|| BinderyError::parse(format!("invalid plugin entry '{entry}'")))?;

        let plugin = Self::new(&caps["name"]);
        validate_package_id(plugin.package_id())?;
        match caps.name("version").map(|m| m.as_str().trim()) {
            Some(version) if !version.is_empty() => plugin.with_version(version).map(Some),
            _ => Ok(Some(plugin)),
        }
    }

    /// Return a copy constrained to `version`.
    pub fn with_version(mut self, version: &str) -> Result<Self> {
        VersionRange::parse(version).map_err(|e| {
            BinderyError::parse(format!("plugin '{}': {e}", self.name))
        })?;
        self.version = version.trim().to_string();
        Ok(self)
    }

    /// Return a copy recording the installed version.
    pub fn with_resolved_version(&self, version: impl Into<String>) -> Self {
        Self {
            resolved_version: Some(version.into()),
            ..self.clone()
        }
    }

    /// Return a copy whose package id uses `prefix`.
    pub fn with_package_prefix(&self, prefix: &str) -> Self {
        Self {
            package_id: package_id_for(prefix, self.stripped_name()),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The requested version range (`"*"` when unconstrained).
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The parsed version range.
    pub fn version_range(&self) -> Result<VersionRange> {
        VersionRange::parse(&self.version)
    }

    pub fn resolved_version(&self) -> Option<&str> {
        self.resolved_version.as_deref()
    }

    /// Registry package id (`bindery-plugin-<name>` by default).
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Whether this entry is a `-name` disable directive.
    pub fn is_disable(&self) -> bool {
        self.name.starts_with(DISABLE_PREFIX)
    }

    /// Name with any disable prefix removed.
    pub fn stripped_name(&self) -> &str {
        self.name.strip_prefix(DISABLE_PREFIX).unwrap_or(&self.name)
    }

    /// The entry in declaration syntax.
    pub fn to_declaration(&self) -> String {
        if self.version == "*" || self.is_disable() {
            self.name.clone()
        } else {
            format!("{}@{}", self.name, self.version)
        }
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resolved_version {
            Some(v) => write!(f, "{}@{v}", self.name),
            None => f.write_str(&self.to_declaration()),
        }
    }
}

fn package_id_for(prefix: &str, name: &str) -> String {
    let name = name.strip_prefix(DISABLE_PREFIX).unwrap_or(name);
    // Scoped packages are used as is.
    if name.starts_with('@') {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

/// Check that `package_id` is `name` or `@scope/name`, each segment a plain
/// directory name.
pub(crate) fn validate_package_id(package_id: &str) -> Result<()> {
    let plain = |segment: &str| {
        !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
    };
    let valid = match package_id.split('/').collect::<Vec<_>>().as_slice() {
        [name] => plain(name),
        [scope, name] => scope.starts_with('@') && plain(scope) && plain(name),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(BinderyError::validation(format!(
            "invalid package id '{package_id}'"
        )))
    }
}

// ---------------------------------------------------------------------------
// Declared
// ---------------------------------------------------------------------------

/// One list entry of a plugin declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeclaredEntry {
    Text(String),
    Spec {
        name: String,
        #[serde(default)]
        version: Option<String>,
    },
}

/// A plugin declaration as found in book config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Declared {
    /// Comma-separated entries.
    Delimited(String),
    List(Vec<DeclaredEntry>),
}

impl Default for Declared {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl Declared {
    /// Read the `plugins` key of a book config. Missing means none declared.
    pub fn from_config(config: &ConfigValues) -> Result<Self> {
        match config.get(PLUGINS_KEY) {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                BinderyError::parse(format!("invalid '{PLUGINS_KEY}' declaration: {e}"))
            }),
        }
    }

    /// Parse every entry, skipping blanks, in listed order.
    pub fn into_plugins(self) -> Result<Vec<Plugin>> {
        let entries = match self {
            Self::Delimited(text) => text
                .split(',')
                .map(|s| DeclaredEntry::Text(s.to_string()))
                .collect(),
            Self::List(entries) => entries,
        };

        let mut plugins = Vec::with_capacity(entries.len());
        for entry in entries {
            let parsed = match entry {
                DeclaredEntry::Text(text) => Plugin::parse(&text)?,
                DeclaredEntry::Spec { name, version } => {
                    let plugin = Plugin::parse(&name)?;
                    match (plugin, version) {
                        (Some(p), Some(v)) => Some(p.with_version(&v)?),
                        (p, _) => p,
                    }
                }
            };
            plugins.extend(parsed);
        }
        Ok(plugins)
    }
}

impl From<&str> for Declared {
    fn from(text: &str) -> Self {
        Self::Delimited(text.to_string())
    }
}

impl From<String> for Declared {
    fn from(text: String) -> Self {
        Self::Delimited(text)
    }
}

impl From<Vec<String>> for Declared {
    fn from(entries: Vec<String>) -> Self {
        Self::List(entries.into_iter().map(DeclaredEntry::Text).collect())
    }
}

impl From<Vec<&str>> for Declared {
    fn from(entries: Vec<&str>) -> Self {
        Self::List(
            entries
                .into_iter()
                .map(|s| DeclaredEntry::Text(s.to_string()))
                .collect(),
        )
    }
}
