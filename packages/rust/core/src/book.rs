//! Book loading.
//!
//! A book is a directory holding an optional `book.json` (config values),
//! an optional `SUMMARY.json` (the structured table of contents), and the
//! pages and assets those point at.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use bindery_plugins::Declared;
use bindery_shared::{
    BOOK_CONFIG_FILE, BinderyError, ConfigValues, FileRef, RawPart, Result, SUMMARY_FILE, Summary,
};

/// A book to build.
#[derive(Debug, Clone)]
pub struct Book {
    root: PathBuf,
    config: ConfigValues,
    summary: Summary,
}

impl Book {
    pub fn new(root: impl Into<PathBuf>, config: ConfigValues, summary: Summary) -> Self {
        Self {
            root: root.into(),
            config,
            summary,
        }
    }

    /// Load a book from its root directory.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(BinderyError::validation(format!(
                "book root '{}' is not a directory",
                root.display()
            )));
        }

        let config_path = root.join(BOOK_CONFIG_FILE);
        let config = match read_optional(&config_path)? {
            Some(content) => {
                let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                    BinderyError::parse(format!("failed to parse {}: {e}", config_path.display()))
                })?;
                ConfigValues::from_value(value)?
            }
            None => {
                debug!("no book.json, using empty config");
                ConfigValues::default()
            }
        };

        let summary_path = root.join(SUMMARY_FILE);
        let summary = match read_optional(&summary_path)? {
            Some(content) => Summary::from_json(FileRef::new(SUMMARY_FILE), &content)?,
            None => {
                debug!("no SUMMARY.json, using empty summary");
                Summary::create_from_parts(FileRef::new(SUMMARY_FILE), Vec::<RawPart>::new())
            }
        };

        Ok(Self::new(root, config, summary))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ConfigValues {
        &self.config
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Title from config, falling back to the root directory name.
    pub fn title(&self) -> String {
        self.config
            .get_str("title")
            .map(String::from)
            .or_else(|| {
                self.root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "Untitled".into())
    }

    /// The book's plugin declaration.
    pub fn declared_plugins(&self) -> Result<Declared> {
        Declared::from_config(&self.config)
    }

    /// Return a copy with `config` replacing the current config.
    pub fn with_config(&self, config: ConfigValues) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }
}

/// Read a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BinderyError::io(path, e)),
    }
}
