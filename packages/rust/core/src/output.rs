//! The build state threaded through the pipeline.
//!
//! Every `with_*` method consumes the state and returns the next one, so a
//! stage only ever sees the value produced by the stage before it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use bindery_plugins::{DEFAULT_PACKAGE_PREFIX, LoadedPlugin, PluginSet};
use bindery_shared::{AppConfig, BuildStage, DEFAULT_PLUGINS, Page};

use crate::book::Book;

// ---------------------------------------------------------------------------
// BuildOptions
// ---------------------------------------------------------------------------

/// Options for one build, after the generator has adjusted them.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Output directory. Relative paths are resolved against the book root.
    pub output: PathBuf,
    /// Plugins added to every book unless disabled.
    pub default_plugins: Vec<String>,
    /// Prefix turning a plugin name into its registry package id.
    pub package_prefix: String,
}

impl BuildOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            output: PathBuf::from(&config.defaults.output_dir),
            default_plugins: config.plugins.defaults.clone(),
            package_prefix: config.registry.package_prefix.clone(),
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("_book"),
            default_plugins: DEFAULT_PLUGINS.iter().map(|s| s.to_string()).collect(),
            package_prefix: DEFAULT_PACKAGE_PREFIX.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Immutable snapshot of a build in progress.
#[derive(Debug, Clone)]
pub struct Output {
    stage: BuildStage,
    book: Book,
    generator: String,
    options: BuildOptions,
    plugins: PluginSet,
    loaded_plugins: Vec<LoadedPlugin>,
    pages: IndexMap<String, Page>,
    assets: Vec<String>,
    artifacts: Vec<String>,
    started_at: DateTime<Utc>,
}

impl Output {
    /// Initial state for building `book` with `generator`.
    pub fn create_for_book(book: Book, generator: impl Into<String>, options: BuildOptions) -> Self {
        Self {
            stage: BuildStage::Created,
            book,
            generator: generator.into(),
            options,
            plugins: PluginSet::default(),
            loaded_plugins: Vec::new(),
            pages: IndexMap::new(),
            assets: Vec::new(),
            artifacts: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    /// Name of the generator producing this output.
    pub fn generator(&self) -> &str {
        &self.generator
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    /// Installed plugins with their hook handlers, in set order.
    pub fn loaded_plugins(&self) -> &[LoadedPlugin] {
        &self.loaded_plugins
    }

    /// Prepared pages keyed by path, in reading order.
    pub fn pages(&self) -> &IndexMap<String, Page> {
        &self.pages
    }

    /// Asset paths relative to the book root, sorted.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Paths written by the generator, relative to the output directory.
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Absolute output directory.
    pub fn output_dir(&self) -> PathBuf {
        resolve_output_dir(self.book.root(), &self.options.output)
    }

    pub fn with_book(self, book: Book) -> Self {
        Self { book, ..self }
    }

    pub fn with_plugins(self, plugins: PluginSet) -> Self {
        Self { plugins, ..self }
    }

    pub fn with_loaded_plugins(self, loaded_plugins: Vec<LoadedPlugin>) -> Self {
        Self {
            loaded_plugins,
            ..self
        }
    }

    pub fn with_pages(self, pages: IndexMap<String, Page>) -> Self {
        Self { pages, ..self }
    }

    pub fn with_assets(self, assets: Vec<String>) -> Self {
        Self { assets, ..self }
    }

    /// Record one more written file.
    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifacts.push(artifact.into());
        self
    }

    pub(crate) fn with_stage(self, stage: BuildStage) -> Self {
        Self { stage, ..self }
    }
}

fn resolve_output_dir(root: &Path, output: &Path) -> PathBuf {
    if output.is_absolute() {
        output.to_path_buf()
    } else {
        root.join(output)
    }
}
