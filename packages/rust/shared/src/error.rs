//! Error types for Bindery.
//!
//! Library crates use [`BinderyError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::BuildStage;

/// Top-level error type for all Bindery operations.
#[derive(Debug, thiserror::Error)]
pub enum BinderyError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to the package registry.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed input (book.json, SUMMARY.json, plugin declarations).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad version range, invalid level path, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// No published version satisfies both the requested range and the host.
    #[error("found no satisfactory version for plugin \"{plugin}\" with requirement \"{constraint}\"")]
    PluginResolution { plugin: String, constraint: String },

    /// Registry, network, or filesystem failure while installing a package.
    #[error("failed to install plugin \"{plugin}\": {message}")]
    Install { plugin: String, message: String },

    /// A plugin's hook handler failed.
    #[error("plugin \"{plugin}\" failed in hook \"{hook}\": {message}")]
    Hook {
        plugin: String,
        hook: String,
        message: String,
    },

    /// Raised by a hook handler implementation.
    #[error("plugin error: {0}")]
    Plugin(String),

    /// Raised by a generator callback.
    #[error("generator error: {0}")]
    Generator(String),

    /// A pipeline stage failed; wraps the underlying cause.
    #[error("build failed at stage {stage}: {source}")]
    Stage {
        stage: BuildStage,
        source: Box<BinderyError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BinderyError>;

impl BinderyError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an install error for a plugin.
    pub fn install(plugin: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Install {
            plugin: plugin.into(),
            message: msg.into(),
        }
    }

    /// Wrap an error with the pipeline stage it occurred in.
    ///
    /// An error that already carries a stage is returned unchanged.
    pub fn at_stage(self, stage: BuildStage) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage a pipeline failure occurred in, if any.
    pub fn stage(&self) -> Option<BuildStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost error, with any stage wrapper removed.
    pub fn root_cause(&self) -> &BinderyError {
        match self {
            Self::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
