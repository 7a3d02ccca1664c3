//! Shared types, error model, and configuration for Bindery.
//!
//! This crate is the foundation depended on by all other Bindery crates.
//! It provides:
//! - [`BinderyError`]: the unified error type
//! - Domain types ([`BuildStage`], [`ConfigValues`], [`Page`], [`FileRef`])
//! - The table of contents model ([`Summary`], [`Part`], [`Article`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod summary;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_PLUGINS, DefaultsConfig, PluginsConfig, RegistryConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{BinderyError, Result};
pub use summary::{Article, Part, PartEntry, RawArticle, RawPart, Summary, SummaryNode};
pub use types::{
    BOOK_CONFIG_FILE, BuildStage, ConfigValues, FileRef, Page, README_FILE, SUMMARY_FILE,
};
