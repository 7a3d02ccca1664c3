//! Application configuration for Bindery.
//!
//! User config lives at `~/.bindery/bindery.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BinderyError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bindery.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bindery";

/// Plugins every book gets unless it disables them with `-name`.
pub const DEFAULT_PLUGINS: &[&str] = &[
    "highlight",
    "search",
    "lunr",
    "sharing",
    "fontsettings",
    "theme-default",
];

// ---------------------------------------------------------------------------
// Config structs (matching bindery.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Package registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Plugin settings.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Output directory, relative to the book root.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Generator used when none is given on the command line.
    #[serde(default = "default_generator")]
    pub generator: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            generator: default_generator(),
        }
    }
}

fn default_output_dir() -> String {
    "_book".into()
}
fn default_generator() -> String {
    "manifest".into()
}

/// `[registry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the npm-compatible registry.
    #[serde(default = "default_registry_url")]
    pub url: String,

    /// Prefix turning a plugin name into a package id
    /// (`search` → `bindery-plugin-search`).
    #[serde(default = "default_package_prefix")]
    pub package_prefix: String,

    /// Key under a version's `engines` holding its host-compatibility range.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            package_prefix: default_package_prefix(),
            engine: default_engine(),
            timeout_secs: default_timeout(),
        }
    }
}

impl RegistryConfig {
    /// Parse and validate the registry URL.
    pub fn parsed_url(&self) -> Result<Url> {
        Url::parse(&self.url)
            .map_err(|e| BinderyError::config(format!("invalid registry url '{}': {e}", self.url)))
    }
}

fn default_registry_url() -> String {
    "https://registry.npmjs.org".into()
}
fn default_package_prefix() -> String {
    "bindery-plugin-".into()
}
fn default_engine() -> String {
    "bindery".into()
}
fn default_timeout() -> u64 {
    30
}

/// `[plugins]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugins appended to every book's declared list.
    #[serde(default = "default_plugins")]
    pub defaults: Vec<String>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            defaults: default_plugins(),
        }
    }
}

fn default_plugins() -> Vec<String> {
    DEFAULT_PLUGINS.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bindery/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BinderyError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bindery/bindery.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BinderyError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        BinderyError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.registry.parsed_url()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BinderyError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BinderyError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BinderyError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
