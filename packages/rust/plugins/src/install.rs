//! Plugin version resolution and installation.
//!
//! Installs are strictly sequential: every plugin writes into the same
//! `node_modules/` tree under the book root, and the first failure stops the
//! remaining installs. Nothing already installed is rolled back.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use semver::Version;
use tracing::{debug, info, instrument};

use bindery_shared::{BinderyError, Result};

use crate::plugin::{Plugin, validate_package_id};
use crate::range::VersionRange;
use crate::registry::{NpmRegistry, Registry};
use crate::resolve::PluginSet;

/// Directory under the book root that receives installed packages.
pub const INSTALL_DIR: &str = "node_modules";

// ---------------------------------------------------------------------------
// Package install interface
// ---------------------------------------------------------------------------

/// One package to fetch and place under `target_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub package_id: String,
    pub version: String,
    pub target_dir: PathBuf,
}

/// Fetches a resolved package and links it into a target directory.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(&self, request: &InstallRequest) -> Result<()>;
}

/// Observes install progress.
pub trait InstallProgress: Send + Sync {
    /// Called before a plugin's version is resolved.
    fn installing(&self, plugin: &Plugin);
    /// Called once a plugin is installed at `version`.
    fn installed(&self, plugin: &Plugin, version: &str);
}

/// No-op install observer for headless/test usage.
pub struct SilentInstall;

impl InstallProgress for SilentInstall {
    fn installing(&self, _plugin: &Plugin) {}
    fn installed(&self, _plugin: &Plugin, _version: &str) {}
}

// ---------------------------------------------------------------------------
// PluginInstaller
// ---------------------------------------------------------------------------

/// Resolves plugin versions against a registry and installs them.
#[derive(Clone)]
pub struct PluginInstaller {
    registry: Arc<dyn Registry>,
    installer: Arc<dyn PackageInstaller>,
    host_version: Version,
    engine: String,
}

impl PluginInstaller {
    /// `host_version` is checked against each candidate's `engines.<engine>`
    /// range.
    pub fn new(
        registry: Arc<dyn Registry>,
        installer: Arc<dyn PackageInstaller>,
        host_version: Version,
        engine: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            installer,
            host_version,
            engine: engine.into(),
        }
    }

    /// Highest published version inside the plugin's range whose host
    /// range accepts the running host. `None` if no version qualifies.
    #[instrument(skip_all, fields(plugin = %plugin.name(), range = %plugin.version()))]
    pub async fn resolve_version(&self, plugin: &Plugin) -> Result<Option<String>> {
        let range = plugin.version_range()?;
        let versions = self.registry.view(plugin.package_id(), &range).await?;

        let best = versions
            .iter()
            .filter_map(|(version, meta)| {
                let version = Version::parse(version).ok()?;
                let host_range = meta.engine_range(&self.engine)?;
                match VersionRange::parse(host_range) {
                    Ok(r) if r.matches(&self.host_version) => Some(version),
                    Ok(_) => None,
                    Err(e) => {
                        debug!(%version, error = %e, "ignoring version with invalid host range");
                        None
                    }
                }
            })
            .max();

        debug!(candidates = versions.len(), resolved = ?best, "version resolution done");
        Ok(best.map(|v| v.to_string()))
    }

    /// Resolve and install one plugin into `root`. Returns the plugin with
    /// its resolved version recorded.
    #[instrument(skip_all, fields(plugin = %plugin.name()))]
    pub async fn install_plugin(
        &self,
        root: &Path,
        plugin: &Plugin,
        progress: &dyn InstallProgress,
    ) -> Result<Plugin> {
        info!(plugin = %plugin.name(), "installing plugin");
        progress.installing(plugin);

        let version = self.resolve_version(plugin).await?.ok_or_else(|| {
            BinderyError::PluginResolution {
                plugin: plugin.name().to_string(),
                constraint: plugin.version().to_string(),
            }
        })?;

        info!(
            package = %plugin.package_id(),
            requirement = %plugin.version(),
            %version,
            "installing plugin from registry"
        );

        let request = InstallRequest {
            package_id: plugin.package_id().to_string(),
            version: version.clone(),
            target_dir: root.to_path_buf(),
        };
        self.installer.install(&request).await?;

        info!(plugin = %plugin.name(), %version, "plugin installed with success");
        progress.installed(plugin, &version);

        Ok(plugin.with_resolved_version(version))
    }

    /// Install every plugin of `plugins`, one after the other, in set order.
    ///
    /// Stops at the first failure.
    #[instrument(skip_all, fields(root = %root.display(), count = plugins.len()))]
    pub async fn install_plugins(
        &self,
        root: &Path,
        plugins: &PluginSet,
        progress: &dyn InstallProgress,
    ) -> Result<PluginSet> {
        let mut installed: HashMap<String, Plugin> = HashMap::with_capacity(plugins.len());
        for plugin in plugins {
            let done = self.install_plugin(root, plugin, progress).await?;
            installed.insert(plugin.name().to_string(), done);
        }

        Ok(plugins.map(|plugin| {
            installed
                .remove(plugin.name())
                .unwrap_or_else(|| plugin.clone())
        }))
    }
}

// ---------------------------------------------------------------------------
// TarballInstaller
// ---------------------------------------------------------------------------

/// Installs packages by unpacking their registry tarball into
/// `<target>/node_modules/<package>/`.
#[derive(Debug, Clone)]
pub struct TarballInstaller {
    registry: NpmRegistry,
}

impl TarballInstaller {
    pub fn new(registry: NpmRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl PackageInstaller for TarballInstaller {
    #[instrument(skip_all, fields(package = %request.package_id, version = %request.version))]
    async fn install(&self, request: &InstallRequest) -> Result<()> {
        let package_dir = package_dir(&request.target_dir, &request.package_id)?;
        let exact = VersionRange::parse(&format!("={}", request.version))
            .map_err(|e| BinderyError::install(&request.package_id, e.to_string()))?;
        let versions = self.registry.view(&request.package_id, &exact).await?;

        let tarball = versions
            .get(&request.version)
            .and_then(|meta| meta.dist.as_ref())
            .map(|dist| dist.tarball.clone())
            .ok_or_else(|| {
                BinderyError::install(
                    &request.package_id,
                    format!("version {} has no tarball", request.version),
                )
            })?;

        let bytes = self.registry.download(&tarball).await?;

        if package_dir.exists() {
            std::fs::remove_dir_all(&package_dir)
                .map_err(|e| BinderyError::io(&package_dir, e))?;
        }
        std::fs::create_dir_all(&package_dir).map_err(|e| BinderyError::io(&package_dir, e))?;

        let files = unpack_tarball(&bytes, &package_dir)
            .map_err(|e| BinderyError::install(&request.package_id, e.to_string()))?;

        debug!(files, dir = %package_dir.display(), "tarball unpacked");
        Ok(())
    }
}

/// Where `package_id` lands under `root`.
///
/// Fails for ids that would leave `<root>/node_modules`.
pub fn package_dir(root: &Path, package_id: &str) -> Result<PathBuf> {
    validate_package_id(package_id)?;
    Ok(package_id
        .split('/')
        .fold(root.join(INSTALL_DIR), |dir, segment| dir.join(segment)))
}

/// Unpack a gzipped package tarball into `dest`, dropping the leading
/// directory (`package/`). Returns the number of files written.
fn unpack_tarball(bytes: &[u8], dest: &Path) -> Result<usize> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut written = 0;

    let entries = archive
        .entries()
        .map_err(|e| BinderyError::parse(format!("invalid tarball: {e}")))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| BinderyError::parse(format!("invalid tarball: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| BinderyError::parse(format!("invalid tarball path: {e}")))?
            .into_owned();

        let relative: PathBuf = path.components().skip(1).collect();
        if relative.as_os_str().is_empty() {
            continue;
        }
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(BinderyError::validation(format!(
                "tarball entry escapes package directory: {}",
                path.display()
            )));
        }

        let target = dest.join(&relative);
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| BinderyError::io(&target, e))?;
            continue;
        }
        if !kind.is_file() {
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BinderyError::io(parent, e))?;
        }
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| BinderyError::io(&target, e))?;
        std::fs::write(&target, content).map_err(|e| BinderyError::io(&target, e))?;
        written += 1;
    }

    Ok(written)
}
