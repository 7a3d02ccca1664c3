//! Plugin resolution, registry access, installation and hook handlers.
//!
//! This crate provides:
//! - [`resolve`]: declared requests + defaults → ordered [`PluginSet`]
//! - [`VersionRange`]: npm-style ranges over `semver`
//! - [`Registry`] / [`NpmRegistry`]: package registry queries
//! - [`PluginInstaller`]: version resolution and sequential installs
//! - [`HookCatalog`]: native hook handlers attached to loaded plugins

pub mod hooks;
pub mod install;
pub mod plugin;
pub mod range;
pub mod registry;
pub mod resolve;

pub use hooks::{
    HOOK_CONFIG, HOOK_FINISH, HOOK_FINISH_BEFORE, HOOK_INIT, HookCatalog, HookFn, HookHandler,
    LoadedPlugin,
};
pub use install::{
    INSTALL_DIR, InstallProgress, InstallRequest, PackageInstaller, PluginInstaller,
    SilentInstall, TarballInstaller, package_dir,
};
pub use plugin::{DEFAULT_PACKAGE_PREFIX, Declared, DeclaredEntry, Plugin};
pub use range::VersionRange;
pub use registry::{Dist, NpmRegistry, Registry, VersionMap, VersionMeta};
pub use resolve::{PluginSet, resolve};
