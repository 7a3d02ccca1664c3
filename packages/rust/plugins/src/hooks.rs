//! Hook handlers contributed by plugins.
//!
//! A plugin may handle any named hook. Handlers receive a plain JSON payload
//! and return the (possibly transformed) payload for the next plugin. A
//! read-only JSON view of the build comes alongside the payload.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use bindery_shared::Result;

use crate::plugin::Plugin;

/// Receives the book config; its result replaces the config.
pub const HOOK_CONFIG: &str = "config";
/// Runs once plugins, pages and assets are ready.
pub const HOOK_INIT: &str = "init";
/// Runs after pages are generated, before the generator finishes.
pub const HOOK_FINISH_BEFORE: &str = "finish:before";
/// Available to generators that signal the very end of a build.
pub const HOOK_FINISH: &str = "finish";

/// A handler for one named hook.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Transform `payload`. `context` describes the build at the time of the
    /// call and is the same for every handler of one hook.
    async fn call(&self, payload: Value, context: &Value) -> Result<Value>;
}

/// Adapter turning a synchronous closure into a [`HookHandler`].
pub struct HookFn<F>(F);

impl<F> HookFn<F>
where
    F: Fn(Value, &Value) -> Result<Value> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> HookHandler for HookFn<F>
where
    F: Fn(Value, &Value) -> Result<Value> + Send + Sync,
{
    async fn call(&self, payload: Value, context: &Value) -> Result<Value> {
        (self.0)(payload, context)
    }
}

type HandlerMap = IndexMap<String, Arc<dyn HookHandler>>;

// ---------------------------------------------------------------------------
// LoadedPlugin
// ---------------------------------------------------------------------------

/// An installed plugin together with the hooks it handles.
#[derive(Clone)]
pub struct LoadedPlugin {
    plugin: Plugin,
    hooks: HandlerMap,
}

impl LoadedPlugin {
    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    /// The handler for `hook`, if this plugin defines one.
    pub fn handler(&self, hook: &str) -> Option<&Arc<dyn HookHandler>> {
        self.hooks.get(hook)
    }

    /// Names of the hooks this plugin handles.
    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("plugin", &self.plugin)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// HookCatalog
// ---------------------------------------------------------------------------

/// Native hook handlers, keyed by plugin name then hook name.
///
/// Plugins without an entry load with no handlers and are skipped by every
/// hook.
#[derive(Clone, Default)]
pub struct HookCatalog {
    plugins: HashMap<String, HandlerMap>,
}

impl HookCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` as `plugin`'s handler for `hook`, replacing any
    /// previous one.
    pub fn register(
        &mut self,
        plugin: impl Into<String>,
        hook: impl Into<String>,
        handler: Arc<dyn HookHandler>,
    ) -> &mut Self {
        self.plugins
            .entry(plugin.into())
            .or_default()
            .insert(hook.into(), handler);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        plugin: impl Into<String>,
        hook: impl Into<String>,
        handler: impl HookHandler + 'static,
    ) -> Self {
        self.register(plugin, hook, Arc::new(handler));
        self
    }

    /// Attach the registered handlers to `plugin`.
    pub fn load(&self, plugin: Plugin) -> LoadedPlugin {
        let hooks = self.plugins.get(plugin.name()).cloned().unwrap_or_default();
        LoadedPlugin { plugin, hooks }
    }
}

impl fmt::Debug for HookCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.plugins
                    .iter()
                    .map(|(name, hooks)| (name, hooks.keys().collect::<Vec<_>>())),
            )
            .finish()
    }
}
