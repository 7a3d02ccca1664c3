//! Plugin set resolution: declared requests + defaults → ordered set.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument};

use bindery_shared::Result;

use crate::plugin::{Declared, Plugin};

/// The ordered, conflict-free set of plugins for one build.
///
/// Order is the first-insertion order of each name and drives both install
/// order and hook execution order. Disable directives are remembered so the
/// set can be serialized back into a declaration that resolves to itself.
#[derive(Debug, Clone, Default)]
pub struct PluginSet {
    plugins: IndexMap<String, Plugin>,
    disabled: IndexSet<String>,
}

impl PluginSet {
    /// All plugins, in order.
    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.values()
    }

    /// Plugin names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Names removed by `-name` directives.
    pub fn disabled(&self) -> impl Iterator<Item = &str> {
        self.disabled.iter().map(String::as_str)
    }

    /// The set as declaration entries: every plugin, then every disable
    /// directive.
    pub fn serialize(&self) -> Vec<String> {
        self.plugins
            .values()
            .map(Plugin::to_declaration)
            .chain(self.disabled.iter().map(|name| format!("-{name}")))
            .collect()
    }

    /// Return a copy with every package id rebuilt from `prefix`.
    pub fn with_package_prefix(&self, prefix: &str) -> Self {
        self.map(|plugin| plugin.with_package_prefix(prefix))
    }

    /// Return a copy with each plugin passed through `f`. Names and order
    /// are unchanged.
    pub fn map(&self, mut f: impl FnMut(&Plugin) -> Plugin) -> Self {
        Self {
            plugins: self
                .plugins
                .iter()
                .map(|(name, plugin)| (name.clone(), f(plugin)))
                .collect(),
            disabled: self.disabled.clone(),
        }
    }
}

impl PartialEq for PluginSet {
    /// Order-sensitive: two sets are equal only if they list the same
    /// plugins in the same order.
    fn eq(&self, other: &Self) -> bool {
        self.plugins.len() == other.plugins.len()
            && self.plugins.iter().eq(other.plugins.iter())
            && self.disabled.iter().eq(other.disabled.iter())
    }
}

impl<'a> IntoIterator for &'a PluginSet {
    type Item = &'a Plugin;
    type IntoIter = indexmap::map::Values<'a, String, Plugin>;

    fn into_iter(self) -> Self::IntoIter {
        self.plugins.values()
    }
}

/// Resolve declared plugin requests against a list of defaults.
///
/// 1. Parse `declared` into requests, in listed order
/// 2. Key them by name: a repeated name keeps its first position and takes
///    the later value
/// 3. Collect the names requested as `-name`
/// 4. Append every default not yet present, in default order
/// 5. Drop disable directives and every plugin they name
#[instrument(skip_all)]
pub fn resolve<S: AsRef<str>>(declared: impl Into<Declared>, defaults: &[S]) -> Result<PluginSet> {
    let requests = declared.into().into_plugins()?;

    let mut plugins: IndexMap<String, Plugin> = IndexMap::with_capacity(requests.len());
    for plugin in requests {
        plugins.insert(plugin.name().to_string(), plugin);
    }

    let disabled: IndexSet<String> = plugins
        .values()
        .filter(|p| p.is_disable())
        .map(|p| p.stripped_name().to_string())
        .collect();

    for name in defaults.iter().map(AsRef::as_ref) {
        if !plugins.contains_key(name) {
            plugins.insert(name.to_string(), Plugin::new(name));
        }
    }

    plugins.retain(|name, plugin| !plugin.is_disable() && !disabled.contains(name));

    debug!(
        plugins = ?plugins.keys().collect::<Vec<_>>(),
        disabled = ?disabled,
        "plugin set resolved"
    );

    Ok(PluginSet { plugins, disabled })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: &[&str] = &["search", "highlight"];

    #[test]
    fn disable_removes_default() {
        let set = resolve("theme-x,-search", DEFAULTS).unwrap();
        assert_eq!(set.names(), vec!["theme-x", "highlight"]);
        assert_eq!(set.disabled().collect::<Vec<_>>(), vec!["search"]);
    }

    #[test]
    fn defaults_appended_in_order() {
        let set = resolve("theme-x", DEFAULTS).unwrap();
        assert_eq!(set.names(), vec!["theme-x", "search", "highlight"]);
    }

    #[test]
    fn explicit_entry_beats_default() {
        let set = resolve(vec!["highlight@^2", "theme-x"], DEFAULTS).unwrap();
        assert_eq!(set.names(), vec!["highlight", "theme-x", "search"]);
        assert_eq!(set.get("highlight").unwrap().version(), "^2");
    }

    #[test]
    fn duplicate_keeps_first_position_and_last_value() {
        let set = resolve("a@1.x,b,a@2.x", DEFAULTS).unwrap();
        assert_eq!(set.names(), vec!["a", "b", "search", "highlight"]);
        assert_eq!(set.get("a").unwrap().version(), "2.x");
    }

    #[test]
    fn disable_removes_explicit_entry_too() {
        let set = resolve("a,b,-a", DEFAULTS).unwrap();
        assert_eq!(set.names(), vec!["b", "search", "highlight"]);

        let set = resolve("-a,a", &[] as &[&str]).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn resolve_is_idempotent() {
        for declared in ["theme-x,-search", "a@^1,b,a@~2", "-highlight,-search", "", "x,-x"] {
            let first = resolve(declared, DEFAULTS).unwrap();
            let second = resolve(first.serialize(), DEFAULTS).unwrap();
            assert_eq!(first, second, "declared = {declared:?}");
        }
    }

    #[test]
    fn every_default_present_unless_disabled() {
        let set = resolve("-highlight,extra", DEFAULTS).unwrap();
        assert!(set.contains("search"));
        assert!(!set.contains("highlight"));
        assert!(!set.iter().any(|p| p.is_disable()));
    }

    #[test]
    fn equality_is_order_sensitive() {
        let a = resolve("x,y", &[] as &[&str]).unwrap();
        let b = resolve("y,x", &[] as &[&str]).unwrap();
        assert_ne!(a, b);
    }
}
