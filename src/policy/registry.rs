//! Plugin contract and the target IRI registry
//!
//! Plugins are wired explicitly: each configured target names a `kind`
//! from a fixed factory table plus a static config table. The registry is
//! built once and then only read, so one instance serves every worker.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::plugins;
use super::{PluginError, PolicyRecord};
use crate::config::PluginEntry;
use crate::store::Store;

/// An executable capability invoked for a policy
///
/// `Ok(true)` means the side effect happened. `Ok(false)` and `Err` are
/// both handled failures. The stores are read-only.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, main: &Store, policy_graph: &Store, policy: &PolicyRecord) -> Result<bool, PluginError>;
}

/// Builds a plugin from its static config
pub type PluginFactory = fn(&Map<String, Value>) -> Result<Arc<dyn Plugin>, PluginError>;

/// The bundled plugin kinds
pub fn builtin_factories() -> IndexMap<&'static str, PluginFactory> {
    let mut table: IndexMap<&'static str, PluginFactory> = IndexMap::new();
    table.insert("debug", debug_factory);
    table.insert("demo", demo_factory);
    table.insert("ntfy", ntfy_factory);
    table.insert("send_notification", send_notification_factory);
    table
}

fn debug_factory(_: &Map<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(plugins::DebugPlugin))
}

fn demo_factory(_: &Map<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(plugins::DemoPlugin))
}

fn ntfy_factory(config: &Map<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(plugins::NtfyPlugin::from_config(config)?))
}

fn send_notification_factory(config: &Map<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(plugins::SendNotificationPlugin::from_config(config)?))
}

/// A plugin instance with the config of its registry entry
#[derive(Clone)]
pub struct ResolvedPlugin {
    pub plugin: Arc<dyn Plugin>,
    pub config: Map<String, Value>,
}

impl fmt::Debug for ResolvedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPlugin")
            .field("plugin", &self.plugin.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Target IRI lookup used by the executor
pub trait PluginResolver: Send + Sync {
    fn resolve(&self, target: &str) -> Option<ResolvedPlugin>;
}

#[derive(Default, Clone)]
pub struct PluginRegistry {
    entries: HashMap<String, ResolvedPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate every configured entry; an unknown `kind` is an error
    pub fn from_config(entries: &IndexMap<String, PluginEntry>) -> Result<Self, PluginError> {
        let factories = builtin_factories();
        let mut registry = PluginRegistry::new();

        for (target, entry) in entries {
            let factory = factories.get(entry.kind.as_str()).ok_or_else(|| PluginError::InvalidArgument {
                name: format!("plugins.\"{}\".kind", target),
                reason: format!(
                    "unknown plugin kind '{}' (known: {})",
                    entry.kind,
                    factories.keys().copied().collect::<Vec<_>>().join(", ")
                ),
            })?;
            let plugin = factory(&entry.config)?;
            tracing::debug!(executes = %target, kind = %entry.kind, "registered plugin");
            registry.register(target.clone(), plugin, entry.config.clone());
        }

        Ok(registry)
    }

    pub fn register(&mut self, target: impl Into<String>, plugin: Arc<dyn Plugin>, config: Map<String, Value>) {
        self.entries.insert(target.into(), ResolvedPlugin { plugin, config });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered target IRIs, sorted
    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        targets.sort_unstable();
        targets
    }
}

impl PluginResolver for PluginRegistry {
    fn resolve(&self, target: &str) -> Option<ResolvedPlugin> {
        self.entries.get(target).cloned()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry").field("targets", &self.targets()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: &str) -> PluginEntry {
        PluginEntry {
            kind: kind.to_string(),
            config: Map::new(),
        }
    }

    #[test]
    fn test_from_config() {
        let mut entries = IndexMap::new();
        entries.insert("http://example.org/demo".to_string(), entry("demo"));
        entries.insert("http://example.org/debug".to_string(), entry("debug"));

        let registry = PluginRegistry::from_config(&entries).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("http://example.org/demo").unwrap().plugin.name(), "demo");
        assert!(registry.resolve("http://example.org/other").is_none());
    }

    #[test]
    fn test_unknown_kind() {
        let mut entries = IndexMap::new();
        entries.insert("http://example.org/x".to_string(), entry("smtp"));
        let err = PluginRegistry::from_config(&entries).unwrap_err();
        assert!(err.to_string().contains("smtp"));
    }

    #[test]
    fn test_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PluginRegistry>();
    }
}
