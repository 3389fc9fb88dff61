//! Capability catalog - plugin id to capability name to description

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::plugins::{Plugin, PluginRegistry};

/// Registered capabilities, embedded verbatim into planner prompts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityCatalog {
    providers: BTreeMap<String, BTreeMap<String, String>>,
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of every plugin in the registry
    pub fn from_registry(registry: &PluginRegistry) -> Self {
        let mut catalog = Self::new();
        for plugin in registry.iter() {
            catalog.register(plugin.as_ref());
        }
        catalog
    }

    /// Store a plugin's capabilities under its id
    ///
    /// A plugin with no capabilities is still listed, with an empty map.
    pub fn register(&mut self, plugin: &dyn Plugin) {
        let capabilities = plugin.capabilities();
        debug!(plugin = %plugin.name(), count = capabilities.len(), "CapabilityCatalog::register: called");
        self.providers.insert(plugin.name().to_string(), capabilities);
    }

    /// The full mapping
    pub fn snapshot(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.providers
    }

    /// Capabilities of one plugin
    pub fn capabilities(&self, plugin: &str) -> Option<&BTreeMap<String, String>> {
        self.providers.get(plugin)
    }

    /// Serialized form embedded into planner prompts
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string(&self.providers).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
