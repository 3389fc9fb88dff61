//! Plugin system - the capability providers a plan's tasks are bound to
//!
//! The set of plugins is closed: each is one [`PluginKind`] with a stable
//! string id that plans refer to. New plugins extend the enum and register
//! through [`PluginRegistry`].

mod fetch;
mod gpt;
mod kql;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::backend::{BackendError, Record};
use crate::completion::CompletionError;
use crate::context::Turn;
use crate::events::Emitter;

pub use fetch::{FetchUrlPlugin, clean_html};
pub use gpt::{FREE_FORM_CAPABILITY, GptPlugin};
pub use kql::schema::{FieldSchema, SchemaBuilder, SchemaCatalog, TableSchema};
pub use kql::{AnalyticsQueryPlugin, MAX_QUERY_ROWS};

/// The closed set of capability providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginKind {
    /// Generate and run analytics (KQL) queries
    AnalyticsQuery,
    /// Fetch and clean an external document
    FetchUrl,
    /// Free-form completion, the planner's fallback
    FreeForm,
}

impl PluginKind {
    pub const ALL: [PluginKind; 3] = [PluginKind::AnalyticsQuery, PluginKind::FetchUrl, PluginKind::FreeForm];

    /// Stable id used in plans and the capability catalog
    pub fn id(&self) -> &'static str {
        match self {
            PluginKind::AnalyticsQuery => "SentinelKQLPlugin",
            PluginKind::FetchUrl => "FetchURLPlugin",
            PluginKind::FreeForm => "GPTPlugin",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Payload of a successful task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskValue {
    Text(String),
    Records(Vec<Record>),
}

impl TaskValue {
    /// Text form fed to the formatter and recorded in the session context
    pub fn render(&self) -> String {
        match self {
            TaskValue::Text(text) => text.clone(),
            TaskValue::Records(records) => serde_json::to_string(records).unwrap_or_default(),
        }
    }

    pub fn records(&self) -> Option<&[Record]> {
        match self {
            TaskValue::Records(records) => Some(records),
            TaskValue::Text(_) => None,
        }
    }
}

/// Result of one successful task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput {
    pub value: TaskValue,
    pub usage_tokens: Option<u64>,
}

impl TaskOutput {
    pub fn text(text: impl Into<String>, usage_tokens: Option<u64>) -> Self {
        Self {
            value: TaskValue::Text(text.into()),
            usage_tokens,
        }
    }

    pub fn records(records: Vec<Record>, usage_tokens: Option<u64>) -> Self {
        Self {
            value: TaskValue::Records(records),
            usage_tokens,
        }
    }
}

/// Why a task failed
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{0}")]
    Completion(#[from] CompletionError),

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Fetch(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Prompt template error: {0}")]
    Prompt(String),
}

pub type TaskResult = Result<TaskOutput, PluginError>;

/// Sum two optional token counts, keeping whichever is known
pub(crate) fn add_usage(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

/// A capability provider
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Which provider this is
    fn kind(&self) -> PluginKind;

    /// Stable id plans refer to
    fn name(&self) -> &'static str {
        self.kind().id()
    }

    /// Capability name to natural-language description
    fn capabilities(&self) -> BTreeMap<String, String>;

    /// One-line usage hint for the REPL
    fn help(&self) -> &str;

    /// Execute one task against the shared context
    async fn run(&self, task: &str, context: &[Turn], events: &Emitter<'_>) -> TaskResult;
}

/// Plugins keyed by their stable id
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin, replacing any previous one of the same kind
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        debug!(plugin = %plugin.name(), "PluginRegistry::register: called");
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn with(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.register(plugin);
        self
    }

    /// Look up a plugin by id
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let found = self.plugins.get(name).cloned();
        if found.is_none() {
            debug!(%name, "PluginRegistry::get: not registered");
        }
        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// `(plugin id, help text)` for every plugin
    pub fn help(&self) -> Vec<(String, String)> {
        self.plugins
            .iter()
            .map(|(name, plugin)| (name.clone(), plugin.help().to_string()))
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plugin_kind_ids_round_trip() {
        for kind in PluginKind::ALL {
            assert_eq!(PluginKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(PluginKind::from_id("WeatherPlugin"), None);
        assert_eq!(PluginKind::FreeForm.to_string(), "GPTPlugin");
    }

    #[test]
    fn test_task_value_render() {
        assert_eq!(TaskValue::Text("Summary".to_string()).render(), "Summary");

        let mut record = Record::new();
        record.insert("Title".to_string(), json!("Brute force"));
        let value = TaskValue::Records(vec![record]);
        assert_eq!(value.render(), r#"[{"Title":"Brute force"}]"#);
        assert_eq!(value.records().map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_add_usage() {
        assert_eq!(add_usage(Some(2), Some(3)), Some(5));
        assert_eq!(add_usage(None, Some(3)), Some(3));
        assert_eq!(add_usage(None, None), None);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = PluginRegistry::new()
            .with(Arc::new(mock::ScriptedPlugin::new(PluginKind::FreeForm, vec![])))
            .with(Arc::new(mock::ScriptedPlugin::new(PluginKind::FetchUrl, vec![])));

        assert_eq!(registry.len(), 2);
        assert!(registry.get("GPTPlugin").is_some());
        assert!(registry.get("SentinelKQLPlugin").is_none());
        assert_eq!(registry.names(), vec!["FetchURLPlugin".to_string(), "GPTPlugin".to_string()]);
        assert_eq!(registry.help().len(), 2);
    }

    #[test]
    fn test_plugin_error_messages() {
        assert_eq!(
            PluginError::UnknownPlugin("WeatherPlugin".to_string()).to_string(),
            "Unknown plugin: WeatherPlugin"
        );
        let err: PluginError = CompletionError::Connectivity("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "connection refused");
    }
}
