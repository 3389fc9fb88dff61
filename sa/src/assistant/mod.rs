//! Assistant - the task pipeline tying planner, plugins, context and formatter
//!
//! ```text
//! request ─▶ Planner ─▶ [Task] ─▶ Plugin::run ─▶ SessionContext::append
//!                                      │
//!                                      └─▶ OutputFormatter ─▶ EventSink
//! ```
//!
//! Tasks run strictly in plan order. The first failing task ends the run; the
//! results formatted before it are still returned.

mod sessions;

pub use sessions::{SessionHandle, SessionRegistry};

use std::sync::Arc;
use std::time::Instant;

use eyre::{Context, Result};
use tracing::{debug, info, warn};

use crate::backend::{BackendError, LogAnalyticsBackend, QueryBackend};
use crate::catalog::CapabilityCatalog;
use crate::completion::{CompletionProvider, LlmCompletionProvider};
use crate::config::Config;
use crate::context::SessionContext;
use crate::events::{Emitter, EventSink};
use crate::formatter::{OutputFormatter, OutputStyle, detect_console_width};
use crate::llm::create_client;
use crate::planner::Planner;
use crate::plugins::{
    AnalyticsQueryPlugin, FetchUrlPlugin, GptPlugin, PluginError, PluginRegistry, SchemaBuilder,
};
use crate::prompts::PromptLoader;

/// One conversation: plugins and helpers plus its own session context
#[derive(Clone)]
pub struct Assistant {
    plugins: PluginRegistry,
    catalog: CapabilityCatalog,
    context: SessionContext,
    planner: Planner,
    formatter: OutputFormatter,
}

impl Assistant {
    pub fn new(plugins: PluginRegistry, planner: Planner, formatter: OutputFormatter, window: usize) -> Self {
        let catalog = CapabilityCatalog::from_registry(&plugins);
        info!("Assistant ready with {} plugins: {:?}", plugins.len(), plugins.names());
        Self {
            plugins,
            catalog,
            context: SessionContext::new(window),
            planner,
            formatter,
        }
    }

    /// Wire the production stack from configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let prompts = Arc::new(PromptLoader::new(config.assistant.prompts_dir.as_deref()));
        let completions = completion_provider(config, &prompts)?;

        let mut plugins = PluginRegistry::new()
            .with(Arc::new(GptPlugin::new(completions.clone())))
            .with(Arc::new(
                FetchUrlPlugin::new(completions.clone(), prompts.clone(), &config.fetch)
                    .context("Failed to create fetch plugin")?,
            ));

        if config.analytics.enabled {
            match analytics_backend(config) {
                Ok(backend) => {
                    let mut plugin = AnalyticsQueryPlugin::new(completions.clone(), prompts.clone(), backend.clone());
                    if config.analytics.load_schema {
                        let builder =
                            SchemaBuilder::new(backend.as_ref(), completions.as_ref(), &prompts, &config.analytics);
                        match builder.load_or_build(config.analytics.schema_cache.as_deref(), false).await {
                            Ok(schema) => plugin = plugin.with_schema(schema),
                            Err(e) => warn!(error = %e, "Schema catalog unavailable, generating queries without schema"),
                        }
                    }
                    plugins.register(Arc::new(plugin));
                }
                Err(e) => warn!(error = %e, "Analytics plugin disabled"),
            }
        }

        let width = config.assistant.console_width.unwrap_or_else(detect_console_width);
        let planner = Planner::new(completions.clone(), prompts.clone());
        let formatter = OutputFormatter::new(completions, prompts, width);
        Ok(Self::new(plugins, planner, formatter, config.assistant.context_window_size))
    }

    /// Plan `request`, run every task in order, and return the formatted results
    pub async fn execute(&mut self, style: OutputStyle, request: &str, sink: Option<&dyn EventSink>) -> Vec<String> {
        debug!(?style, request_len = request.len(), "Assistant::execute: called");
        let events = Emitter::new(sink);
        let started = Instant::now();

        let tasks = self
            .planner
            .plan(request, self.context.turns(), &self.catalog, &events)
            .await;
        events.system(format!("Prompt decomposed in {} tasks", tasks.len()));

        let mut results = Vec::with_capacity(tasks.len());
        for task in &tasks {
            events.system(format!("({}) {}", task.plugin_name, task.task));

            let Some(plugin) = self.plugins.get(&task.plugin_name) else {
                warn!(plugin = %task.plugin_name, "Assistant::execute: plan names an unregistered plugin");
                events.error(PluginError::UnknownPlugin(task.plugin_name.clone()).to_string());
                break;
            };

            let output = match plugin.run(&task.task, self.context.turns(), &events).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(plugin = %task.plugin_name, error = %e, "Assistant::execute: task failed, halting");
                    events.error(e.to_string());
                    break;
                }
            };

            let raw = output.value.render();
            self.context.append(request, raw.as_str());

            let formatted = match self.formatter.format(style, request, &raw).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Assistant::execute: formatting failed");
                    events.error(e.to_string());
                    String::new()
                }
            };
            events.result(formatted.as_str());
            results.push(formatted);
            events.debug(format!("Session Length: {}", self.context.len()));
        }

        events.system(format!("Processing Time: {:.2} seconds", started.elapsed().as_secs_f64()));
        events.completed("Processing Done");
        info!(tasks = tasks.len(), results = results.len(), "Assistant::execute: done");
        results
    }

    /// Forget the conversation so far
    pub fn clear_session(&mut self) {
        debug!("Assistant::clear_session: called");
        self.context.clear();
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    pub fn plugin_help(&self) -> Vec<(String, String)> {
        self.plugins.help()
    }

    /// A new conversation sharing this one's plugins
    pub fn spawn_session(&self) -> Self {
        let mut session = self.clone();
        session.context.clear();
        session
    }
}

/// Completion provider backed by the configured LLM
pub fn completion_provider(config: &Config, prompts: &PromptLoader) -> Result<Arc<dyn CompletionProvider>> {
    let client = create_client(&config.llm).context("Failed to create LLM client")?;
    let system = prompts.text("system-default")?;
    Ok(Arc::new(LlmCompletionProvider::new(client, system, config.llm.max_tokens)))
}

/// Analytics backend for the configured workspace
pub fn analytics_backend(config: &Config) -> Result<Arc<dyn QueryBackend>, BackendError> {
    Ok(Arc::new(LogAnalyticsBackend::from_config(&config.analytics)?))
}
