//! Analytics query plugin - generate a KQL query with the model and run it
//!
//! With a schema catalog loaded, the model first picks the table, then writes
//! a query restricted to that table's known fields. A table name that is not
//! in the catalog degrades to unconstrained generation.

pub mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use super::{Plugin, PluginError, PluginKind, TaskOutput, TaskResult, add_usage};
use crate::backend::QueryBackend;
use crate::completion::CompletionProvider;
use crate::context::Turn;
use crate::events::Emitter;
use crate::prompts::PromptLoader;
use crate::text::strip_code_fences;
use schema::SchemaCatalog;

/// Row cap the generation rules ask for
pub const MAX_QUERY_ROWS: u32 = 100;

pub struct AnalyticsQueryPlugin {
    completions: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptLoader>,
    backend: Arc<dyn QueryBackend>,
    schema: Option<SchemaCatalog>,
}

impl AnalyticsQueryPlugin {
    pub fn new(
        completions: Arc<dyn CompletionProvider>,
        prompts: Arc<PromptLoader>,
        backend: Arc<dyn QueryBackend>,
    ) -> Self {
        Self {
            completions,
            prompts,
            backend,
            schema: None,
        }
    }

    /// Constrain generation with a schema catalog
    pub fn with_schema(mut self, schema: SchemaCatalog) -> Self {
        info!("Analytics plugin using schema catalog with {} tables", schema.len());
        self.schema = Some(schema);
        self
    }

    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String, PluginError> {
        self.prompts
            .render(template, data)
            .map_err(|e| PluginError::Prompt(e.to_string()))
    }

    /// Ask the model for the best table; `None` when the answer is not a catalog key
    async fn select_table<'s>(
        &self,
        schema: &'s SchemaCatalog,
        task: &str,
        context: &[Turn],
        events: &Emitter<'_>,
    ) -> Result<(Option<(&'s str, &'s schema::TableSchema)>, Option<u64>), PluginError> {
        let prompt = self.render(
            "kql-select-table",
            &json!({ "tables": schema.descriptions(), "task": task }),
        )?;
        let completion = self.completions.complete(&prompt, context).await?;

        let cleaned = strip_code_fences(&completion.text);
        let name = cleaned.trim();
        debug!(%name, "AnalyticsQueryPlugin::select_table: model answered");

        let found = schema
            .table_names()
            .find(|t| *t == name)
            .and_then(|t| schema.get(t).map(|s| (t, s)));
        match found {
            Some((table, _)) => events.debug(format!("Selected Table: {}", table)),
            None => events.debug(format!(
                "Table '{}' not found in schema. Generating query without schema",
                name
            )),
        }
        Ok((found, completion.usage_tokens))
    }
}

/// Reject empty output and management commands before they reach the backend
fn validate_query(raw: &str) -> Result<String, PluginError> {
    let cleaned = strip_code_fences(raw);
    let query = cleaned.trim();
    if query.is_empty() {
        return Err(PluginError::InvalidOutput("model returned an empty query".to_string()));
    }
    if query.starts_with('.') {
        return Err(PluginError::InvalidOutput(format!(
            "management commands are not allowed: {}",
            query.lines().next().unwrap_or_default()
        )));
    }
    Ok(query.to_string())
}

#[async_trait]
impl Plugin for AnalyticsQueryPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::AnalyticsQuery
    }

    fn capabilities(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            "generateandrunkql".to_string(),
            "This capability generates and runs KQL queries to retrieve logs and events from Microsoft Sentinel. \
             It should be used when the user asks about retrieving new incidents or alerts. Other types of common \
             data are Signin and Audit logs. Do not use this capability if the user asks only for KQL generation \
             without running it."
                .to_string(),
        )])
    }

    fn help(&self) -> &str {
        "Ask for incidents, alerts, sign-ins or other log data to generate and run KQL adhering to the Sentinel schema."
    }

    async fn run(&self, task: &str, context: &[Turn], events: &Emitter<'_>) -> TaskResult {
        debug!(task_len = task.len(), has_schema = self.schema.is_some(), "AnalyticsQueryPlugin::run: called");
        let mut usage = None;

        let mut request = task.to_string();
        if let Some(schema) = self.schema.as_ref().filter(|s| !s.is_empty()) {
            let (table, tokens) = self.select_table(schema, task, context, events).await?;
            usage = add_usage(usage, tokens);

            if let Some((name, table_schema)) = table {
                let fields = serde_json::to_string(&table_schema.schema_details).unwrap_or_default();
                request = self.render(
                    "kql-schema-constraint",
                    &json!({ "task": task, "table": name, "schema": fields }),
                )?;
            }
        }

        let prompt = self.render("kql-generate", &json!({ "task": request, "max_rows": MAX_QUERY_ROWS }))?;
        let completion = self.completions.complete(&prompt, context).await?;
        usage = add_usage(usage, completion.usage_tokens);

        let query = validate_query(&completion.text)?;
        events.debug(format!("Generated KQL Query:\n {}", query));

        let records = self.backend.run_query(&query).await?;
        debug!(rows = records.len(), "AnalyticsQueryPlugin::run: query returned");
        Ok(TaskOutput::records(records, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, record};
    use crate::completion::mock::ScriptedCompletions;
    use crate::events::{EventKind, RecordingSink};
    use schema::{FieldSchema, TableSchema};

    fn incident_schema() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog.insert(
            "SecurityIncident",
            TableSchema {
                table_description: "Security incidents".to_string(),
                schema_details: vec![FieldSchema {
                    field_name: "Title".to_string(),
                    field_type: "string".to_string(),
                    description: "Incident title".to_string(),
                    sample_value: json!("Brute force"),
                }],
            },
        );
        catalog
    }

    fn plugin(completions: Arc<ScriptedCompletions>, backend: Arc<MockBackend>) -> AnalyticsQueryPlugin {
        AnalyticsQueryPlugin::new(completions, Arc::new(PromptLoader::embedded_only()), backend)
    }

    #[test]
    fn test_validate_query() {
        assert_eq!(
            validate_query("```kql\nSecurityIncident | take 5\n```").unwrap(),
            "SecurityIncident | take 5"
        );
        assert!(matches!(validate_query("```\n\n```"), Err(PluginError::InvalidOutput(_))));
        assert!(matches!(validate_query(".drop table SecurityIncident"), Err(PluginError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn test_schema_constrained_generation() {
        let rows: Vec<_> = (0..5).map(|i| record(&[("Title", json!(format!("Incident {i}")))])).collect();
        let backend = Arc::new(MockBackend::new().with_table("SecurityIncident", rows));
        let completions = Arc::new(ScriptedCompletions::texts(&[
            "SecurityIncident",
            "```kql\nSecurityIncident | project Title | take 5\n```",
        ]));
        let plugin = plugin(completions.clone(), backend.clone()).with_schema(incident_schema());
        let sink = RecordingSink::new();

        let output = plugin
            .run("List the last 5 incidents", &[], &Emitter::new(Some(&sink)))
            .await
            .unwrap();

        assert_eq!(output.value.records().map(|r| r.len()), Some(5));
        assert_eq!(output.usage_tokens, Some(20));
        assert_eq!(backend.queries(), vec!["SecurityIncident | project Title | take 5".to_string()]);

        let calls = completions.calls();
        assert!(calls[0].prompt.contains("SecurityIncident: Security incidents"));
        assert!(calls[1].prompt.contains("use the SecurityIncident table"));
        assert!(calls[1].prompt.contains("\"fieldName\":\"Title\""));
        assert!(calls[1].prompt.contains("|take 100"));
        assert!(
            sink.messages(EventKind::Debug)
                .iter()
                .any(|m| m.starts_with("Generated KQL Query:"))
        );
    }

    #[tokio::test]
    async fn test_unknown_table_degrades_to_unconstrained() {
        let backend = Arc::new(MockBackend::new().with_table("SigninLogs", vec![]));
        let completions = Arc::new(ScriptedCompletions::texts(&[
            "The best table is SigninLogs",
            "SigninLogs | take 10",
        ]));
        let plugin = plugin(completions.clone(), backend).with_schema(incident_schema());

        let output = plugin
            .run("failed sign-ins today", &[], &Emitter::silent())
            .await
            .unwrap();

        assert_eq!(output.value.records().map(|r| r.len()), Some(0));
        let generation = &completions.calls()[1].prompt;
        assert!(generation.starts_with("failed sign-ins today"));
        assert!(!generation.contains("Always follow these instructions"));
    }

    #[tokio::test]
    async fn test_without_schema_skips_table_selection() {
        let backend = Arc::new(MockBackend::new().with_table("SecurityAlert", vec![record(&[("AlertName", json!("x"))])]));
        let completions = Arc::new(ScriptedCompletions::texts(&["SecurityAlert | take 1"]));
        let plugin = plugin(completions.clone(), backend);
        let context = vec![Turn::user("earlier"), Turn::assistant("rows")];

        plugin.run("latest alert", &context, &Emitter::silent()).await.unwrap();

        let calls = completions.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prior, context);
    }

    #[tokio::test]
    async fn test_management_command_never_runs() {
        let backend = Arc::new(MockBackend::new());
        let completions = Arc::new(ScriptedCompletions::texts(&[".set-or-replace Foo <| Bar"]));
        let plugin = plugin(completions, backend.clone());

        let err = plugin.run("anything", &[], &Emitter::silent()).await.unwrap_err();
        assert!(matches!(err, PluginError::InvalidOutput(_)));
        assert!(backend.queries().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_is_task_failure() {
        let backend = Arc::new(MockBackend::new());
        let completions = Arc::new(ScriptedCompletions::texts(&["Missing | take 1"]));
        let plugin = plugin(completions, backend);

        let err = plugin.run("anything", &[], &Emitter::silent()).await.unwrap_err();
        assert!(matches!(err, PluginError::Backend(_)));
    }
}
