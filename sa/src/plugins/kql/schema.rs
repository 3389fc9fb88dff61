//! Per-table schema catalog for the analytics plugin
//!
//! Built once by sampling the backend and asking the model to summarize each
//! table, then cached as JSON so later runs skip the sampling.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::backend::{BackendError, QueryBackend, Record};
use crate::completion::CompletionProvider;
use crate::config::AnalyticsConfig;
use crate::prompts::PromptLoader;
use crate::text::strip_code_fences;

/// One field as described by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    #[serde(rename = "fieldType", default)]
    pub field_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "sampleValue", default)]
    pub sample_value: Value,
}

/// Model-written summary of one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(rename = "tableDescription")]
    pub table_description: String,
    #[serde(rename = "schemaDetails")]
    pub schema_details: Vec<FieldSchema>,
}

/// Table name to summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, schema: TableSchema) {
        self.tables.insert(table.into(), schema);
    }

    /// Exact-match lookup
    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.tables.get(table)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// `(name, description)` pairs for the table-selection prompt
    pub fn descriptions(&self) -> Vec<Value> {
        self.tables
            .iter()
            .map(|(name, schema)| json!({ "name": name, "description": schema.table_description }))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Read a cached catalog
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context(format!("Failed to read schema cache {}", path.display()))?;
        let catalog: Self =
            serde_json::from_str(&content).context(format!("Failed to parse schema cache {}", path.display()))?;
        info!("Loaded schema catalog ({} tables) from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Write the catalog as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create schema cache directory")?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).context(format!("Failed to write schema cache {}", path.display()))?;
        info!("Saved schema catalog ({} tables) to {}", self.len(), path.display());
        Ok(())
    }
}

/// Samples the backend and summarizes every table it reports
pub struct SchemaBuilder<'a> {
    backend: &'a dyn QueryBackend,
    completions: &'a dyn CompletionProvider,
    prompts: &'a PromptLoader,
    config: &'a AnalyticsConfig,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(
        backend: &'a dyn QueryBackend,
        completions: &'a dyn CompletionProvider,
        prompts: &'a PromptLoader,
        config: &'a AnalyticsConfig,
    ) -> Self {
        Self {
            backend,
            completions,
            prompts,
            config,
        }
    }

    /// Build the catalog; tables that fail any step are skipped
    pub async fn build(&self) -> Result<SchemaCatalog, BackendError> {
        let tables = self.list_tables().await?;
        info!("Retrieving schema for {} workspace tables", tables.len());

        let mut catalog = SchemaCatalog::new();
        for table in tables {
            match self.summarize_table(&table).await {
                Ok(schema) => catalog.insert(table, schema),
                Err(e) => warn!(%table, error = %e, "Error obtaining schema for table, table not supported"),
            }
        }
        Ok(catalog)
    }

    /// Load from `cache` when present (and not refreshing), otherwise build and write it
    pub async fn load_or_build(&self, cache: Option<&Path>, refresh: bool) -> Result<SchemaCatalog> {
        if let Some(path) = cache
            && !refresh
            && path.exists()
        {
            return SchemaCatalog::load(path);
        }

        let catalog = self.build().await.context("Failed to build schema catalog")?;
        if let Some(path) = cache {
            catalog.save(path)?;
        }
        Ok(catalog)
    }

    async fn list_tables(&self) -> Result<Vec<String>, BackendError> {
        let rows = self.backend.run_query("Usage | summarize by DataType").await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("DataType").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn summarize_table(&self, table: &str) -> Result<TableSchema> {
        debug!(%table, "SchemaBuilder::summarize_table: called");
        let schema_rows = self.backend.run_query(&format!("{} | getschema kind=csl", table)).await?;
        let schema = schema_rows
            .first()
            .and_then(|row| row.get("Schema"))
            .map(value_text)
            .ok_or_else(|| eyre::eyre!("getschema returned no Schema column"))?;

        let samples = self
            .backend
            .run_query(&format!(
                "{} | where TimeGenerated > ago({}d) | take {}",
                table, self.config.sample_days, self.config.sample_rows
            ))
            .await?;

        let prompt = self.prompts.render(
            "kql-schema-summary",
            &json!({
                "table": table,
                "all_fields": self.config.full_schema_tables.iter().any(|t| t == table),
                "max_fields": self.config.max_fields,
                "schema": schema,
                "samples": records_text(&samples),
            }),
        )?;

        let completion = self.completions.complete(&prompt, &[]).await?;
        let cleaned = strip_code_fences(&completion.text);
        let summary: TableSchema = serde_json::from_str(cleaned.trim()).context("Model returned invalid schema JSON")?;
        Ok(summary)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn records_text(records: &[Record]) -> String {
    serde_json::to_string(records).unwrap_or_default()
}
