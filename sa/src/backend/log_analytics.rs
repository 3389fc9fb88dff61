//! Log Analytics query API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{BackendError, QueryBackend, Record};
use crate::config::AnalyticsConfig;

/// Default request timeout for queries
const QUERY_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs queries against `{endpoint}/v1/workspaces/{workspace_id}/query`
///
/// The bearer token is read from the configured environment variable on every
/// call, so a rotated token is picked up without a restart.
pub struct LogAnalyticsBackend {
    http: Client,
    url: String,
    token_env: String,
}

impl LogAnalyticsBackend {
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, BackendError> {
        debug!(endpoint = %config.endpoint, "LogAnalyticsBackend::from_config: called");
        if config.workspace_id.is_empty() {
            return Err(BackendError::NotConfigured(
                "analytics.workspace-id is not set".to_string(),
            ));
        }

        let http = Client::builder().timeout(QUERY_TIMEOUT).build()?;
        let url = format!(
            "{}/v1/workspaces/{}/query",
            config.endpoint.trim_end_matches('/'),
            config.workspace_id
        );

        Ok(Self {
            http,
            url,
            token_env: config.token_env.clone(),
        })
    }

    fn token(&self) -> Result<String, BackendError> {
        std::env::var(&self.token_env)
            .map_err(|_| BackendError::NotConfigured(format!("Set the {} environment variable", self.token_env)))
    }
}

#[async_trait]
impl QueryBackend for LogAnalyticsBackend {
    async fn run_query(&self, query: &str) -> Result<Vec<Record>, BackendError> {
        debug!(query_len = query.len(), "LogAnalyticsBackend::run_query: called");
        let token = self.token()?;

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(%status, "LogAnalyticsBackend::run_query: query rejected");
            return Err(BackendError::Query {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: QueryResponse =
            serde_json::from_str(&body).map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(flatten_first_table(parsed))
    }
}

/// Turn the first result table into records; later tables are ignored
fn flatten_first_table(response: QueryResponse) -> Vec<Record> {
    if let Some(err) = &response.error {
        warn!(message = %err.message, "Query returned partial results");
    }

    let Some(table) = response.tables.into_iter().next() else {
        debug!("flatten_first_table: no tables in response");
        return Vec::new();
    };

    let names: Vec<String> = table.columns.into_iter().map(|c| c.name).collect();
    table
        .rows
        .into_iter()
        .map(|row| names.iter().cloned().zip(row).collect())
        .collect()
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// API response types

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    tables: Vec<QueryTable>,
    error: Option<QueryErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct QueryTable {
    columns: Vec<QueryColumn>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct QueryColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: QueryErrorDetail,
}

#[derive(Debug, Deserialize)]
struct QueryErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_first_table() {
        let raw = json!({
            "tables": [{
                "name": "PrimaryResult",
                "columns": [{"name": "Title", "type": "string"}, {"name": "Severity", "type": "string"}],
                "rows": [["Suspicious sign-in", "High"], ["Malware detected", "Medium"]]
            }]
        });
        let parsed: QueryResponse = serde_json::from_value(raw).unwrap();

        let records = flatten_first_table(parsed);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Title"], "Suspicious sign-in");
        assert_eq!(records[1]["Severity"], "Medium");
    }

    #[test]
    fn test_flatten_partial_result_keeps_rows() {
        let raw = json!({
            "tables": [{"name": "PrimaryResult", "columns": [{"name": "DataType"}], "rows": [["SigninLogs"]]}],
            "error": {"code": "PartialError", "message": "query exceeded limits"}
        });
        let parsed: QueryResponse = serde_json::from_value(raw).unwrap();

        let records = flatten_first_table(parsed);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["DataType"], "SigninLogs");
    }

    #[test]
    fn test_flatten_no_tables() {
        let parsed: QueryResponse = serde_json::from_value(json!({})).unwrap();
        assert!(flatten_first_table(parsed).is_empty());
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error": {"code": "BadArgumentError", "message": "Syntax error"}}"#;
        assert_eq!(error_message(body), "Syntax error");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_from_config_requires_workspace() {
        let config = AnalyticsConfig::default();
        assert!(matches!(
            LogAnalyticsBackend::from_config(&config),
            Err(BackendError::NotConfigured(_))
        ));

        let config = AnalyticsConfig {
            workspace_id: "00000000-0000-0000-0000-000000000000".to_string(),
            endpoint: "https://api.loganalytics.io/".to_string(),
            ..AnalyticsConfig::default()
        };
        let backend = LogAnalyticsBackend::from_config(&config).unwrap();
        assert_eq!(
            backend.url,
            "https://api.loganalytics.io/v1/workspaces/00000000-0000-0000-0000-000000000000/query"
        );
    }
}
