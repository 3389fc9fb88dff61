//! Document fetch plugin - extract a URL, download it, reduce it to text

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Node};
use serde_json::json;
use tracing::debug;

use super::{Plugin, PluginError, PluginKind, TaskOutput, TaskResult};
use crate::completion::CompletionProvider;
use crate::config::FetchConfig;
use crate::context::Turn;
use crate::events::Emitter;
use crate::prompts::PromptLoader;
use crate::text::strip_code_fences;

/// Elements whose text never reaches the output
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Asks the model for the URL in a task, then fetches and cleans it
pub struct FetchUrlPlugin {
    completions: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptLoader>,
    http: Client,
    max_bytes: usize,
}

impl FetchUrlPlugin {
    pub fn new(
        completions: Arc<dyn CompletionProvider>,
        prompts: Arc<PromptLoader>,
        config: &FetchConfig,
    ) -> Result<Self, PluginError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| PluginError::Fetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            completions,
            prompts,
            http,
            max_bytes: config.max_bytes,
        })
    }

    async fn download(&self, url: Url) -> Result<String, PluginError> {
        debug!(%url, "FetchUrlPlugin::download: sending HTTP request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PluginError::Fetch(format!("Failed to fetch URL: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "FetchUrlPlugin::download: HTTP error status");
            return Err(PluginError::Fetch(format!(
                "Failed to retrieve content. Status code: {}",
                status.as_u16()
            )));
        }

        if response.content_length().is_some_and(|len| len as usize > self.max_bytes) {
            return Err(PluginError::Fetch(format!("Response too large (> {} bytes)", self.max_bytes)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PluginError::Fetch(format!("Failed to read response: {}", e)))?;
        if body.len() > self.max_bytes {
            return Err(PluginError::Fetch(format!("Response too large (> {} bytes)", self.max_bytes)));
        }

        Ok(clean_html(&body))
    }
}

/// Validate model output as an absolute http(s) URL
fn parse_url(raw: &str) -> Result<Url, PluginError> {
    let candidate = strip_code_fences(raw).replace('\n', "");
    let candidate = candidate.trim();

    let url = Url::parse(candidate).map_err(|e| PluginError::InvalidOutput(format!("'{}' is not a URL: {}", candidate, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PluginError::InvalidOutput(format!("Unsupported URL scheme '{}'", other))),
    }
}

/// Reduce an HTML document to its visible text, one phrase per line
pub fn clean_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    let mut raw = String::new();
    for node in doc.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            raw.push_str(text);
        }
    }

    raw.lines()
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Plugin for FetchUrlPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::FetchUrl
    }

    fn capabilities(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            "fetchurl".to_string(),
            "This capability retrieves data from external urls or sites to be processed inside the session.".to_string(),
        )])
    }

    fn help(&self) -> &str {
        "Mention a URL in your prompt to retrieve its content and process it."
    }

    async fn run(&self, task: &str, context: &[Turn], events: &Emitter<'_>) -> TaskResult {
        debug!(task_len = task.len(), "FetchUrlPlugin::run: called");
        let prompt = self
            .prompts
            .render("fetch-extract-url", &json!({ "task": task }))
            .map_err(|e| PluginError::Prompt(e.to_string()))?;

        let completion = self.completions.complete(&prompt, context).await?;
        let url = parse_url(&completion.text)?;
        events.debug(format!("Fetching URL: {}", url));

        let content = self.download(url).await?;
        Ok(TaskOutput::text(content, completion.usage_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::mock::ScriptedCompletions;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one raw HTTP response on a loopback port and return its URL
    async fn serve_once(response: String) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).await;
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        });
        Url::parse(&format!("http://{}/advisory", addr)).unwrap()
    }

    fn html_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    /// Plugin whose client talks to loopback directly, ignoring any proxy settings
    fn local_plugin(completions: Arc<ScriptedCompletions>, max_bytes: usize) -> FetchUrlPlugin {
        let config = FetchConfig {
            max_bytes,
            ..FetchConfig::default()
        };
        let mut plugin = FetchUrlPlugin::new(completions, Arc::new(PromptLoader::embedded_only()), &config).unwrap();
        plugin.http = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        plugin
    }

    #[test]
    fn test_clean_html_strips_markup_and_scripts() {
        let html = r#"<html><head><title>Advisory</title><style>body { color: red; }</style></head>
            <body>
              <script>var tracking = 1;</script>
              <h1>  CVE-2024-0001  </h1>
              <p>Patch   now.  Exploited in the wild.</p>
              <noscript>Enable JavaScript</noscript>
            </body></html>"#;

        let text = clean_html(html);
        assert_eq!(text, "Advisory\nCVE-2024-0001\nPatch\nnow.\nExploited in the wild.");
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_clean_html_plain_text() {
        assert_eq!(clean_html("just text"), "just text");
    }

    #[test]
    fn test_parse_url() {
        let url = parse_url("```plaintext\nhttps://example.com/report\n```").unwrap();
        assert_eq!(url.as_str(), "https://example.com/report");

        assert!(matches!(parse_url("no url here"), Err(PluginError::InvalidOutput(_))));
        assert!(matches!(parse_url("file:///etc/passwd"), Err(PluginError::InvalidOutput(_))));
        assert!(matches!(parse_url("ftp://example.com"), Err(PluginError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn test_invalid_url_never_fetched() {
        let completions = Arc::new(ScriptedCompletions::texts(&["I could not find a URL"]));
        let plugin = FetchUrlPlugin::new(
            completions.clone(),
            Arc::new(PromptLoader::embedded_only()),
            &FetchConfig::default(),
        )
        .unwrap();

        let err = plugin
            .run("summarize the advisory", &[], &Emitter::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidOutput(_)));

        let calls = completions.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("summarize the advisory"));
    }

    #[tokio::test]
    async fn test_download_error_status() {
        let url = serve_once(html_response("404 Not Found", "")).await;
        let plugin = local_plugin(Arc::new(ScriptedCompletions::texts(&[])), 1024);

        let err = plugin.download(url).await.unwrap_err();
        assert!(matches!(err, PluginError::Fetch(_)));
        assert_eq!(err.to_string(), "Failed to retrieve content. Status code: 404");
    }

    #[tokio::test]
    async fn test_run_fetches_and_cleans() {
        let url = serve_once(html_response("200 OK", "<script>x=1</script><p>Hello  World</p>")).await;
        let answer = format!("```plaintext\n{}\n```", url);
        let completions = Arc::new(ScriptedCompletions::texts(&[answer.as_str()]));
        let plugin = local_plugin(completions.clone(), 1024);

        let output = plugin
            .run("summarize the advisory", &[], &Emitter::silent())
            .await
            .unwrap();
        assert_eq!(output, TaskOutput::text("Hello\nWorld", Some(10)));
        assert_eq!(completions.call_count(), 1);
    }

    #[tokio::test]
    async fn test_download_rejects_declared_oversize_body() {
        let url = serve_once(html_response("200 OK", &"<p>padding</p>".repeat(8))).await;
        let plugin = local_plugin(Arc::new(ScriptedCompletions::texts(&[])), 32);

        let err = plugin.download(url).await.unwrap_err();
        assert_eq!(err.to_string(), "Response too large (> 32 bytes)");
    }

    #[tokio::test]
    async fn test_download_rejects_undeclared_oversize_body() {
        // No Content-Length: the body is read to EOF and then measured
        let body = "<p>padding</p>".repeat(8);
        let url = serve_once(format!("HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n{}", body)).await;
        let plugin = local_plugin(Arc::new(ScriptedCompletions::texts(&[])), 32);

        let err = plugin.download(url).await.unwrap_err();
        assert_eq!(err.to_string(), "Response too large (> 32 bytes)");
    }
}
