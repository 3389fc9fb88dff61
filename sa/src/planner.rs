//! Planner - LLM-driven decomposition of a user request into tasks
//!
//! The model sees the capability catalog and the live session context and
//! answers with a JSON array of `{plugin_name, capability_name, task}`. Output
//! that does not parse is replaced by a single free-form task carrying the
//! original request, so a misbehaving planner never blocks the user.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::CapabilityCatalog;
use crate::completion::CompletionProvider;
use crate::context::Turn;
use crate::events::Emitter;
use crate::plugins::{FREE_FORM_CAPABILITY, PluginKind};
use crate::prompts::PromptLoader;
use crate::text::strip_code_fences;

/// One planned step, bound to a plugin capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub plugin_name: String,
    pub capability_name: String,
    pub task: String,
}

impl Task {
    /// The single-task plan used when planning output is unusable
    pub fn fallback(request: &str) -> Self {
        Self {
            plugin_name: PluginKind::FreeForm.id().to_string(),
            capability_name: FREE_FORM_CAPABILITY.to_string(),
            task: request.to_string(),
        }
    }
}

/// Parse model output as a task array
fn parse_plan(text: &str) -> Result<Vec<Task>, serde_json::Error> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(cleaned.trim())
}

/// Turns one user request into an ordered plan
#[derive(Clone)]
pub struct Planner {
    completions: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptLoader>,
}

impl Planner {
    pub fn new(completions: Arc<dyn CompletionProvider>, prompts: Arc<PromptLoader>) -> Self {
        Self { completions, prompts }
    }

    /// Plan `request` against the catalog
    ///
    /// Returns an empty plan (after one error event) when the completion fails.
    pub async fn plan(
        &self,
        request: &str,
        context: &[Turn],
        catalog: &CapabilityCatalog,
        events: &Emitter<'_>,
    ) -> Vec<Task> {
        debug!(request_len = request.len(), context = context.len(), "Planner::plan: called");

        let prompts = self.prompts.text("planner-system").and_then(|system| {
            let prompt = self.prompts.render(
                "planner-request",
                &json!({ "request": request, "catalog": catalog.to_prompt_json() }),
            )?;
            Ok((system, prompt))
        });
        let (system, prompt) = match prompts {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, "Planner::plan: failed to render planner prompts");
                events.error(e.to_string());
                return Vec::new();
            }
        };

        let mut prior = Vec::with_capacity(context.len() + 1);
        prior.push(Turn::system(system));
        prior.extend_from_slice(context);

        let completion = match self.completions.complete(&prompt, &prior).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, "Planner::plan: completion failed");
                events.error(e.to_string());
                return Vec::new();
            }
        };

        if let Some(tokens) = completion.usage_tokens {
            events.debug(format!("Session Tokens (plugin selection): {}", tokens));
        }

        match parse_plan(&completion.text) {
            Ok(tasks) => {
                info!("Planner produced {} tasks", tasks.len());
                tasks
            }
            Err(e) => {
                warn!(error = %e, "Planner::plan: unparseable plan, falling back");
                events.system(format!(
                    "Error decomposing. Running user prompt with {}",
                    PluginKind::FreeForm.id()
                ));
                vec![Task::fallback(request)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use crate::completion::mock::ScriptedCompletions;
    use crate::events::{EventKind, RecordingSink};
    use crate::plugins::PluginRegistry;
    use crate::plugins::mock::ScriptedPlugin;
    use proptest::prelude::*;

    fn catalog() -> CapabilityCatalog {
        CapabilityCatalog::from_registry(
            &PluginRegistry::new().with(Arc::new(ScriptedPlugin::new(PluginKind::FreeForm, vec![]))),
        )
    }

    fn planner(completions: Arc<ScriptedCompletions>) -> Planner {
        Planner::new(completions, Arc::new(PromptLoader::embedded_only()))
    }

    #[tokio::test]
    async fn test_plan_parses_fenced_array() {
        let completions = Arc::new(ScriptedCompletions::texts(&[r#"```json
[{"plugin_name":"SentinelKQLPlugin","capability_name":"generateandrunkql","task":"List incidents"},
 {"plugin_name":"GPTPlugin","capability_name":"runprompt","task":"Summarize the incidents above"}]
```"#]));
        let sink = RecordingSink::new();

        let tasks = planner(completions)
            .plan("incidents summary", &[], &catalog(), &Emitter::new(Some(&sink)))
            .await;

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].plugin_name, "SentinelKQLPlugin");
        assert_eq!(tasks[1].task, "Summarize the incidents above");
        assert_eq!(
            sink.messages(EventKind::Debug),
            vec!["Session Tokens (plugin selection): 10".to_string()]
        );
    }

    #[test]
    fn test_parse_plan_with_unlisted_fence_tag() {
        let tasks = parse_plan("```jsonc\n[{\"plugin_name\":\"GPTPlugin\",\"capability_name\":\"runprompt\",\"task\":\"t\"}]\n```").unwrap();
        assert_eq!(tasks, vec![Task {
            plugin_name: "GPTPlugin".to_string(),
            capability_name: "runprompt".to_string(),
            task: "t".to_string(),
        }]);
    }

    #[tokio::test]
    async fn test_plan_prompt_carries_system_context_and_catalog() {
        let completions = Arc::new(ScriptedCompletions::texts(&["[]"]));
        let context = vec![Turn::user("earlier request"), Turn::assistant("earlier answer")];

        let tasks = planner(completions.clone())
            .plan("next request", &context, &catalog(), &Emitter::silent())
            .await;
        assert!(tasks.is_empty());

        let call = &completions.calls()[0];
        assert_eq!(call.prior.len(), 3);
        assert_eq!(call.prior[0].role, crate::llm::Role::System);
        assert!(call.prior[0].content.contains("always return an array"));
        assert_eq!(&call.prior[1..], &context[..]);
        assert!(call.prompt.contains("next request"));
        assert!(call.prompt.contains(r#"{"GPTPlugin":{"run":"GPTPlugin test capability"}}"#));
    }

    #[tokio::test]
    async fn test_completion_error_yields_empty_plan_and_one_error() {
        let completions = Arc::new(ScriptedCompletions::new(vec![Err(CompletionError::MalformedRequest(
            "content_filter - blocked".to_string(),
        ))]));
        let sink = RecordingSink::new();

        let tasks = planner(completions)
            .plan("anything", &[], &catalog(), &Emitter::new(Some(&sink)))
            .await;

        assert!(tasks.is_empty());
        assert_eq!(sink.messages(EventKind::Error), vec!["content_filter - blocked".to_string()]);
    }

    #[tokio::test]
    async fn test_object_instead_of_array_falls_back() {
        let completions = Arc::new(ScriptedCompletions::texts(&[
            r#"{"plugin_name":"GPTPlugin","capability_name":"runprompt","task":"x"}"#,
        ]));
        let tasks = planner(completions)
            .plan("What is a SOC?", &[], &catalog(), &Emitter::silent())
            .await;

        assert_eq!(tasks, vec![Task::fallback("What is a SOC?")]);
    }

    #[tokio::test]
    async fn test_missing_fields_falls_back() {
        let completions = Arc::new(ScriptedCompletions::texts(&[r#"[{"plugin_name":"GPTPlugin"}]"#]));
        let sink = RecordingSink::new();
        let tasks = planner(completions)
            .plan("hello", &[], &catalog(), &Emitter::new(Some(&sink)))
            .await;

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].capability_name, FREE_FORM_CAPABILITY);
        assert_eq!(sink.count(EventKind::Error), 0);
        assert_eq!(sink.count(EventKind::System), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_unparseable_output_falls_back(garbage in "[a-zA-Z ,.:{}]{0,80}", request in "[a-zA-Z ?]{1,40}") {
            // Only a JSON array of complete tasks is accepted
            prop_assume!(parse_plan(&garbage).is_err());

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let completions = Arc::new(ScriptedCompletions::texts(&[garbage.as_str()]));
            let tasks = runtime.block_on(planner(completions).plan(&request, &[], &catalog(), &Emitter::silent()));

            prop_assert_eq!(tasks.len(), 1);
            prop_assert_eq!(&tasks[0].capability_name, FREE_FORM_CAPABILITY);
            prop_assert_eq!(&tasks[0].task, &request);
        }
    }
}
