//! Free-form completion plugin

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Plugin, PluginKind, TaskOutput, TaskResult};
use crate::completion::CompletionProvider;
use crate::context::Turn;
use crate::events::Emitter;

/// Capability the planner falls back to
pub const FREE_FORM_CAPABILITY: &str = "runprompt";

/// Forwards the task and context straight to the completion provider
pub struct GptPlugin {
    completions: Arc<dyn CompletionProvider>,
}

impl GptPlugin {
    pub fn new(completions: Arc<dyn CompletionProvider>) -> Self {
        Self { completions }
    }
}

#[async_trait]
impl Plugin for GptPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::FreeForm
    }

    fn capabilities(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            FREE_FORM_CAPABILITY.to_string(),
            "This capability runs a prompt without retrieving any additional data. It should be used when the user \
             prompt doesn't require any additional or external data."
                .to_string(),
        )])
    }

    fn help(&self) -> &str {
        "If your prompt doesn't need data from any other plugin it will be submitted to the GPT model"
    }

    async fn run(&self, task: &str, context: &[Turn], _events: &Emitter<'_>) -> TaskResult {
        debug!(task_len = task.len(), context = context.len(), "GptPlugin::run: called");
        let completion = self.completions.complete(task, context).await?;
        Ok(TaskOutput::text(completion.text, completion.usage_tokens))
    }
}
