//! Output formatter - a second completion renders raw results for a channel

use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::completion::{CompletionError, CompletionProvider};
use crate::prompts::PromptLoader;
use crate::text::strip_code_fences;

/// Fields longer than this are truncated by the formatter prompt
pub const FIELD_WIDTH: usize = 40;

/// Width used when no terminal is attached and none is configured
pub const FALLBACK_CONSOLE_WIDTH: u16 = 120;

/// Presentation target for formatted results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Terminal,
    Html,
    Plain,
}

impl OutputStyle {
    fn template(&self) -> &'static str {
        match self {
            OutputStyle::Terminal => "format-terminal",
            OutputStyle::Html => "format-html",
            OutputStyle::Plain => "format-plain",
        }
    }
}

/// Width of the attached terminal, or the fallback
pub fn detect_console_width() -> u16 {
    match crossterm::terminal::size() {
        Ok((cols, _)) if cols > 0 => cols,
        _ => FALLBACK_CONSOLE_WIDTH,
    }
}

#[derive(Clone)]
pub struct OutputFormatter {
    completions: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptLoader>,
    console_width: u16,
}

impl OutputFormatter {
    pub fn new(completions: Arc<dyn CompletionProvider>, prompts: Arc<PromptLoader>, console_width: u16) -> Self {
        Self {
            completions,
            prompts,
            console_width,
        }
    }

    pub fn console_width(&self) -> u16 {
        self.console_width
    }

    /// Render `raw` for `style`
    ///
    /// Errors are returned to the caller, which reports them and keeps going.
    pub async fn format(&self, style: OutputStyle, request: &str, raw: &str) -> Result<String, CompletionError> {
        debug!(?style, raw_len = raw.len(), "OutputFormatter::format: called");
        let prompt = self
            .prompts
            .render(
                style.template(),
                &json!({
                    "width": self.console_width,
                    "field_width": FIELD_WIDTH,
                    "request": request,
                    "response": raw,
                }),
            )
            .map_err(|e| CompletionError::MalformedRequest(e.to_string()))?;

        let completion = self.completions.complete(&prompt, &[]).await?;
        Ok(strip_code_fences(&completion.text).trim().to_string())
    }
}
