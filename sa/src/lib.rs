//! SecAssist - LLM-planned security analytics assistant
//!
//! A free-text request is decomposed by the model into an ordered plan of
//! plugin tasks, each task runs against the shared session context, and each
//! result is reformatted for the requested output channel while progress is
//! streamed as events.
//!
//! # Modules
//!
//! - [`assistant`] - task pipeline and session registry
//! - [`planner`] - request decomposition with guaranteed fallback
//! - [`catalog`] - plugin capability catalog
//! - [`plugins`] - analytics query, document fetch and free-form plugins
//! - [`context`] - bounded conversation history
//! - [`formatter`] - output formatting per channel
//! - [`events`] - event sinks for live progress
//! - [`completion`] - completion provider boundary
//! - [`llm`] - OpenAI-compatible HTTP client
//! - [`backend`] - analytics query backend
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod assistant;
pub mod backend;
pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod context;
pub mod events;
pub mod formatter;
pub mod llm;
pub mod planner;
pub mod plugins;
pub mod prompts;
pub mod repl;
pub mod text;

pub use assistant::{Assistant, SessionRegistry};
pub use catalog::CapabilityCatalog;
pub use completion::{Completion, CompletionError, CompletionProvider, CompletionResult, LlmCompletionProvider};
pub use config::Config;
pub use context::{SessionContext, Turn};
pub use events::{ChannelSink, ConsoleSink, Emitter, Event, EventKind, EventSink, RecordingSink};
pub use formatter::{OutputFormatter, OutputStyle};
pub use planner::{Planner, Task};
pub use plugins::{Plugin, PluginError, PluginKind, PluginRegistry, TaskOutput, TaskResult, TaskValue};
pub use prompts::PromptLoader;
