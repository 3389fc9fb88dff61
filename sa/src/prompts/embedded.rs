//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Default system message for completions that carry none
pub const SYSTEM_DEFAULT: &str = include_str!("../../prompts/system-default.pmt");

/// Planner system instruction
pub const PLANNER_SYSTEM: &str = include_str!("../../prompts/planner-system.pmt");

/// Planner request wrapping the user request and catalog
pub const PLANNER_REQUEST: &str = include_str!("../../prompts/planner-request.pmt");

/// Terminal output formatting
pub const FORMAT_TERMINAL: &str = include_str!("../../prompts/format-terminal.pmt");

/// HTML fragment output formatting
pub const FORMAT_HTML: &str = include_str!("../../prompts/format-html.pmt");

/// Plain text output formatting
pub const FORMAT_PLAIN: &str = include_str!("../../prompts/format-plain.pmt");

/// Table selection for query generation
pub const KQL_SELECT_TABLE: &str = include_str!("../../prompts/kql-select-table.pmt");

/// Query generation rules
pub const KQL_GENERATE: &str = include_str!("../../prompts/kql-generate.pmt");

/// Restricts generation to one table's known fields
pub const KQL_SCHEMA_CONSTRAINT: &str = include_str!("../../prompts/kql-schema-constraint.pmt");

/// Per-table schema summarization
pub const KQL_SCHEMA_SUMMARY: &str = include_str!("../../prompts/kql-schema-summary.pmt");

/// URL extraction for the fetch plugin
pub const FETCH_EXTRACT_URL: &str = include_str!("../../prompts/fetch-extract-url.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    let found = match name {
        "system-default" => Some(SYSTEM_DEFAULT),
        "planner-system" => Some(PLANNER_SYSTEM),
        "planner-request" => Some(PLANNER_REQUEST),
        "format-terminal" => Some(FORMAT_TERMINAL),
        "format-html" => Some(FORMAT_HTML),
        "format-plain" => Some(FORMAT_PLAIN),
        "kql-select-table" => Some(KQL_SELECT_TABLE),
        "kql-generate" => Some(KQL_GENERATE),
        "kql-schema-constraint" => Some(KQL_SCHEMA_CONSTRAINT),
        "kql-schema-summary" => Some(KQL_SCHEMA_SUMMARY),
        "fetch-extract-url" => Some(FETCH_EXTRACT_URL),
        _ => None,
    };
    if found.is_none() {
        debug!(%name, "get_embedded: no match found");
    }
    found
}
