//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::formatter::OutputStyle;

/// SecAssist - LLM-planned security analytics assistant
#[derive(Parser)]
#[command(
    name = "sa",
    about = "Security analytics assistant that plans requests into plugin tasks",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Print debug events (generated queries, token counts)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive session (default)
    Repl,

    /// Run one request and exit
    Run {
        /// The request, in natural language
        request: String,

        /// Presentation style for results
        #[arg(short, long, value_enum, default_value_t = OutputStyle::Terminal)]
        style: OutputStyle,

        /// Output format: text prints results, json streams every event as a JSON line
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the capability catalog as JSON
    Plugins,

    /// Build the analytics schema catalog and write the cache
    Schema {
        /// Rebuild even when a cache file exists
        #[arg(long)]
        refresh: bool,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("secassist")
        .join("logs")
        .join("secassist.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with config and log locations
pub fn generate_after_help() -> String {
    let mut help = String::new();

    help.push_str("Config files (first found wins):\n");
    help.push_str("  --config <PATH>\n");
    help.push_str("  ./.secassist.yml\n");
    if let Some(config_dir) = dirs::config_dir() {
        help.push_str(&format!("  {}\n", config_dir.join("secassist").join("secassist.yml").display()));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

/// Output format for one-shot runs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["sa"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::parse_from(["sa", "run", "List the last 5 incidents"]);
        match cli.command {
            Some(Command::Run { request, style, format }) => {
                assert_eq!(request, "List the last 5 incidents");
                assert_eq!(style, OutputStyle::Terminal);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_run_json_html() {
        let cli = Cli::parse_from(["sa", "run", "q", "--style", "html", "--format", "json", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Some(Command::Run {
                style: OutputStyle::Html,
                format: OutputFormat::Json,
                ..
            })
        ));
    }

    #[test]
    fn test_cli_parse_schema_refresh() {
        let cli = Cli::parse_from(["sa", "schema", "--refresh"]);
        assert!(matches!(cli.command, Some(Command::Schema { refresh: true })));
    }

    #[test]
    fn test_cli_parse_global_options() {
        let cli = Cli::parse_from(["sa", "plugins", "--config", "/tmp/sa.yml", "-l", "debug"]);
        assert!(matches!(cli.command, Some(Command::Plugins)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sa.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("table".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Text.to_string(), "text");
    }

    #[test]
    fn test_after_help_mentions_log_path() {
        assert!(generate_after_help().contains("secassist.log"));
    }
}
