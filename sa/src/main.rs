//! SecAssist - LLM-planned security analytics assistant
//!
//! CLI entry point: interactive session, one-shot runs, catalog and schema tools.

use std::fs;
use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches};
use eyre::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use secassist::assistant::{Assistant, SessionRegistry, analytics_backend, completion_provider};
use secassist::cli::{Cli, Command, OutputFormat, generate_after_help};
use secassist::config::Config;
use secassist::events::{ChannelSink, ConsoleSink, EventKind};
use secassist::formatter::OutputStyle;
use secassist::plugins::SchemaBuilder;
use secassist::prompts::PromptLoader;
use secassist::repl;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("secassist")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("secassist.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Log level comes from the config file before the full load
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "SecAssist loaded config: provider={} model={}",
        config.llm.provider, config.llm.model
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None | Some(Command::Repl) => repl::run_interactive(&config, cli.verbose).await,
        Some(Command::Run { request, style, format }) => cmd_run(&config, &request, style, format, cli.verbose).await,
        Some(Command::Plugins) => cmd_plugins(&config).await,
        Some(Command::Schema { refresh }) => cmd_schema(&config, refresh).await,
    }
}

/// Run one request, printing events as text or JSON lines
async fn cmd_run(config: &Config, request: &str, style: OutputStyle, format: OutputFormat, verbose: bool) -> Result<()> {
    debug!(%request, ?style, %format, "cmd_run: called");
    config.validate()?;
    let registry = SessionRegistry::new(Assistant::from_config(config).await?);
    let id = registry.create().await;
    let session = registry
        .get(&id)
        .await
        .ok_or_else(|| eyre::eyre!("Session {} vanished after creation", id))?;
    let mut assistant = session.lock().await;

    match format {
        OutputFormat::Text => {
            let sink = ConsoleSink::new(verbose);
            assistant.execute(style, request, Some(&sink)).await;
        }
        OutputFormat::Json => {
            let sink = ChannelSink::default();
            let mut rx = sink.subscribe();
            let printer = tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => {
                            println!("{}", event.to_wire_json());
                            if event.kind == EventKind::Completed {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "cmd_run: event printer lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            assistant.execute(style, request, Some(&sink)).await;
            drop(sink);
            printer.await.context("Event printer failed")?;
        }
    }

    drop(assistant);
    registry.destroy(&id).await;
    Ok(())
}

/// Print the capability catalog
async fn cmd_plugins(config: &Config) -> Result<()> {
    debug!("cmd_plugins: called");
    config.validate()?;

    // Listing capabilities never needs the schema catalog
    let mut config = config.clone();
    config.analytics.load_schema = false;

    let assistant = Assistant::from_config(&config).await?;
    println!("{}", serde_json::to_string_pretty(assistant.catalog())?);
    Ok(())
}

/// Build (or load) the schema catalog and report it
async fn cmd_schema(config: &Config, refresh: bool) -> Result<()> {
    debug!(refresh, "cmd_schema: called");
    config.validate()?;

    let prompts = PromptLoader::new(config.assistant.prompts_dir.as_deref());
    let completions = completion_provider(config, &prompts)?;
    let backend = analytics_backend(config).context("Analytics backend is not configured")?;

    let cache = config.analytics.schema_cache.as_deref();
    let catalog = SchemaBuilder::new(backend.as_ref(), completions.as_ref(), &prompts, &config.analytics)
        .load_or_build(cache, refresh)
        .await?;

    println!("Schema catalog: {} tables", catalog.len());
    for table in catalog.table_names() {
        println!("  {}", table);
    }
    match cache {
        Some(path) => println!("Cache: {}", path.display()),
        None => println!("Cache: disabled (set analytics.schema-cache to keep it)"),
    }
    Ok(())
}
