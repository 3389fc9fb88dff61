//! REPL session management

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;
use uuid::Uuid;

use crate::assistant::{SessionHandle, SessionRegistry};
use crate::events::ConsoleSink;
use crate::formatter::OutputStyle;
use crate::llm::Role;
use crate::text::truncate;

/// Characters of each turn shown by `/history`
const HISTORY_PREVIEW: usize = 50;

/// Interactive REPL session
///
/// Owns one session of the registry for as long as the loop runs.
pub struct ReplSession {
    registry: SessionRegistry,
    id: Uuid,
    session: SessionHandle,
    sink: ConsoleSink,
}

impl ReplSession {
    /// Open a fresh session in `registry`
    pub async fn open(registry: SessionRegistry, show_debug: bool) -> Result<Self> {
        let id = registry.create().await;
        let session = registry
            .get(&id)
            .await
            .ok_or_else(|| eyre::eyre!("Session {} vanished after creation", id))?;
        Ok(Self {
            registry,
            id,
            session,
            sink: ConsoleSink::new(show_debug),
        })
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome().await;

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match self.handle_command(input).await {
                        Some(SlashResult::Continue) => continue,
                        Some(SlashResult::Quit) => break,
                        None => self.process_user_input(input).await,
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        self.registry.destroy(&self.id).await;
        println!("Goodbye!");
        Ok(())
    }

    async fn print_welcome(&self) {
        let plugins = self.session.lock().await.catalog().snapshot().keys().cloned().collect::<Vec<_>>();
        println!();
        println!("{}", "SecAssist Interactive Session".bright_cyan().bold());
        println!("Plugins: {}", plugins.join(", "));
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    /// Handle REPL commands; `None` means the input is a request
    async fn handle_command(&mut self, input: &str) -> Option<SlashResult> {
        if input.eq_ignore_ascii_case("bye") {
            return Some(SlashResult::Quit);
        }
        if !input.starts_with('/') {
            return None;
        }

        let cmd = input.split_whitespace().next().unwrap_or("");
        debug!(%cmd, "ReplSession::handle_command: called");
        let result = match cmd {
            "/help" | "/h" => {
                self.print_help().await;
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/clear" | "/c" => {
                self.registry.clear(&self.id).await;
                println!("{}", "Session Cleared".dimmed());
                SlashResult::Continue
            }
            "/history" => {
                self.print_history().await;
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        };
        Some(result)
    }

    async fn print_help(&self) {
        let plugin_help = self.session.lock().await.plugin_help();
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the session (also: bye)", "/quit".yellow());
        println!("  {:14} Clear the session context", "/clear".yellow());
        println!("  {:14} Show the session context", "/history".yellow());
        println!();
        println!("{}", "Available Plugins:".bright_cyan());
        for (name, help) in plugin_help {
            println!("  {:20} {}", name.yellow(), help);
        }
        println!();
    }

    async fn print_history(&self) {
        let session = self.session.lock().await;
        let turns = session.context().turns();
        if turns.is_empty() {
            println!("{}", "No session history.".dimmed());
            return;
        }

        println!();
        println!("{}", "Session History:".bright_cyan());
        for (i, turn) in turns.iter().enumerate() {
            let role = match turn.role {
                Role::User => "User".bright_green(),
                Role::Assistant => "Assistant".bright_blue(),
                Role::System => "System".dimmed(),
            };
            println!("  {}. {}: {}", i + 1, role, truncate(&turn.content, HISTORY_PREVIEW));
        }
        println!();
    }

    /// Run one request; results and errors reach the console through the sink
    async fn process_user_input(&mut self, input: &str) {
        let results = self
            .session
            .lock()
            .await
            .execute(OutputStyle::Terminal, input, Some(&self.sink))
            .await;
        debug!(results = results.len(), "ReplSession::process_user_input: done");
        println!();
    }
}

/// Result of handling a slash command
#[derive(Debug, PartialEq, Eq)]
enum SlashResult {
    Continue,
    Quit,
}
