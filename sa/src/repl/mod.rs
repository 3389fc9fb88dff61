//! Interactive REPL for SecAssist
//!
//! Reads requests line by line, runs each through the assistant, and prints
//! progress and formatted results as they are emitted.

mod session;

pub use session::ReplSession;

use eyre::Result;

use crate::assistant::{Assistant, SessionRegistry};
use crate::config::Config;

/// Run the interactive REPL
///
/// This is the entry point for `sa` and `sa repl`.
pub async fn run_interactive(config: &Config, show_debug: bool) -> Result<()> {
    config.validate()?;

    let registry = SessionRegistry::new(Assistant::from_config(config).await?);
    let mut session = ReplSession::open(registry, show_debug).await?;
    session.run().await
}
