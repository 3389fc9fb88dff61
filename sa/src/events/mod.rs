//! Event stream for live orchestration progress
//!
//! Every orchestration run narrates what it does through an [`EventSink`]:
//! plan size, one line per task, generated queries, token counters, formatted
//! results, errors, and a final completion marker. The pipeline never knows
//! who is listening.
//!
//! # Architecture
//!
//! ```text
//!   Planner      Pipeline      Plugins
//!      │            │             │
//!      └────────────┼─────────────┘
//!                   ↓
//!            Emitter (Option<&dyn EventSink>)
//!                   ↓
//!      ┌────────────┼─────────────┐
//!      ↓            ↓             ↓
//! ConsoleSink   ChannelSink   RecordingSink
//!  (REPL)      (JSON lines,    (tests)
//!               sockets)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use secassist::events::{ChannelSink, Emitter};
//!
//! let sink = ChannelSink::default();
//! let mut rx = sink.subscribe();
//!
//! let emitter = Emitter::new(Some(&sink));
//! emitter.system("Prompt decomposed in 1 tasks");
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{}: {}", event.kind.channel_name(), event.wire_message());
//! }
//! ```

mod sink;
mod types;

pub use sink::{ChannelSink, ConsoleSink, DEFAULT_CHANNEL_CAPACITY, Emitter, EventSink, RecordingSink};
pub use types::{Event, EventKind};
