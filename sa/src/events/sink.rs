//! Event sinks - where orchestration progress goes
//!
//! The pipeline only sees `&dyn EventSink`. Each transport supplies its own:
//! the REPL prints to the console, socket-style consumers subscribe to a
//! broadcast channel, tests record everything.

use std::sync::Mutex;

use colored::Colorize;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::{Event, EventKind};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Transport-agnostic receiver of orchestration events
///
/// `emit` is synchronous; the pipeline waits for it to return before moving on.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Convenience handle over an optional sink
///
/// A missing sink turns every call into a no-op.
#[derive(Clone, Copy, Default)]
pub struct Emitter<'a> {
    sink: Option<&'a dyn EventSink>,
}

impl<'a> Emitter<'a> {
    pub fn new(sink: Option<&'a dyn EventSink>) -> Self {
        Self { sink }
    }

    /// An emitter that drops everything
    pub fn silent() -> Self {
        Self { sink: None }
    }

    /// Emit a raw event
    pub fn emit(&self, kind: EventKind, message: impl Into<String>) {
        if let Some(sink) = self.sink {
            sink.emit(Event::new(kind, message));
        }
    }

    // === Convenience methods ===

    pub fn system(&self, message: impl Into<String>) {
        self.emit(EventKind::System, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(EventKind::Error, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(EventKind::Debug, message);
    }

    pub fn result(&self, message: impl Into<String>) {
        self.emit(EventKind::Result, message);
    }

    pub fn completed(&self, message: impl Into<String>) {
        self.emit(EventKind::Completed, message);
    }
}

/// Prints events to the terminal
pub struct ConsoleSink {
    show_debug: bool,
}

impl ConsoleSink {
    pub fn new(show_debug: bool) -> Self {
        Self { show_debug }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: Event) {
        match event.kind {
            EventKind::System => println!("{} {}", "[Info]".bright_green(), event.message),
            EventKind::Error => println!("{} {}", "[Error]".red(), event.message),
            EventKind::Debug if self.show_debug => println!("{} {}", "[Debug]".magenta(), event.message.dimmed()),
            EventKind::Debug => {}
            EventKind::Result => println!("{}\n{}", "[Response]".cyan(), event.message),
            EventKind::Completed => {}
        }
    }
}

/// Fans events out over a tokio broadcast channel
///
/// Fire-and-forget: with no subscribers the event is dropped, and a full
/// channel drops the oldest events for lagging receivers.
pub struct ChannelSink {
    tx: broadcast::Sender<Event>,
}

impl ChannelSink {
    /// Create a new channel sink with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "ChannelSink::new: creating channel");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        debug!("ChannelSink::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        debug!(kind = ?event.kind, "ChannelSink::emit");
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far, oldest first
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Messages of one kind, oldest first
    pub fn messages(&self, kind: EventKind) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.message)
            .collect()
    }

    /// Number of events of one kind
    pub fn count(&self, kind: EventKind) -> usize {
        self.messages(kind).len()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
