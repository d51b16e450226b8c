//! Signal sink, the host page's global command queue
//!
//! The queue is an array on the host page that the tag manager drains. The
//! command function (`gtag`-style) pushes its arguments onto the same array;
//! a page may not define it, in which case only plain objects are pushed.

use consentgate_core::QueueEntry;
use serde_json::Value;

/// Destination for consent commands and structured events.
pub trait SignalSink {
    /// Whether a command function is defined on the page.
    fn has_command_fn(&self) -> bool;

    /// Define the command function if the page has none.
    fn install_command_fn(&mut self);

    /// Append to the queue, creating it if absent.
    fn push(&mut self, entry: QueueEntry);

    /// Call the command function. Returns false (and pushes nothing) when the
    /// page has none.
    fn command(&mut self, args: Vec<Value>) -> bool {
        if !self.has_command_fn() {
            return false;
        }
        self.push(QueueEntry::Command(args));
        true
    }
}

/// In-memory command queue.
#[derive(Clone, Debug, Default)]
pub struct DataLayer {
    entries: Option<Vec<QueueEntry>>,
    command_fn: bool,
}

impl DataLayer {
    /// A page with neither queue nor command function.
    pub fn new() -> Self {
        Self::default()
    }

    /// A page whose own snippet already defined the command function.
    pub fn with_command_fn() -> Self {
        Self {
            entries: Some(Vec::new()),
            command_fn: true,
        }
    }

    /// Whether the queue has been created.
    pub fn exists(&self) -> bool {
        self.entries.is_some()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        self.entries.as_deref().unwrap_or(&[])
    }

    /// Number of event objects with the given name.
    pub fn count_events(&self, name: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.event_name() == Some(name))
            .count()
    }

    /// Position of the first matching command tuple.
    pub fn position_of_command(&self, name: &str, sub: Option<&str>) -> Option<usize> {
        self.entries().iter().position(|e| e.is_command(name, sub))
    }
}

impl SignalSink for DataLayer {
    fn has_command_fn(&self) -> bool {
        self.command_fn
    }

    fn install_command_fn(&mut self) {
        self.entries.get_or_insert_with(Vec::new);
        self.command_fn = true;
    }

    fn push(&mut self, entry: QueueEntry) {
        self.entries.get_or_insert_with(Vec::new).push(entry);
    }
}
