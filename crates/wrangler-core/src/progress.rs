//! Line-oriented progress reporting for a host application.
//!
//! Every event is one line on the sink. Two shapes are parseable by a host:
//! a bare integer followed by `%`, and free-form status text. Anything else
//! a host sees must be treated as informational.

use std::io::Write;
use std::sync::Mutex;

/// A single progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Overall completion, 0-100.
    Percent(u8),
    /// Human-readable status text.
    Status(String),
}

impl ProgressEvent {
    /// Render the event as its protocol line (without trailing newline).
    pub fn to_line(&self) -> String {
        match self {
            ProgressEvent::Percent(p) => format!("{}%", p.min(&100)),
            ProgressEvent::Status(text) => text.clone(),
        }
    }

    /// Parse a protocol line. Lines that are not `N%` become status text.
    pub fn parse_line(line: &str) -> Self {
        line.strip_suffix('%')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|p| *p <= 100)
            .map(ProgressEvent::Percent)
            .unwrap_or_else(|| ProgressEvent::Status(line.to_string()))
    }
}

/// Destination for progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    fn percent(&self, value: u8) {
        self.emit(ProgressEvent::Percent(value));
    }

    fn status(&self, text: &str) {
        self.emit(ProgressEvent::Status(text.to_string()));
    }
}

/// Writes each event to stdout and flushes immediately.
#[derive(Debug, Default)]
pub struct StdoutProgress;

impl ProgressSink for StdoutProgress {
    fn emit(&self, event: ProgressEvent) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        // A closed stdout means the host went away; nothing useful to do.
        let _ = writeln!(handle, "{}", event.to_line());
        let _ = handle.flush();
    }
}

/// Keeps every event in memory. Used by embedding hosts and tests.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("progress lock poisoned").clone()
    }

    /// Recorded events rendered as protocol lines.
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ProgressEvent::to_line).collect()
    }

    /// Recorded percentages, in order.
    pub fn percents(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Percent(p) => Some(p),
                ProgressEvent::Status(_) => None,
            })
            .collect()
    }

    /// Whether any status line contains `needle`.
    pub fn has_status_containing(&self, needle: &str) -> bool {
        self.events().iter().any(|e| match e {
            ProgressEvent::Status(text) => text.contains(needle),
            ProgressEvent::Percent(_) => false,
        })
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .expect("progress lock poisoned")
            .push(event);
    }
}
