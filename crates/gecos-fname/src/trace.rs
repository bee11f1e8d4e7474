//! Diagnostic observers for allocation and formatting.
//!
//! The formatter reports what it is doing through a [`FormatObserver`]
//! instead of printing, so the core stays testable. The `Display` impl of
//! [`TraceEvent`] reproduces the historical diagnostic lines.

use std::fmt;

use serde::Serialize;
use tracing::{debug, error};

/// Message emitted when the allocator returns no memory.
pub const OUT_OF_MEMORY: &str = "Out of memory!!";

/// A single diagnostic from the allocator or the formatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Allocation of `requested` bytes returned null.
    AllocFailed { requested: usize },
    /// About to copy the login at the cursor. `buf_len` is the length of
    /// whatever string already sits at the cursor.
    Substitute { buf_len: usize, login_len: usize },
    /// A literal byte was copied; `offset` is the cursor after the copy.
    Literal { offset: usize },
    /// Formatting finished with `written` bytes before the NUL.
    Finished { capacity: usize, written: usize },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::AllocFailed { .. } => f.write_str(OUT_OF_MEMORY),
            TraceEvent::Substitute { buf_len, login_len } => write!(
                f,
                "strcpy(bp,login): strlen(bp) = {buf_len} strlen(login) = {login_len}"
            ),
            TraceEvent::Literal { offset } => write!(f, "bp-buf = {offset}"),
            TraceEvent::Finished { capacity, written } => write!(
                f,
                "buf can store at most {capacity} bytes; strlen(buf) = {written}"
            ),
        }
    }
}

/// Receives diagnostics from [`crate::alloc`] and [`crate::format`].
pub trait FormatObserver {
    fn event(&mut self, event: TraceEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FormatObserver for NoopObserver {
    fn event(&mut self, _event: TraceEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FormatObserver for TracingObserver {
    fn event(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::AllocFailed { requested } => error!(requested, "{event}"),
            _ => debug!("{event}"),
        }
    }
}

/// Keeps every event in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<TraceEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded events rendered as diagnostic lines.
    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(ToString::to_string).collect()
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl FormatObserver for RecordingObserver {
    fn event(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

/// Records events and also forwards them to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TeeObserver {
    pub recorder: RecordingObserver,
}

impl FormatObserver for TeeObserver {
    fn event(&mut self, event: TraceEvent) {
        TracingObserver.event(event.clone());
        self.recorder.event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_diagnostic_lines() {
        assert_eq!(
            TraceEvent::AllocFailed { requested: 1 }.to_string(),
            "Out of memory!!"
        );
        assert_eq!(TraceEvent::Literal { offset: 3 }.to_string(), "bp-buf = 3");
        assert_eq!(
            TraceEvent::Finished {
                capacity: 5,
                written: 8
            }
            .to_string(),
            "buf can store at most 5 bytes; strlen(buf) = 8"
        );
        assert_eq!(
            TraceEvent::Substitute {
                buf_len: 0,
                login_len: 2
            }
            .to_string(),
            "strcpy(bp,login): strlen(bp) = 0 strlen(login) = 2"
        );
    }

    #[test]
    fn recording_keeps_order() {
        let mut obs = RecordingObserver::new();
        obs.event(TraceEvent::Literal { offset: 1 });
        obs.event(TraceEvent::Literal { offset: 2 });
        assert_eq!(obs.lines(), vec!["bp-buf = 1", "bp-buf = 2"]);
    }

    #[test]
    fn tee_records_as_well() {
        let mut obs = TeeObserver::default();
        obs.event(TraceEvent::AllocFailed { requested: 1 });
        assert_eq!(obs.recorder.events.len(), 1);
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_value(TraceEvent::Literal { offset: 4 }).unwrap();
        assert_eq!(json["event"], "literal");
        assert_eq!(json["offset"], 4);
    }
}
