//! Output events delivered to the presentation layer.

use crate::error::RunOutcome;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of an output event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputKind {
    Log,
    Error,
    Warn,
    Info,
    /// Value returned by the snippet.
    Result,
    /// Run refused or stopped by policy.
    SecurityError,
    /// Snippet fault rewritten into user guidance.
    FriendlyError,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputPayload {
    Args(Vec<Value>),
    Message(String),
}

/// One console call, result, or error, in the order it happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub kind: OutputKind,
    pub payload: OutputPayload,
    pub at: DateTime<Utc>,
}

impl OutputEvent {
    pub fn console(kind: OutputKind, args: Vec<Value>) -> Self {
        Self {
            kind,
            payload: OutputPayload::Args(args),
            at: Utc::now(),
        }
    }

    pub fn result(value: Value) -> Self {
        Self::console(OutputKind::Result, vec![value])
    }

    pub fn security_error(message: impl Into<String>) -> Self {
        Self::message(OutputKind::SecurityError, message)
    }

    pub fn friendly_error(message: impl Into<String>) -> Self {
        Self::message(OutputKind::FriendlyError, message)
    }

    fn message(kind: OutputKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            payload: OutputPayload::Message(message.into()),
            at: Utc::now(),
        }
    }

    /// Arguments for console/result events; empty for message events.
    pub fn args(&self) -> &[Value] {
        match &self.payload {
            OutputPayload::Args(args) => args,
            OutputPayload::Message(_) => &[],
        }
    }

    /// Single-line rendering: arguments joined by spaces, strings unquoted.
    pub fn text(&self) -> String {
        match &self.payload {
            OutputPayload::Message(message) => message.clone(),
            OutputPayload::Args(args) => args
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Receiver of a run's events.
///
/// Events for one run arrive in call order, followed by exactly one
/// `finish`. Cancelled runs deliver nothing.
pub trait OutputSink {
    fn deliver(&mut self, session: &SessionId, event: OutputEvent);

    fn finish(&mut self, session: &SessionId, outcome: &RunOutcome);
}

/// Sink that records everything, for the CLI and tests.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    pub events: Vec<(SessionId, OutputEvent)>,
    pub finished: Vec<(SessionId, RunOutcome)>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events delivered for `session`, in order.
    pub fn for_session<'a>(&'a self, session: &'a SessionId) -> impl Iterator<Item = &'a OutputEvent> {
        self.events
            .iter()
            .filter(move |(id, _)| id == session)
            .map(|(_, event)| event)
    }

    pub fn kinds(&self) -> Vec<OutputKind> {
        self.events.iter().map(|(_, e)| e.kind).collect()
    }
}

impl OutputSink for EventLog {
    fn deliver(&mut self, session: &SessionId, event: OutputEvent) {
        self.events.push((session.clone(), event));
    }

    fn finish(&mut self, session: &SessionId, outcome: &RunOutcome) {
        self.finished.push((session.clone(), outcome.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_rendering() {
        let event = OutputEvent::console(OutputKind::Log, vec![json!("a"), json!(1), json!({"k": true})]);
        assert_eq!(event.text(), r#"a 1 {"k":true}"#);
        assert_eq!(OutputEvent::friendly_error("oops").text(), "oops");
    }

    #[test]
    fn test_serialized_shape() {
        let event = OutputEvent::security_error("blocked");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "securityError");
        assert_eq!(value["payload"], "blocked");
    }
}
