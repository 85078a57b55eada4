//! Per-session run state.
//!
//! A session is one editor buffer. It owns at most one live cancellation
//! token and at most one pending debounced run; both are replaced, never
//! accumulated.

use crate::cancel::{ActiveToken, CancellationToken};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

/// Opaque identifier of an editor session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A debounced run waiting for its quiet period to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRun {
    pub due: Instant,
    pub source: String,
}

#[derive(Debug, Default)]
pub struct SessionRunState {
    active: ActiveToken,
    pending: Option<PendingRun>,
    last_source: Option<String>,
    output_event_count: usize,
    next_generation: u64,
}

impl SessionRunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a new run, cancelling whatever run was live.
    pub fn begin_run(&mut self, source: &str) -> CancellationToken {
        self.next_generation += 1;
        let token = CancellationToken::new(self.next_generation);
        self.active.replace(token.clone());
        self.last_source = Some(source.to_string());
        token
    }

    /// Drop the pending run and cancel the live one.
    pub fn cancel(&mut self) -> bool {
        let had_pending = self.pending.take().is_some();
        self.active.cancel() || had_pending
    }

    /// Replace the pending run. Any earlier pending source is discarded.
    pub fn schedule(&mut self, source: String, due: Instant) {
        self.pending = Some(PendingRun { due, source });
    }

    /// Take the pending run if its quiet period has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingRun> {
        match &self.pending {
            Some(pending) if pending.due <= now => self.pending.take(),
            _ => None,
        }
    }

    pub fn clear_pending(&mut self) -> Option<PendingRun> {
        self.pending.take()
    }

    /// Cancel everything and forget the session's history.
    pub fn release(&mut self) {
        self.cancel();
        self.last_source = None;
        self.output_event_count = 0;
    }

    pub fn record_delivered(&mut self, count: usize) {
        self.output_event_count += count;
    }

    pub fn active(&self) -> &ActiveToken {
        &self.active
    }

    pub fn pending(&self) -> Option<&PendingRun> {
        self.pending.as_ref()
    }

    pub fn last_source(&self) -> Option<&str> {
        self.last_source.as_deref()
    }

    /// Events delivered to the sink over the session's lifetime.
    pub fn output_event_count(&self) -> usize {
        self.output_event_count
    }

    pub fn generation(&self) -> u64 {
        self.next_generation
    }
}

/// Open sessions by id.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, SessionRunState>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session; an already-open one is left untouched.
    pub fn open(&mut self, id: SessionId) -> &mut SessionRunState {
        self.sessions.entry(id).or_default()
    }

    /// Close a session, cancelling its live and pending runs.
    pub fn close(&mut self, id: &SessionId) -> bool {
        match self.sessions.remove(id) {
            Some(mut state) => {
                state.release();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<&SessionRunState> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut SessionRunState> {
        self.sessions.get_mut(id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&SessionId, &mut SessionRunState)> {
        self.sessions.iter_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &SessionRunState)> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_begin_run_cancels_previous() {
        let mut state = SessionRunState::new();
        let first = state.begin_run("a");
        let second = state.begin_run("b");
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(state.active().is_current(&second));
        assert!(!state.active().is_current(&first));
        assert_eq!(second.generation(), 2);
        assert_eq!(state.last_source(), Some("b"));
    }

    #[test]
    fn test_schedule_replaces_pending() {
        let mut state = SessionRunState::new();
        let now = Instant::now();
        state.schedule("one".into(), now + Duration::from_millis(500));
        state.schedule("two".into(), now + Duration::from_millis(800));
        assert_eq!(state.pending().map(|p| p.source.as_str()), Some("two"));

        assert!(state.take_due(now + Duration::from_millis(500)).is_none());
        let due = state.take_due(now + Duration::from_millis(800)).unwrap();
        assert_eq!(due.source, "two");
        assert!(state.pending().is_none());
    }

    #[test]
    fn test_cancel_clears_pending_and_live() {
        let mut state = SessionRunState::new();
        let token = state.begin_run("x");
        state.schedule("y".into(), Instant::now());
        assert!(state.cancel());
        assert!(token.is_cancelled());
        assert!(state.pending().is_none());
        assert!(!state.cancel());
    }

    #[test]
    fn test_close_releases_session() {
        let mut table = SessionTable::new();
        let id = SessionId::from("editor-1");
        let token = table.open(id.clone()).begin_run("x");
        assert_eq!(table.len(), 1);
        assert!(table.close(&id));
        assert!(token.is_cancelled());
        assert!(table.get(&id).is_none());
        assert!(!table.close(&id));
    }
}
