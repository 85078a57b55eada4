//! Run orchestration for editor sessions.
//!
//! [`Playground`] is the surface an editor talks to: it accepts run and
//! cancel requests per session, debounces auto-runs, pushes each request
//! through scan, transpile, guard and sandbox, and delivers the resulting
//! events to an [`OutputSink`].

use crate::cancel::ActiveToken;
use crate::config::{EngineConfig, TranspileFailurePolicy};
use crate::dialect;
use crate::error::RunOutcome;
use crate::events::{OutputEvent, OutputSink};
use crate::loop_guard;
use crate::normalizer;
use crate::readiness::{self, Readiness};
use crate::sandbox::Sandbox;
use crate::scanner::{self, SafetyVerdict};
use crate::session::{SessionId, SessionRunState, SessionTable};
use crate::transpiler;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// What asked for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    /// Explicit user action. Bypasses readiness and debounce.
    Manual,
    /// Edit in the buffer. Debounced, then gated on readiness.
    Auto,
}

/// One run attempt for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub session_id: SessionId,
    pub source_text: String,
    pub requested_at: DateTime<Utc>,
}

impl ExecutionRequest {
    pub fn new(session_id: SessionId, source_text: impl Into<String>) -> Self {
        Self {
            session_id,
            source_text: source_text.into(),
            requested_at: Utc::now(),
        }
    }
}

/// Immediate answer to [`Playground::request_run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunDisposition {
    /// The run happened synchronously.
    Executed(RunOutcome),
    /// An auto-run was queued behind the debounce delay.
    Scheduled { due: Instant },
    /// Auto-run is disabled.
    Ignored,
}

/// Result of one debounced run firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueRun {
    Executed(RunOutcome),
    /// The buffer was not complete enough; nothing ran.
    NotReady(Readiness),
}

/// Engine entry point, one per host.
pub struct Playground {
    config: EngineConfig,
    sandbox: Sandbox,
    sessions: SessionTable,
}

impl Playground {
    pub fn new(config: EngineConfig) -> Self {
        let sandbox = Sandbox::new(config.execution.clone());
        Self {
            config,
            sandbox,
            sessions: SessionTable::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn open_session(&mut self, id: impl Into<SessionId>) -> SessionId {
        let id = id.into();
        tracing::info!(session = %id, "session opened");
        self.sessions.open(id.clone());
        id
    }

    /// Tear down a session: the pending run is dropped and the live token
    /// cancelled. Returns false for an unknown session.
    pub fn close_session(&mut self, id: &SessionId) -> bool {
        let closed = self.sessions.close(id);
        if closed {
            tracing::info!(session = %id, "session closed");
        }
        closed
    }

    /// Run trigger from the editor. Unknown sessions are opened on demand.
    pub fn request_run(
        &mut self,
        id: &SessionId,
        source: &str,
        trigger: RunTrigger,
        now: Instant,
        sink: &mut dyn OutputSink,
    ) -> RunDisposition {
        match trigger {
            RunTrigger::Manual => {
                self.sessions.open(id.clone()).clear_pending();
                let request = ExecutionRequest::new(id.clone(), source);
                RunDisposition::Executed(self.execute(request, sink))
            }
            RunTrigger::Auto if !self.config.auto_run.enabled => {
                tracing::debug!(session = %id, "auto-run disabled; ignoring edit");
                RunDisposition::Ignored
            }
            RunTrigger::Auto => {
                let due = now + self.config.auto_run.debounce();
                self.sessions.open(id.clone()).schedule(source.to_string(), due);
                tracing::debug!(session = %id, "auto-run scheduled");
                RunDisposition::Scheduled { due }
            }
        }
    }

    /// Cancel trigger. Safe to call with no active run.
    pub fn cancel(&mut self, id: &SessionId) -> bool {
        let cancelled = self
            .sessions
            .get_mut(id)
            .is_some_and(SessionRunState::cancel);
        if cancelled {
            tracing::debug!(session = %id, "run cancelled");
        }
        cancelled
    }

    /// Shared handle on the session's live token, for cancelling a running
    /// snippet from another thread.
    pub fn cancel_handle(&self, id: &SessionId) -> Option<ActiveToken> {
        self.sessions.get(id).map(|state| state.active().clone())
    }

    /// Fire every debounced run whose delay has elapsed, checking readiness
    /// against the buffer as it is now.
    pub fn poll_due(&mut self, now: Instant, sink: &mut dyn OutputSink) -> Vec<(SessionId, DueRun)> {
        let mut due: Vec<(SessionId, String)> = self
            .sessions
            .iter_mut()
            .filter_map(|(id, state)| state.take_due(now).map(|run| (id.clone(), run.source)))
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0));

        due.into_iter()
            .map(|(id, source)| {
                let verdict = readiness::check(&source);
                tracing::debug!(session = %id, ?verdict, "readiness");
                let result = if verdict.is_ready() {
                    let request = ExecutionRequest::new(id.clone(), source);
                    DueRun::Executed(self.execute(request, sink))
                } else {
                    DueRun::NotReady(verdict)
                };
                (id, result)
            })
            .collect()
    }

    /// Earliest pending debounce deadline across sessions.
    pub fn next_due(&self) -> Option<Instant> {
        self.sessions
            .iter()
            .filter_map(|(_, state)| state.pending().map(|p| p.due))
            .min()
    }

    pub fn session(&self, id: &SessionId) -> Option<&SessionRunState> {
        self.sessions.get(id)
    }

    fn execute(&mut self, request: ExecutionRequest, sink: &mut dyn OutputSink) -> RunOutcome {
        let state = self.sessions.open(request.session_id.clone());
        let token = state.begin_run(&request.source_text);
        let active = state.active().clone();
        let id = request.session_id;
        tracing::debug!(session = %id, generation = token.generation(), "run started");

        let (outcome, events) = self.admit_and_run(&request.source_text, &token);

        if !active.is_current(&token) {
            tracing::debug!(session = %id, generation = token.generation(), "superseded run discarded");
            return RunOutcome::Cancelled;
        }

        let delivered = events.len();
        for event in events {
            sink.deliver(&id, event);
        }
        sink.finish(&id, &outcome);
        active.release(&token);
        if let Some(state) = self.sessions.get_mut(&id) {
            state.record_delivered(delivered);
        }
        outcome
    }

    /// Scan, transpile, guard and execute one source text.
    fn admit_and_run(
        &self,
        source: &str,
        token: &crate::cancel::CancellationToken,
    ) -> (RunOutcome, Vec<OutputEvent>) {
        let verdict = scanner::scan(source);
        tracing::debug!(?verdict, "scan");
        if let SafetyVerdict::Denied { pattern } = verdict {
            tracing::warn!(pattern, "snippet denied");
            let message = verdict.message().unwrap_or_default();
            return (
                RunOutcome::PolicyDenied {
                    pattern: pattern.to_string(),
                },
                vec![OutputEvent::security_error(message)],
            );
        }

        let js = match dialect::matched_marker(source) {
            None => source.to_string(),
            Some(marker) => {
                tracing::debug!(marker, "typescript detected");
                match transpiler::transpile(source) {
                    Ok(js) => js,
                    Err(err) => match self.config.transpile.on_failure {
                        TranspileFailurePolicy::Report => {
                            let message = normalizer::compile_message(&err);
                            return (
                                RunOutcome::CompileFailure {
                                    message: message.clone(),
                                },
                                vec![OutputEvent::friendly_error(message)],
                            );
                        }
                        TranspileFailurePolicy::Fallback => {
                            tracing::warn!(error = %err, "transpile failed; running original source");
                            source.to_string()
                        }
                    },
                }
            }
        };

        let guarded = loop_guard::guard(&js, self.config.execution.max_loop_iterations);
        match self.sandbox.execute(&guarded, token) {
            Ok(execution) => (execution.outcome, execution.events),
            Err(err) => {
                tracing::warn!(error = %err, "sandbox setup failed");
                let message = err.to_string();
                (
                    RunOutcome::RuntimeFault {
                        message: message.clone(),
                    },
                    vec![OutputEvent::friendly_error(format!("Error: {}", message))],
                )
            }
        }
    }
}
