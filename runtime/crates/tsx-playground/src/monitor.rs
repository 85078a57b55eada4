//! Shared state between a running snippet, its console shim and the
//! engine's interrupt handler.

use crate::cancel::CancellationToken;
use crate::error::AbortReason;
use crate::events::{OutputEvent, OutputKind};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What happened to a console call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Recorded,
    /// The run is cancelled or already stopped; the call is discarded.
    Dropped,
    /// This call crossed the output budget; the run is now aborted.
    BudgetExceeded,
}

/// Per-run buffer and watchdog flags.
#[derive(Clone, Debug)]
pub struct RunMonitor {
    events: Arc<Mutex<Vec<OutputEvent>>>,
    lines: Arc<AtomicUsize>,
    max_lines: usize,
    abort: Arc<Mutex<Option<AbortReason>>>,
    token: CancellationToken,
}

impl RunMonitor {
    pub fn new(token: CancellationToken, max_lines: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            lines: Arc::new(AtomicUsize::new(0)),
            max_lines,
            abort: Arc::new(Mutex::new(None)),
            token,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// False once the run is cancelled or stopped by policy.
    pub fn is_accepting(&self) -> bool {
        !self.should_interrupt()
    }

    /// Polled by the engine's interrupt handler.
    pub fn should_interrupt(&self) -> bool {
        self.token.is_cancelled() || self.abort_reason().is_some()
    }

    /// Record the first policy stop; later reasons are ignored.
    pub fn trip(&self, reason: AbortReason) {
        if let Ok(mut abort) = self.abort.lock() {
            abort.get_or_insert(reason);
        }
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort.lock().ok().and_then(|a| *a)
    }

    /// Admit one console call against the output budget.
    pub fn record(&self, kind: OutputKind, args: Vec<Value>) -> Admission {
        if !self.is_accepting() {
            return Admission::Dropped;
        }
        let line = self.lines.fetch_add(1, Ordering::SeqCst) + 1;
        if line > self.max_lines {
            self.trip(AbortReason::OutputBudget(self.max_lines));
            return Admission::BudgetExceeded;
        }
        self.push(OutputEvent::console(kind, args));
        Admission::Recorded
    }

    fn push(&self, event: OutputEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    pub fn take_events(&self) -> Vec<OutputEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}
