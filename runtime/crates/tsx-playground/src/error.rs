//! Error taxonomy and run outcomes.
//!
//! User-facing results never travel as `Err`: every run ends in a
//! [`RunOutcome`]. The `Error` types here cover transpilation, engine setup
//! and configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TypeScript could not be turned into JavaScript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranspileError {
    #[error("Parse error at line {line}:\n  {snippet}\n  {caret}^\n{message}", caret = caret(.column))]
    Parse {
        line: usize,
        column: usize,
        snippet: String,
        message: String,
    },
    #[error("Emit error: {0}")]
    Emit(String),
}

fn caret(column: &usize) -> String {
    " ".repeat(*column)
}

/// The JavaScript engine itself could not be set up.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to create runtime: {0}")]
    Runtime(#[source] rquickjs::Error),
    #[error("failed to create context: {0}")]
    Context(#[source] rquickjs::Error),
    #[error("failed to install bindings: {0}")]
    Bindings(#[source] rquickjs::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Why a run was stopped by policy rather than by the snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    Timeout(Duration),
    OutputBudget(usize),
    LoopLimit(u64),
}

/// Terminal state of one run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// The static scanner matched a deny-listed pattern; nothing ran.
    PolicyDenied { pattern: String },
    /// Transpilation failed; nothing ran.
    CompileFailure { message: String },
    /// A watchdog or the loop guard stopped the run.
    PolicyAborted { reason: AbortReason },
    /// The snippet threw.
    RuntimeFault { message: String },
    /// Superseded by a newer run or an explicit cancel. Never shown to users.
    Cancelled,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    /// Everything except cancellation is surfaced to the user.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, RunOutcome::Cancelled)
    }
}
