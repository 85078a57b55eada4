//! tsx-playground
//!
//! Admission and sandboxed execution of JavaScript/TypeScript snippets for
//! an interactive playground. A snippet is screened against a deny-list,
//! transpiled when it uses TypeScript syntax, rewritten so every loop passes
//! an iteration counter, and then run in a fresh QuickJS context whose only
//! host bindings are a mock `console` and a cancellation `signal`.
//!
//! ```no_run
//! use std::time::Instant;
//! use tsx_playground::{EngineConfig, EventLog, Playground, RunTrigger};
//!
//! let mut playground = Playground::new(EngineConfig::default());
//! let tab = playground.open_session("tab-1");
//! let mut log = EventLog::new();
//! playground.request_run(
//!     &tab,
//!     "let x: number = 41; console.log(x + 1);",
//!     RunTrigger::Manual,
//!     Instant::now(),
//!     &mut log,
//! );
//! ```

pub mod cancel;
pub mod config;
pub mod dialect;
pub mod error;
pub mod events;
mod js_modules;
pub mod lexer;
pub mod loop_guard;
mod monitor;
pub mod normalizer;
pub mod playground;
pub mod readiness;
pub mod sandbox;
pub mod scanner;
pub mod session;
pub mod transpiler;

pub use cancel::{ActiveToken, CancellationToken};
pub use config::{EngineConfig, TranspileFailurePolicy};
pub use error::{AbortReason, ConfigError, RunOutcome, SandboxError, TranspileError};
pub use events::{EventLog, OutputEvent, OutputKind, OutputPayload, OutputSink};
pub use playground::{DueRun, ExecutionRequest, Playground, RunDisposition, RunTrigger};
pub use readiness::Readiness;
pub use scanner::SafetyVerdict;
pub use session::{SessionId, SessionRunState};
