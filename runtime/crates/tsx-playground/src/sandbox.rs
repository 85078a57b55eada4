//! Execution sandbox.
//!
//! Every run gets a fresh QuickJS runtime and context, so nothing a snippet
//! defines survives into the next run. The snippet is compiled as the body
//! of `function (console, signal)` and those two parameters are the only
//! host bindings it can reach.
//!
//! Three watchdogs stop a run: the wall-clock deadline and the output budget
//! are polled from the engine's interrupt handler, and the loop guard throws
//! a `LoopGuardError` from inside the script. Cancellation goes through the
//! same interrupt handler.

use crate::cancel::CancellationToken;
use crate::config::ExecutionConfig;
use crate::error::{AbortReason, RunOutcome, SandboxError};
use crate::events::OutputEvent;
use crate::js_modules::{self, to_json, Capabilities};
use crate::loop_guard::LOOP_GUARD_ERROR;
use crate::monitor::RunMonitor;
use crate::normalizer::{self, Fault};
use rquickjs::context::EvalOptions;
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Function, Runtime, Value};
use serde_json::Value as Json;
use std::time::Instant;

/// Lifecycle of one run inside the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Compiling,
    Running,
    Completed,
    TimedOut,
    Aborted,
    Faulted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::TimedOut | RunState::Aborted | RunState::Faulted
        )
    }
}

/// What one call to [`Sandbox::execute`] produced.
#[derive(Debug, Clone)]
pub struct Execution {
    pub state: RunState,
    pub outcome: RunOutcome,
    /// Console output in call order, followed by the result or error event.
    /// Empty for cancelled runs.
    pub events: Vec<OutputEvent>,
}

/// Runs guarded JavaScript under the configured limits.
#[derive(Debug, Clone)]
pub struct Sandbox {
    config: ExecutionConfig,
}

impl Sandbox {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Execute a guarded program (see [`crate::loop_guard::guard`]).
    ///
    /// Snippet failures are reported through [`Execution::outcome`]; `Err`
    /// means the engine itself could not be set up.
    pub fn execute(
        &self,
        guarded: &str,
        token: &CancellationToken,
    ) -> Result<Execution, SandboxError> {
        let monitor = RunMonitor::new(token.clone(), self.config.max_output_lines);
        let mut state = RunState::Idle;

        let runtime = Runtime::new().map_err(SandboxError::Runtime)?;
        if let Some(bytes) = self.config.memory_limit_bytes {
            runtime.set_memory_limit(bytes);
        }
        let context = Context::full(&runtime).map_err(SandboxError::Context)?;

        let timeout = self.config.timeout();
        let deadline = Instant::now() + timeout;
        let watchdog = monitor.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || {
            if watchdog.should_interrupt() {
                return true;
            }
            if Instant::now() >= deadline {
                watchdog.trip(AbortReason::Timeout(timeout));
                return true;
            }
            false
        })));

        transition(&mut state, RunState::Compiling, token);
        let evaluated = context.with(|ctx| -> Result<_, SandboxError> {
            let caps = js_modules::capabilities(&ctx, &monitor).map_err(SandboxError::Bindings)?;
            Ok(run_unit(&ctx, guarded, caps, &monitor, &mut state, token))
        })?;

        let (next, outcome, terminal_event) = classify(evaluated, &monitor, &self.config);
        transition(&mut state, next, token);

        let events = if matches!(outcome, RunOutcome::Cancelled) {
            Vec::new()
        } else {
            let mut events = monitor.take_events();
            events.extend(terminal_event);
            events
        };

        Ok(Execution {
            state,
            outcome,
            events,
        })
    }
}

fn transition(state: &mut RunState, next: RunState, token: &CancellationToken) {
    tracing::debug!(
        generation = token.generation(),
        from = ?*state,
        to = ?next,
        "run state"
    );
    *state = next;
}

/// Wrap the guarded program as a function taking the capability objects.
fn wrap(guarded: &str) -> String {
    format!("(function (console, signal) {{\n{}\n}})", guarded)
}

/// Compile, call, and settle one snippet. `Ok(None)` means it returned
/// nothing.
fn run_unit<'js>(
    ctx: &Ctx<'js>,
    guarded: &str,
    caps: Capabilities<'js>,
    monitor: &RunMonitor,
    state: &mut RunState,
    token: &CancellationToken,
) -> Result<Option<Json>, Fault> {
    let mut options = EvalOptions::default();
    options.strict = false;
    let unit: Function = ctx
        .eval_with_options(wrap(guarded), options)
        .catch(ctx)
        .map_err(|err| fault_from(ctx, err))?;

    transition(state, RunState::Running, token);
    let value: Value = unit
        .call((caps.console, caps.signal))
        .catch(ctx)
        .map_err(|err| fault_from(ctx, err))?;

    // Settle promise callbacks the snippet queued before returning.
    while ctx.execute_pending_job() {
        if monitor.should_interrupt() {
            break;
        }
    }

    if let Some(promise) = value.as_promise() {
        return match promise.result::<Value>() {
            Some(settled) => settled
                .catch(ctx)
                .map(|v| (!v.is_undefined()).then(|| to_json(ctx, &v)))
                .map_err(|err| fault_from(ctx, err)),
            None => Ok(None),
        };
    }

    Ok((!value.is_undefined()).then(|| to_json(ctx, &value)))
}

fn fault_from<'js>(ctx: &Ctx<'js>, err: CaughtError<'js>) -> Fault {
    match err {
        CaughtError::Exception(exception) => {
            let name = exception
                .as_object()
                .get::<_, String>("name")
                .ok()
                .filter(|n| !n.is_empty());
            Fault::new(name, exception.message().unwrap_or_default())
        }
        CaughtError::Value(value) => {
            let message = match to_json(ctx, &value) {
                Json::String(s) => s,
                other => other.to_string(),
            };
            Fault::new(None, message)
        }
        CaughtError::Error(error) => Fault::new(None, error.to_string()),
    }
}

/// Decide the terminal state. Cancellation beats every other signal, then
/// watchdog trips, then the loop guard, then the snippet's own fault.
fn classify(
    evaluated: Result<Option<Json>, Fault>,
    monitor: &RunMonitor,
    config: &ExecutionConfig,
) -> (RunState, RunOutcome, Option<OutputEvent>) {
    if monitor.token().is_cancelled() {
        tracing::debug!("run cancelled; discarding output");
        return (RunState::Aborted, RunOutcome::Cancelled, None);
    }

    if let Some(reason) = monitor.abort_reason() {
        tracing::warn!(?reason, "run stopped by watchdog");
        let state = match reason {
            AbortReason::Timeout(_) => RunState::TimedOut,
            _ => RunState::Aborted,
        };
        return (
            state,
            RunOutcome::PolicyAborted { reason },
            Some(normalizer::policy_event(&reason)),
        );
    }

    match evaluated {
        Ok(value) => (
            RunState::Completed,
            RunOutcome::Completed,
            value.map(OutputEvent::result),
        ),
        Err(fault) if fault.name.as_deref() == Some(LOOP_GUARD_ERROR) => {
            let reason = AbortReason::LoopLimit(config.max_loop_iterations);
            tracing::warn!(?reason, "loop guard tripped");
            (
                RunState::TimedOut,
                RunOutcome::PolicyAborted { reason },
                Some(normalizer::policy_event(&reason)),
            )
        }
        Err(fault) => {
            let friendly = normalizer::classify(&fault);
            tracing::debug!(name = ?fault.name, message = %fault.message, "snippet fault");
            (
                RunState::Faulted,
                RunOutcome::RuntimeFault {
                    message: friendly.to_string(),
                },
                Some(normalizer::fault_event(&fault)),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::OutputKind;
    use crate::loop_guard::guard;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> ExecutionConfig {
        ExecutionConfig::default()
    }

    fn run(js: &str, config: ExecutionConfig) -> Execution {
        let guarded = guard(js, config.max_loop_iterations);
        Sandbox::new(config)
            .execute(&guarded, &CancellationToken::new(1))
            .unwrap()
    }

    #[test]
    fn test_console_output_in_order() {
        let exec = run("console.log('a'); console.warn('b', 2);", config());
        assert_eq!(exec.state, RunState::Completed);
        assert_eq!(exec.outcome, RunOutcome::Completed);
        assert_eq!(exec.events.len(), 2);
        assert_eq!(exec.events[0].args(), &[json!("a")]);
        assert_eq!(exec.events[1].kind, OutputKind::Warn);
        assert_eq!(exec.events[1].args(), &[json!("b"), json!(2)]);
    }

    #[test]
    fn test_return_value_becomes_result_event() {
        let exec = run("const xs = [1, 2, 3]; return xs.map(x => x * 2);", config());
        assert_eq!(exec.events.len(), 1);
        assert_eq!(exec.events[0].kind, OutputKind::Result);
        assert_eq!(exec.events[0].args(), &[json!([2, 4, 6])]);
    }

    #[test]
    fn test_no_return_means_no_result() {
        let exec = run("const x = 1 + 1;", config());
        assert_eq!(exec.outcome, RunOutcome::Completed);
        assert!(exec.events.is_empty());
    }

    #[test]
    fn test_loop_limit_aborts() {
        let mut cfg = config();
        cfg.max_loop_iterations = 5;
        let exec = run("let i = 0; while (i < 10) { i++; }", cfg);
        assert_eq!(
            exec.outcome,
            RunOutcome::PolicyAborted {
                reason: AbortReason::LoopLimit(5)
            }
        );
        let last = exec.events.last().unwrap();
        assert_eq!(last.kind, OutputKind::SecurityError);
        assert!(last.text().contains("infinite loop"));
    }

    #[test]
    fn test_loop_within_limit_completes() {
        let mut cfg = config();
        cfg.max_loop_iterations = 10;
        let exec = run("let n = 0; for (let i = 0; i < 10; i++) { n++; } return n;", cfg);
        assert_eq!(exec.outcome, RunOutcome::Completed);
        assert_eq!(exec.events[0].args(), &[json!(10)]);
    }

    #[test]
    fn test_loop_budget_boundary() {
        let limited = || {
            let mut cfg = config();
            cfg.max_loop_iterations = 4;
            cfg
        };
        let exact = run("let n = 0; while (n < 4) { n++; } return n;", limited());
        assert_eq!(exact.outcome, RunOutcome::Completed);
        assert_eq!(exact.events[0].args(), &[json!(4)]);

        let over = run("let n = 0; while (n < 5) { n++; } return n;", limited());
        assert_eq!(
            over.outcome,
            RunOutcome::PolicyAborted {
                reason: AbortReason::LoopLimit(4)
            }
        );
    }

    #[test]
    fn test_loop_in_template_substitution_aborts() {
        let mut cfg = config();
        cfg.max_loop_iterations = 5;
        let exec = run(
            "let i = 0; const s = `${(() => { while (i < 100) { i++ } return i })()}`; return s;",
            cfg,
        );
        assert_eq!(
            exec.outcome,
            RunOutcome::PolicyAborted {
                reason: AbortReason::LoopLimit(5)
            }
        );
    }

    #[test]
    fn test_caught_loop_guard_still_aborts() {
        let mut cfg = config();
        cfg.max_loop_iterations = 3;
        let exec = run(
            "try { let i = 0; while (i < 100) { i++; } } catch (e) {} return 'escaped';",
            cfg,
        );
        assert!(matches!(
            exec.outcome,
            RunOutcome::PolicyAborted {
                reason: AbortReason::LoopLimit(3)
            }
        ));
    }

    #[test]
    fn test_timeout_stops_long_loop() {
        let cfg = ExecutionConfig {
            timeout_ms: 100,
            max_loop_iterations: u64::MAX / 2,
            ..config()
        };
        let exec = run("let i = 0; while (i >= 0) { i++; }", cfg);
        assert_eq!(exec.state, RunState::TimedOut);
        assert_eq!(
            exec.outcome,
            RunOutcome::PolicyAborted {
                reason: AbortReason::Timeout(Duration::from_millis(100))
            }
        );
        assert_eq!(exec.events.len(), 1);
        assert!(exec.events[0].text().contains("timed out after 100ms"));
    }

    #[test]
    fn test_output_budget_aborts() {
        let mut cfg = config();
        cfg.max_output_lines = 3;
        let exec = run(
            "for (let i = 0; i < 10; i++) { console.log(i); }",
            cfg,
        );
        assert_eq!(
            exec.outcome,
            RunOutcome::PolicyAborted {
                reason: AbortReason::OutputBudget(3)
            }
        );
        let logs = exec
            .events
            .iter()
            .filter(|e| e.kind == OutputKind::Log)
            .count();
        assert_eq!(logs, 3);
        assert_eq!(exec.events.last().unwrap().kind, OutputKind::SecurityError);
    }

    #[test]
    fn test_undefined_identifier_is_friendly() {
        let exec = run("console.log('before'); return missingName + 1;", config());
        assert_eq!(exec.state, RunState::Faulted);
        assert_eq!(exec.events[0].args(), &[json!("before")]);
        let last = exec.events.last().unwrap();
        assert_eq!(last.kind, OutputKind::FriendlyError);
        assert!(last.text().contains("`missingName`"), "Got: {}", last.text());
    }

    #[test]
    fn test_syntax_error_is_runtime_fault() {
        let exec = run("let = ;", config());
        match exec.outcome {
            RunOutcome::RuntimeFault { message } => assert!(message.starts_with("Syntax error")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_before_start_delivers_nothing() {
        let token = CancellationToken::new(1);
        token.cancel();
        let guarded = guard("console.log('never');", 100);
        let exec = Sandbox::new(config()).execute(&guarded, &token).unwrap();
        assert_eq!(exec.outcome, RunOutcome::Cancelled);
        assert!(exec.events.is_empty());
    }

    #[test]
    fn test_runs_are_isolated() {
        let first = run("globalThis.leak = 1; return typeof leak;", config());
        assert_eq!(first.events[0].args(), &[json!("number")]);
        let second = run("return typeof leak;", config());
        assert_eq!(second.events[0].args(), &[json!("undefined")]);
    }

    #[test]
    fn test_promise_jobs_are_drained() {
        let exec = run(
            "Promise.resolve(7).then(v => console.log('then', v)); console.log('sync');",
            config(),
        );
        let texts: Vec<String> = exec.events.iter().map(|e| e.text()).collect();
        assert_eq!(texts, vec!["sync".to_string(), "then 7".to_string()]);
    }
}
