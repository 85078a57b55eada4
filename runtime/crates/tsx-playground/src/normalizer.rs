//! Turns raw faults into user-facing messages.
//!
//! Runtime faults are classified by substring match on the engine's error
//! message, first match wins. Policy stops get their own wording so the
//! user can tell "the playground stopped this" from "the snippet threw".

use crate::error::{AbortReason, TranspileError};
use crate::events::OutputEvent;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static UNDEFINED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'?([A-Za-z_$][\w$]*)'? is not defined").expect("undefined-name pattern")
});

static UNINITIALIZED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'?([A-Za-z_$][\w$]*)'? is not initialized|(?i:cannot access) '([^']+)' before initialization")
        .expect("uninitialized-name pattern")
});

/// A thrown error as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Constructor name, e.g. `TypeError`.
    pub name: Option<String>,
    pub message: String,
}

impl Fault {
    pub fn new(name: Option<String>, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
        }
    }
}

/// User-facing category of a runtime fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendlyError {
    Syntax { detail: String },
    UndefinedIdentifier { name: Option<String> },
    NullPropertyAccess { detail: String },
    UseBeforeDeclaration { name: Option<String> },
    Other { message: String },
}

impl fmt::Display for FriendlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FriendlyError::Syntax { detail } => write!(
                f,
                "Syntax error: {}. Check for missing brackets, parentheses, quotes or commas.",
                detail
            ),
            FriendlyError::UndefinedIdentifier { name: Some(name) } => write!(
                f,
                "ReferenceError: `{}` is not defined. Declare it with let, const or var before using it.",
                name
            ),
            FriendlyError::UndefinedIdentifier { name: None } => {
                write!(f, "ReferenceError: a variable is used but never declared.")
            }
            FriendlyError::NullPropertyAccess { detail } => write!(
                f,
                "TypeError: {}. A value is null or undefined; check it exists before reading its properties.",
                detail
            ),
            FriendlyError::UseBeforeDeclaration { name: Some(name) } => write!(
                f,
                "ReferenceError: `{}` is used before its declaration. Move the declaration above its first use.",
                name
            ),
            FriendlyError::UseBeforeDeclaration { name: None } => write!(
                f,
                "ReferenceError: a variable is used before its declaration."
            ),
            FriendlyError::Other { message } => write!(f, "Error: {}", message),
        }
    }
}

/// Classify a runtime fault.
pub fn classify(fault: &Fault) -> FriendlyError {
    let message = fault.message.trim();
    let lower = message.to_lowercase();

    if fault.name.as_deref() == Some("SyntaxError")
        || lower.contains("unexpected token")
        || lower.contains("expecting")
        || lower.contains("unexpected end of input")
    {
        return FriendlyError::Syntax {
            detail: message.to_string(),
        };
    }

    if lower.contains("is not defined") {
        let name = UNDEFINED_NAME
            .captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        return FriendlyError::UndefinedIdentifier { name };
    }

    if lower.contains("cannot read propert")
        || lower.contains("cannot set propert")
        || lower.contains("of undefined")
        || lower.contains("of null")
    {
        return FriendlyError::NullPropertyAccess {
            detail: message.to_string(),
        };
    }

    if lower.contains("before initialization") || lower.contains("is not initialized") {
        let name = UNINITIALIZED_NAME
            .captures(message)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string());
        return FriendlyError::UseBeforeDeclaration { name };
    }

    FriendlyError::Other {
        message: message.to_string(),
    }
}

/// Event for a snippet fault.
pub fn fault_event(fault: &Fault) -> OutputEvent {
    OutputEvent::friendly_error(classify(fault).to_string())
}

/// Wording for a run stopped by a watchdog or the loop guard.
pub fn policy_message(reason: &AbortReason) -> String {
    match reason {
        AbortReason::Timeout(limit) => format!(
            "Security: execution timed out after {}ms. Check for long-running loops or deep recursion.",
            limit.as_millis()
        ),
        AbortReason::OutputBudget(lines) => format!(
            "Security: output limit of {} lines exceeded. Execution stopped.",
            lines
        ),
        AbortReason::LoopLimit(iterations) => format!(
            "Security: infinite loop detected (more than {} iterations). Execution stopped.",
            iterations
        ),
    }
}

pub fn policy_event(reason: &AbortReason) -> OutputEvent {
    OutputEvent::security_error(policy_message(reason))
}

/// Wording for a TypeScript compile failure.
pub fn compile_message(err: &TranspileError) -> String {
    format!("TypeScript compile error: {}", err)
}
