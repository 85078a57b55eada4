//! Heuristic "is this buffer complete enough to auto-run" check.
//!
//! Only the debounced auto-run path consults this; manual runs always go
//! through. The checks run in order and the first failure wins:
//! 1. empty after trimming
//! 2. dangling construct at the end of the buffer
//! 3. unbalanced brackets or an unterminated literal/comment
//! 4. last line looks like a token still being typed

use crate::lexer::{SourceMask, Unterminated};
use regex::Regex;
use std::sync::LazyLock;

/// Outcome of a readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Empty,
    /// Trailing construct that still needs a body or operand.
    Dangling(&'static str),
    Unbalanced,
    UnterminatedLiteral(Unterminated),
    /// Last line looks like an identifier mid-typing.
    PartialToken,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        self == Readiness::Ready
    }
}

static DANGLING: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("control-header", r"\b(if|for|while)\s*\(.*\)\s*$"),
        ("else", r"\belse\s*$"),
        ("function-header", r"\bfunction\b[^{};]*\)\s*$"),
        (
            "declaration-header",
            r"\b(interface|class)\s+[\w$]+(\s+(extends|implements)\s+[\w$.,<>\s]+)?\s*$",
        ),
        ("type-alias", r"\btype\s+[\w$]+(\s*<[^>]*>)?\s*=?\s*$"),
        ("assignment", r"[^=!<>]=\s*$"),
        ("call-open", r"\(\s*$"),
        ("property-access", r"\.\s*$"),
        ("colon", r":\s*$"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("dangling pattern")))
    .collect()
});

static PARTIAL_TOKEN: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // bare identifier
        r"^\s*[A-Za-z_$][\w$]*\s*$",
        // identifier (or dotted path) followed by an opener with nothing after
        r"^\s*[A-Za-z_$][\w$.]*\s*[.(\[{:]\s*$",
        // chained call being typed on its own line
        r"^\s*\.[A-Za-z_$]?[\w$]*\s*$",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("partial token pattern"))
    .collect()
});

/// True when `source` passes every readiness rule.
pub fn is_ready(source: &str) -> bool {
    check(source).is_ready()
}

/// Run the readiness rules and report the first one that fails.
pub fn check(source: &str) -> Readiness {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Readiness::Empty;
    }

    let mask = SourceMask::new(trimmed);
    let code = mask.strip_comments(trimmed);
    let code_tail = code.trim_end();
    if code_tail.is_empty() {
        // Nothing but comments.
        return Readiness::Empty;
    }

    if mask.unterminated().is_none() {
        if let Some(name) = dangling_shape(code_tail) {
            return Readiness::Dangling(name);
        }
    }

    if let Some(kind) = mask.unterminated() {
        return Readiness::UnterminatedLiteral(kind);
    }
    if !brackets_balanced(trimmed, &mask) {
        return Readiness::Unbalanced;
    }

    let last_line = code_tail.lines().last().unwrap_or_default();
    if PARTIAL_TOKEN.iter().any(|re| re.is_match(last_line)) {
        return Readiness::PartialToken;
    }

    Readiness::Ready
}

fn dangling_shape(code: &str) -> Option<&'static str> {
    DANGLING
        .iter()
        .find(|(_, re)| re.is_match(code))
        .map(|(name, _)| *name)
}

/// Stack-based bracket matching over code bytes only.
fn brackets_balanced(source: &str, mask: &SourceMask) -> bool {
    let mut stack = Vec::new();
    for (i, b) in source.bytes().enumerate() {
        if !mask.is_code(i) {
            continue;
        }
        match b {
            b'(' | b'[' | b'{' => stack.push(b),
            b')' | b']' | b'}' => {
                let expected = match b {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };
                if stack.pop() != Some(expected) {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}
