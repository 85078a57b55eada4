//! Loop-guard rewriter.
//!
//! Rewrites `for(` and `while(` headers so every iteration that is about to
//! run first passes through a shared counter, then wraps the program in a
//! unit that reports a dedicated `LoopGuardError` once the counter exceeds
//! its limit. The counter is bumped after the loop's own condition, so the
//! check that ends a loop is not counted.
//!
//! This is a textual transform. Loops built without a literal `for`/`while`
//! header (recursion, `Array.prototype.forEach`, generators driven by
//! library code) are not counted, and a `for...in`/`for...of` whose body is
//! not a block statement is left unguarded.

use crate::lexer::{is_ident_byte, SourceMask};

/// Name of the injected per-iteration check.
pub const GUARD_FN: &str = "__loopGuard";

/// `name` of the error thrown when the limit is exceeded.
pub const LOOP_GUARD_ERROR: &str = "LoopGuardError";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    For,
    While,
}

/// Wrap already-transpiled JavaScript with a loop counter and limit.
///
/// The result is a function body: it declares the counter, runs the
/// rewritten program inside an inner function, and returns that function's
/// value. At most `limit` loop iterations are admitted across all loops.
pub fn guard(js: &str, limit: u64) -> String {
    let body = rewrite_loop_headers(js);
    format!(
        r#"let __loopGuardCount = 0;
const __loopGuardLimit = {limit};
const __loopGuardTrip = new Error("Infinite loop detected: more than {limit} loop iterations");
__loopGuardTrip.name = "{error}";
function {guard}() {{
  if (++__loopGuardCount > __loopGuardLimit) throw __loopGuardTrip;
  return true;
}}
let __loopGuardResult;
try {{
  __loopGuardResult = (function () {{
{body}
  }}).call(undefined);
}} catch (__loopGuardCaught) {{
  if (__loopGuardCount > __loopGuardLimit) throw __loopGuardTrip;
  throw __loopGuardCaught;
}}
if (__loopGuardCount > __loopGuardLimit) throw __loopGuardTrip;
return __loopGuardResult;
"#,
        limit = limit,
        error = LOOP_GUARD_ERROR,
        guard = GUARD_FN,
        body = body,
    )
}

/// Append a `__loopGuard()` conjunct to every loop condition.
pub fn rewrite_loop_headers(js: &str) -> String {
    let mask = SourceMask::new(js);
    let bytes = js.as_bytes();
    let mut out = String::with_capacity(js.len() + 64);
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let Some((kind, kw_end)) = loop_keyword_at(bytes, &mask, i) else {
            i += 1;
            continue;
        };

        let mut open = kw_end;
        while open < bytes.len() && bytes[open].is_ascii_whitespace() {
            open += 1;
        }
        if bytes.get(open) != Some(&b'(') {
            i = kw_end;
            continue;
        }
        let Some(close) = mask.matching_paren(js, open) else {
            // Unbalanced header; nothing after this point can be rewritten safely.
            break;
        };

        out.push_str(&js[copied..open]);
        let header = &js[open + 1..close];
        copied = close + 1;
        i = close + 1;

        match kind {
            LoopKind::While => {
                out.push_str(&format!("(({}) && {}())", header.trim(), GUARD_FN));
            }
            LoopKind::For => match split_for_header(header, &mask, open + 1) {
                Some((init, cond, step)) => {
                    let cond = if cond.trim().is_empty() {
                        format!(" {}()", GUARD_FN)
                    } else {
                        format!(" ({}) && {}()", cond.trim(), GUARD_FN)
                    };
                    out.push_str(&format!("({};{};{})", init, cond, step));
                }
                None => {
                    // for...in / for...of: count at the top of a block body.
                    out.push_str(&js[open..=close]);
                    if let Some(brace) = block_start_after(bytes, &mask, close + 1) {
                        out.push_str(&js[close + 1..=brace]);
                        out.push_str(&format!(" {}();", GUARD_FN));
                        copied = brace + 1;
                        i = brace + 1;
                    }
                }
            },
        }
    }

    out.push_str(&js[copied..]);
    out
}

/// Detect a `for`/`while` keyword starting at `i`, returning its end offset.
fn loop_keyword_at(bytes: &[u8], mask: &SourceMask, i: usize) -> Option<(LoopKind, usize)> {
    if !mask.is_code(i) {
        return None;
    }
    if i > 0 && (is_ident_byte(bytes[i - 1]) || bytes[i - 1] == b'.') {
        return None;
    }
    let (kind, len) = if bytes[i..].starts_with(b"while") {
        (LoopKind::While, 5)
    } else if bytes[i..].starts_with(b"for") {
        (LoopKind::For, 3)
    } else {
        return None;
    };
    let end = i + len;
    if bytes.get(end).is_some_and(|&b| is_ident_byte(b)) {
        return None;
    }
    Some((kind, end))
}

/// Split a classic `for` header on its two top-level semicolons.
fn split_for_header<'a>(
    header: &'a str,
    mask: &SourceMask,
    offset: usize,
) -> Option<(&'a str, &'a str, &'a str)> {
    let mut depth = 0usize;
    let mut semis = Vec::with_capacity(2);
    for (i, b) in header.bytes().enumerate() {
        if !mask.is_code(offset + i) {
            continue;
        }
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b';' if depth == 0 => semis.push(i),
            _ => {}
        }
    }
    match semis.as_slice() {
        [first, second] => Some((
            &header[..*first],
            &header[first + 1..*second],
            &header[second + 1..],
        )),
        _ => None,
    }
}

/// Offset of a `{` opening the loop body, if the body is a block.
fn block_start_after(bytes: &[u8], mask: &SourceMask, from: usize) -> Option<usize> {
    let pos = from + bytes[from..].iter().position(|b| !b.is_ascii_whitespace())?;
    (bytes[pos] == b'{' && mask.is_code(pos)).then_some(pos)
}
