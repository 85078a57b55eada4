//! TypeScript dialect detection.
//!
//! A false positive only costs an extra transpile pass, which is harmless
//! for plain JavaScript, so the patterns lean towards matching.

use regex::Regex;
use std::sync::LazyLock;

static TS_MARKERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("interface", r"\binterface\s+[A-Za-z_$][\w$]*"),
        ("type-alias", r"\btype\s+[A-Za-z_$][\w$]*\s*(<[^>]*>)?\s*="),
        (
            "type-annotation",
            r":\s*(string|number|boolean|any|void|never|unknown|object|bigint|symbol|null|undefined)\b",
        ),
        (
            "generic",
            r"[\w$]\s*<\s*[A-Za-z_$][\w$]*(\s*(,|extends)\s*[A-Za-z_$][\w$]*)*(\[\])?\s*>",
        ),
        ("as-assertion", r"\bas\s+[A-Za-z_$][\w$]*"),
        ("enum", r"\benum\s+[A-Za-z_$]"),
        (
            "access-modifier",
            r"\b(public|private|protected|readonly)\s+[A-Za-z_$]",
        ),
        ("heritage", r"\b(implements|extends)\s+[A-Za-z_$]"),
        ("abstract-class", r"\babstract\s+class\b"),
        ("declare", r"\bdeclare\s+[A-Za-z_$]"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("typescript marker")))
    .collect()
});

/// True when `source` contains any TypeScript-only marker.
pub fn is_typescript(source: &str) -> bool {
    matched_marker(source).is_some()
}

/// Name of the first TypeScript marker found in `source`.
pub fn matched_marker(source: &str) -> Option<&'static str> {
    TS_MARKERS
        .iter()
        .find(|(_, re)| re.is_match(source))
        .map(|(name, _)| *name)
}
