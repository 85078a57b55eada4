//! Static deny-list scan over the human-authored source.
//!
//! A coarse lexical filter: the patterns also match inside strings and
//! comments, so a snippet that merely mentions `fetch` in a comment is
//! rejected. The order of [`DENY_LIST`] is the order of evaluation and the
//! first hit wins.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::sync::LazyLock;

/// Result of scanning one snippet. Computed per request, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SafetyVerdict {
    Allowed,
    Denied { pattern: &'static str },
}

impl SafetyVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, SafetyVerdict::Allowed)
    }

    /// Message shown to the user when the snippet is refused.
    pub fn message(&self) -> Option<String> {
        match self {
            SafetyVerdict::Allowed => None,
            SafetyVerdict::Denied { pattern } => Some(format!(
                "Security: code blocked ({}). {}",
                pattern,
                denial_hint(pattern)
            )),
        }
    }
}

/// Name and case-insensitive pattern of every deny-listed capability.
pub const DENY_LIST: &[(&str, &str)] = &[
    ("infinite-while", r"\bwhile\s*\(\s*true\s*\)"),
    ("infinite-for", r"\bfor\s*\(\s*;\s*;\s*\)"),
    ("timers", r"\bset(interval|timeout)\b"),
    ("network", r"\bfetch\b|\bxmlhttprequest\b"),
    ("storage", r"\b(localstorage|sessionstorage)\b"),
    ("host-globals", r"\b(document|window|global)\s*\.|\bglobalthis\b"),
    // `Function` stays case-sensitive so ordinary `function (` expressions pass.
    ("dynamic-code", r"\beval\s*\(|(?-i:\bFunction)\s*\("),
    ("module-loading", r"\bimport\s|\bimport\s*\(|\brequire\s*\("),
];

static COMPILED: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    DENY_LIST
        .iter()
        .map(|(name, pattern)| {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("deny-list pattern");
            (*name, re)
        })
        .collect()
});

/// Check `source` against the deny list.
pub fn scan(source: &str) -> SafetyVerdict {
    match COMPILED.iter().find(|(_, re)| re.is_match(source)) {
        Some((pattern, _)) => SafetyVerdict::Denied { pattern: *pattern },
        None => SafetyVerdict::Allowed,
    }
}

fn denial_hint(pattern: &str) -> &'static str {
    match pattern {
        "infinite-while" | "infinite-for" => "Loops without an exit condition are not allowed.",
        "timers" => "setTimeout and setInterval are not available in the playground.",
        "network" => "Network access is not available in the playground.",
        "storage" => "Persistent storage is not available in the playground.",
        "host-globals" => "Host objects like window and document are not available.",
        "dynamic-code" => "eval and the Function constructor are not allowed.",
        "module-loading" => "import and require are not available in the playground.",
        _ => "This API is not allowed.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn denied(src: &str) -> Option<&'static str> {
        match scan(src) {
            SafetyVerdict::Denied { pattern } => Some(pattern),
            SafetyVerdict::Allowed => None,
        }
    }

    #[test]
    fn test_allowed_code() {
        assert_eq!(scan("let x = 1; console.log(x + 1);"), SafetyVerdict::Allowed);
        assert!(scan("const f = function (a) { return a * 2 }; f(2)").is_allowed());
        assert!(scan("const f = function(a) { return a }").is_allowed());
        assert!(scan("let i = 0; while (i < 10) { i++ }").is_allowed());
        assert!(scan("const fetched = prefetchData;").is_allowed());
    }

    #[test]
    fn test_each_group_is_denied() {
        let cases = [
            ("while(true){}", "infinite-while"),
            ("while ( TRUE ) {}", "infinite-while"),
            ("for(;;){}", "infinite-for"),
            ("for ( ; ; ) {}", "infinite-for"),
            ("setTimeout(() => 1, 10)", "timers"),
            ("const id = SETINTERVAL;", "timers"),
            ("fetch('x')", "network"),
            ("new XMLHttpRequest()", "network"),
            ("localStorage.getItem('a')", "storage"),
            ("sessionStorage.clear()", "storage"),
            ("document.body", "host-globals"),
            ("window.alert(1)", "host-globals"),
            ("global.process", "host-globals"),
            ("globalThis.x = 1", "host-globals"),
            ("eval('1+1')", "dynamic-code"),
            ("new Function('return 1')", "dynamic-code"),
            ("import fs from 'fs'", "module-loading"),
            ("import('fs')", "module-loading"),
            ("const fs = require('fs')", "module-loading"),
        ];
        for (src, pattern) in cases {
            assert_eq!(denied(src), Some(pattern), "source: {}", src);
        }
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(denied("for(;;){ fetch('x') }"), Some("infinite-for"));
        assert_eq!(denied("fetch(localStorage.x)"), Some("network"));
    }

    #[test]
    fn test_comments_and_strings_still_match() {
        assert_eq!(denied("// don't fetch here\nlet a = 1;"), Some("network"));
        assert_eq!(denied("console.log('window.open')"), Some("host-globals"));
    }

    #[test]
    fn test_denial_message_names_pattern() {
        let msg = scan("setInterval(f, 1)").message().unwrap();
        assert!(msg.contains("timers"), "Got: {}", msg);
        assert!(scan("1 + 1").message().is_none());
    }

    proptest! {
        #[test]
        fn prop_deny_listed_token_anywhere_is_denied(
            prefix in "[a-z0-9 ;=+]{0,20}",
            token in prop::sample::select(vec!["fetch('x')", "while(true){}", "eval(s)", "require('a')"]),
            suffix in "[a-z0-9 ;=+]{0,20}",
        ) {
            let src = format!("{} {} {}", prefix, token, suffix);
            prop_assert!(!scan(&src).is_allowed());
        }
    }
}
