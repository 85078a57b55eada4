//! TypeScript to JavaScript transpilation using SWC.
//!
//! Fixed, non-strict configuration: latest ECMAScript target, no module
//! transform, comments preserved, no source maps or declarations. Snippets
//! are function bodies (they may `return` at top level and run in sloppy
//! mode), so the source is parsed as the body of a wrapper function in a
//! script and only that body is emitted. The output is cleaned of a leading
//! `"use strict"` prologue and blank lines so it can be spliced into the
//! loop-guard wrapper.

use crate::error::TranspileError;
use swc_common::{
    comments::SingleThreadedComments, sync::Lrc, FileName, Mark, SourceMap, Spanned, GLOBALS,
};
use swc_ecma_ast::{Decl, EsVersion, FnDecl, Pass, Program, Script, Stmt};
use swc_ecma_codegen::{text_writer::JsWriter, Config, Emitter};
use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax, TsSyntax};
use swc_ecma_transforms_base::resolver;
use swc_ecma_transforms_typescript::strip;

const WRAPPER_OPEN: &str = "function __snippet() {\n";
const WRAPPER_CLOSE: &str = "\n}";

/// Transpile TypeScript code to JavaScript.
///
/// A parse or emit failure is returned as an error; this function never
/// falls back to the input on its own.
pub fn transpile(ts_code: &str) -> Result<String, TranspileError> {
    // SWC requires GLOBALS to be set
    let js = GLOBALS.set(&Default::default(), || transpile_inner(ts_code))?;
    let js = strip_prologue(&js).to_string();
    tracing::debug!(input = ts_code.len(), output = js.len(), "transpiled");
    Ok(js)
}

fn transpile_inner(ts_code: &str) -> Result<String, TranspileError> {
    let cm: Lrc<SourceMap> = Default::default();
    let comments = SingleThreadedComments::default();

    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom("snippet.ts".into())),
        format!("{}{}{}", WRAPPER_OPEN, ts_code, WRAPPER_CLOSE),
    );
    let body_start = fm.start_pos.0 + WRAPPER_OPEN.len() as u32;

    let syntax = Syntax::Typescript(TsSyntax {
        tsx: false,
        decorators: true,
        ..Default::default()
    });

    let lexer = Lexer::new(
        syntax,
        EsVersion::EsNext,
        StringInput::from(&*fm),
        Some(&comments),
    );
    let mut parser = Parser::new_from(lexer);

    let script = parser
        .parse_script()
        .map_err(|e| parse_error(ts_code, body_start, e))?;

    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(parse_error(ts_code, body_start, err));
    }

    let unresolved_mark = Mark::new();
    let top_level_mark = Mark::new();
    let mut program = Program::Script(script);

    resolver(unresolved_mark, top_level_mark, true).process(&mut program);
    strip(unresolved_mark, top_level_mark).process(&mut program);

    let script = match program {
        Program::Script(s) => unwrap_snippet(s)?,
        _ => return Err(TranspileError::Emit("expected script".to_string())),
    };

    let mut buf = vec![];
    {
        let mut emitter = Emitter {
            cfg: Config::default().with_target(EsVersion::EsNext),
            cm: cm.clone(),
            comments: Some(&comments),
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };

        emitter
            .emit_script(&script)
            .map_err(|e| TranspileError::Emit(format!("{:?}", e)))?;
    }

    String::from_utf8(buf).map_err(|e| TranspileError::Emit(format!("UTF-8 error: {}", e)))
}

/// Replace the wrapper function with its body statements.
fn unwrap_snippet(script: Script) -> Result<Script, TranspileError> {
    let span = script.span;
    let mut body = script.body.into_iter();
    match (body.next(), body.next()) {
        (Some(Stmt::Decl(Decl::Fn(FnDecl { function, .. }))), None) => {
            let function = *function;
            Ok(Script {
                span,
                body: function.body.map(|block| block.stmts).unwrap_or_default(),
                shebang: None,
            })
        }
        _ => Err(TranspileError::Emit(
            "snippet closes more braces than it opens".to_string(),
        )),
    }
}

/// Drop leading blank lines and a `"use strict"` directive.
fn strip_prologue(js: &str) -> &str {
    let is_blank = |c: char| c == '\n' || c == '\r' || c == ' ' || c == '\t';
    let rest = js.trim_start_matches(is_blank);
    let rest = ["\"use strict\";", "'use strict';", "\"use strict\"", "'use strict'"]
        .iter()
        .find_map(|prologue| rest.strip_prefix(prologue))
        .unwrap_or(rest);
    rest.trim_start_matches(is_blank)
}

// ============================================================================
// ERROR FORMATTING
// ============================================================================

/// Locate a parse error in the snippet and attach swc's description.
///
/// `body_start` is the position of the snippet's first byte inside the
/// wrapped file; errors reported in the wrapper are clamped to the snippet.
fn parse_error(source: &str, body_start: u32, err: swc_ecma_parser::error::Error) -> TranspileError {
    let lo = (err.span().lo.0.saturating_sub(body_start) as usize).min(source.len());

    let mut line_num = 1;
    let mut line_start = 0;
    for (i, c) in source.char_indices() {
        if i >= lo {
            break;
        }
        if c == '\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }

    let snippet = source
        .get(line_start..)
        .and_then(|rest| rest.lines().next())
        .unwrap_or_default()
        .to_string();
    let column = source
        .get(line_start..lo)
        .map(|prefix| prefix.chars().count())
        .unwrap_or_default();

    TranspileError::Parse {
        line: line_num,
        column,
        snippet,
        message: err.kind().msg().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_transpile() {
        let js = transpile("let x: number = 41; console.log(x+1);").unwrap();
        assert!(js.contains("let x = 41"), "Got: {}", js);
        assert!(!js.contains(": number"), "Got: {}", js);
    }

    #[test]
    fn test_arrow_function() {
        let ts = "const greet = (name: string): string => `Hello, ${name}`;";
        let js = transpile(ts).unwrap();
        assert!(!js.contains(": string"), "Got: {}", js);
    }

    #[test]
    fn test_interface_is_erased() {
        let js = transpile("interface P { x: number }\nconst p: P = { x: 1 };").unwrap();
        assert!(!js.contains("interface"), "Got: {}", js);
        assert!(js.contains("const p = {"), "Got: {}", js);
    }

    #[test]
    fn test_comments_are_preserved() {
        let js = transpile("// keep me\nconst a: number = 1;").unwrap();
        assert!(js.contains("keep me"), "Got: {}", js);
    }

    #[test]
    fn test_no_module_wrapping() {
        let js = transpile("const x: number = 1;").unwrap();
        assert!(!js.contains("exports"), "Got: {}", js);
        assert!(!js.contains("define("), "Got: {}", js);
    }

    #[test]
    fn test_parse_error_shows_context() {
        let err = transpile("const x: number = (;").unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("line 1"), "Expected line info: {}", rendered);
        assert!(rendered.contains("const x"), "Expected code context: {}", rendered);
        assert!(matches!(err, TranspileError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_parse_error_lines_are_snippet_relative() {
        let err = transpile("let a: number = 1;\nlet b: string = ;\n").unwrap_err();
        match err {
            TranspileError::Parse {
                line,
                snippet,
                message,
                ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(snippet, "let b: string = ;");
                assert!(!message.is_empty());
                assert_ne!(message, "Syntax error");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_top_level_return_is_kept() {
        let js = transpile("const x: number = 41;\nreturn x + 1;").unwrap();
        assert!(js.contains("return x + 1"), "Got: {}", js);
        assert!(!js.contains("__snippet"), "Got: {}", js);
    }

    #[test]
    fn test_plain_javascript_passes_through() {
        // `as expected` reads like a type assertion but this is plain JS.
        let js = transpile("const msg = 'works as expected'; return msg;").unwrap();
        assert!(js.contains("'works as expected'") || js.contains("\"works as expected\""), "Got: {}", js);
        assert!(js.contains("return msg"), "Got: {}", js);
    }

    #[test]
    fn test_extra_closing_brace_is_rejected() {
        assert!(transpile("let a: number = 1; }").is_err());
    }

    #[test]
    fn test_strip_prologue() {
        assert_eq!(strip_prologue("\n\n\"use strict\";\nfoo();"), "foo();");
        assert_eq!(strip_prologue("'use strict'\n\nbar();"), "bar();");
        assert_eq!(strip_prologue("\nbaz();"), "baz();");
    }
}
