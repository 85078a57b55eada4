//! Byte-level source mask.
//!
//! Marks which bytes of a snippet are code and which sit inside a string,
//! template literal or comment. The readiness heuristics and the loop-guard
//! rewriter only ever look at code bytes, so a `for(` inside a string or a
//! `)` inside a comment never confuses them.
//!
//! This is a lexical approximation: regular-expression literals are treated
//! as code. The text of a template literal is non-code, but the inside of a
//! `${...}` substitution is code again, with its own strings and templates.

/// What a byte belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Code,
    String,
    Template,
    LineComment,
    BlockComment,
}

/// A literal or comment still open at end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unterminated {
    String,
    Template,
    BlockComment,
}

#[derive(Debug, Clone)]
pub struct SourceMask {
    regions: Vec<Region>,
    unterminated: Option<Unterminated>,
}

impl SourceMask {
    /// Scan `source` once and classify every byte.
    pub fn new(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut regions = vec![Region::Code; bytes.len()];
        let mut state = Region::Code;
        let mut quote = b'"';
        let mut broken_string = false;
        // Open `${` substitutions, each with its count of unclosed `{`.
        let mut substitutions: Vec<usize> = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];
            let next = bytes.get(i + 1).copied();
            match state {
                Region::Code => match b {
                    b'/' if next == Some(b'/') => {
                        state = Region::LineComment;
                        regions[i] = state;
                    }
                    b'/' if next == Some(b'*') => {
                        state = Region::BlockComment;
                        regions[i] = state;
                        regions[i + 1] = state;
                        i += 1;
                    }
                    b'\'' | b'"' => {
                        state = Region::String;
                        quote = b;
                        regions[i] = state;
                    }
                    b'`' => {
                        state = Region::Template;
                        regions[i] = state;
                    }
                    b'{' => {
                        if let Some(depth) = substitutions.last_mut() {
                            *depth += 1;
                        }
                    }
                    b'}' => match substitutions.last_mut() {
                        Some(0) => {
                            substitutions.pop();
                            state = Region::Template;
                            regions[i] = state;
                        }
                        Some(depth) => *depth -= 1,
                        None => {}
                    },
                    _ => {}
                },
                Region::String | Region::Template => {
                    regions[i] = state;
                    let closer = if state == Region::Template { b'`' } else { quote };
                    if b == b'\\' {
                        if i + 1 < bytes.len() {
                            regions[i + 1] = state;
                        }
                        i += 1;
                    } else if b == closer {
                        state = Region::Code;
                    } else if state == Region::Template && b == b'$' && next == Some(b'{') {
                        regions[i + 1] = state;
                        substitutions.push(0);
                        state = Region::Code;
                        i += 1;
                    } else if b == b'\n' && state == Region::String {
                        // An unescaped newline ends a broken string literal.
                        broken_string = true;
                        state = Region::Code;
                    }
                }
                Region::LineComment => {
                    if b == b'\n' {
                        state = Region::Code;
                    } else {
                        regions[i] = state;
                    }
                }
                Region::BlockComment => {
                    regions[i] = state;
                    if b == b'*' && next == Some(b'/') {
                        regions[i + 1] = state;
                        state = Region::Code;
                        i += 1;
                    }
                }
            }
            i += 1;
        }

        let unterminated = match state {
            Region::String => Some(Unterminated::String),
            Region::Template => Some(Unterminated::Template),
            Region::BlockComment => Some(Unterminated::BlockComment),
            Region::Code | Region::LineComment if !substitutions.is_empty() => {
                Some(Unterminated::Template)
            }
            Region::Code | Region::LineComment if broken_string => Some(Unterminated::String),
            Region::Code | Region::LineComment => None,
        };

        Self {
            regions,
            unterminated,
        }
    }

    pub fn region(&self, index: usize) -> Region {
        self.regions.get(index).copied().unwrap_or(Region::Code)
    }

    pub fn is_code(&self, index: usize) -> bool {
        self.region(index) == Region::Code
    }

    pub fn unterminated(&self) -> Option<Unterminated> {
        self.unterminated
    }

    /// Copy of `source` with comment bytes replaced by spaces.
    ///
    /// Multi-byte characters inside comments become one space per byte, so
    /// byte offsets in the result line up with `source`.
    pub fn strip_comments(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        for (i, ch) in source.char_indices() {
            match self.region(i) {
                Region::LineComment | Region::BlockComment => {
                    out.extend(std::iter::repeat(' ').take(ch.len_utf8()))
                }
                _ => out.push(ch),
            }
        }
        out
    }

    /// Index of the `)` matching the `(` at `open`, skipping non-code bytes.
    pub fn matching_paren(&self, source: &str, open: usize) -> Option<usize> {
        let bytes = source.as_bytes();
        let mut depth = 0usize;
        for (i, &b) in bytes.iter().enumerate().skip(open) {
            if !self.is_code(i) {
                continue;
            }
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// True when `b` may appear inside a JavaScript identifier.
pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}
