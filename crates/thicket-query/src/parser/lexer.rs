//! Tokenizer for pattern sources.
//!
//! Tokens hold byte spans into the source rather than text. Characters no
//! rule accepts are grouped into a single `Garbage` token per run.

use std::ops::Range;

use logos::Logos;
use rowan::{TextRange, TextSize};

use super::cst::SyntaxKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub span: TextRange,
}

fn offset(at: usize) -> TextSize {
    TextSize::from(at as u32)
}

struct TokenSink {
    tokens: Vec<Token>,
    garbage_from: Option<usize>,
}

impl TokenSink {
    fn push(&mut self, kind: SyntaxKind, bytes: Range<usize>) {
        self.tokens.push(Token {
            kind,
            span: TextRange::new(offset(bytes.start), offset(bytes.end)),
        });
    }

    fn end_garbage(&mut self, at: usize) {
        if let Some(from) = self.garbage_from.take() {
            self.push(SyntaxKind::Garbage, from..at);
        }
    }

    /// `"abc"` becomes quote, `abc`, quote; `""` has no content token.
    fn push_string(&mut self, Range { start, end }: Range<usize>) {
        self.push(SyntaxKind::DoubleQuote, start..start + 1);
        if start + 1 < end - 1 {
            self.push(SyntaxKind::StrVal, start + 1..end - 1);
        }
        self.push(SyntaxKind::DoubleQuote, end - 1..end);
    }
}

pub fn lex(source: &str) -> Vec<Token> {
    let mut sink = TokenSink {
        tokens: Vec::new(),
        garbage_from: None,
    };

    for (result, bytes) in SyntaxKind::lexer(source).spanned() {
        match result {
            Ok(kind) => {
                sink.end_garbage(bytes.start);
                if kind == SyntaxKind::StringLiteral {
                    sink.push_string(bytes);
                } else {
                    sink.push(kind, bytes);
                }
            }
            Err(()) => {
                sink.garbage_from.get_or_insert(bytes.start);
            }
        }
    }
    sink.end_garbage(source.len());

    sink.tokens
}

#[inline]
pub fn token_text<'q>(source: &'q str, token: &Token) -> &'q str {
    &source[token.span]
}

/// Resolves the escapes of a string literal's raw content.
///
/// Unknown escapes keep the escaped character, so `\.` reads as `.`.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
