//! Recursive-descent productions of the pattern language.
//!
//! A production that reports an error still closes the node it opened, so
//! the tree keeps its shape around mistakes.

use rowan::Checkpoint;

use super::core::Parser;
use super::cst::{ALT_STOP, CHILD_START, PATTERN_START, PREDICATE_STOP, QUANTIFIER, SyntaxKind};

impl Parser<'_> {
    pub fn parse_source(&mut self) {
        self.start_node(SyntaxKind::Root);

        while !self.eof() {
            let kind = self.peek();
            if PATTERN_START.contains(&kind) {
                self.start_node(SyntaxKind::Pattern);
                self.expr();
                self.finish_node();
            } else if matches!(kind, SyntaxKind::Dot | SyntaxKind::Negation) {
                self.error_and_bump("anchors and negated fields are only valid inside a node");
            } else if kind == SyntaxKind::At {
                self.error_and_bump("capture has no pattern before it");
            } else {
                self.error_and_bump("unexpected token; patterns start with `(`, `[`, `_` or a string");
            }
        }

        self.eat_trivia();
        self.finish_node();
    }

    fn expr(&mut self) {
        self.expr_with(true)
    }

    /// Field values take no suffix, so `name: (x)*` parses as `(name: (x))*`
    /// and `name: (x) @c` captures the field's node.
    fn bare_expr(&mut self) {
        self.expr_with(false)
    }

    fn expr_with(&mut self, suffixes: bool) {
        if !self.enter_recursion() {
            self.error("pattern is nested too deeply");
            self.start_node(SyntaxKind::Error);
            while !self.eof() {
                self.bump();
            }
            self.finish_node();
            return;
        }

        let checkpoint = self.checkpoint();

        match self.peek() {
            SyntaxKind::ParenOpen => self.parenthesized(),
            SyntaxKind::BracketOpen => self.alternation(),
            SyntaxKind::Underscore => self.token_node(SyntaxKind::Wildcard),
            SyntaxKind::DoubleQuote => self.string(),
            SyntaxKind::Dot => self.token_node(SyntaxKind::Anchor),
            SyntaxKind::Negation => self.negated_field(),
            SyntaxKind::Id if self.peek_nth(1) == SyntaxKind::Colon => self.field(),
            SyntaxKind::Id => {
                self.error_and_bump("bare identifier; node types are written `(identifier)`");
            }
            _ => self.error_and_bump("not a valid pattern"),
        }

        if suffixes {
            self.quantifier_suffix(checkpoint);
            self.capture_suffixes(checkpoint);
        }

        self.exit_recursion();
    }

    /// `(type ...)` | `(_ ...)` | `(ERROR)` | `(MISSING kind)` | `((a) (b))` | `(#pred? ...)`
    fn parenthesized(&mut self) {
        let checkpoint = self.checkpoint();
        self.push_delimiter();
        self.bump(); // '('

        match self.peek() {
            SyntaxKind::ParenClose => {
                self.start_node_at(checkpoint, SyntaxKind::Tree);
                self.error("empty pattern; expected a node type");
                self.bump();
                self.pop_delimiter();
                self.finish_node();
                return;
            }
            SyntaxKind::PredicateName => {
                self.start_node_at(checkpoint, SyntaxKind::Predicate);
                self.bump();
                self.predicate_args();
                self.pop_delimiter();
                self.expect(SyntaxKind::ParenClose, "`)` to close the predicate");
                self.finish_node();
                return;
            }
            SyntaxKind::KwMissing => {
                self.start_node_at(checkpoint, SyntaxKind::Tree);
                self.bump();
                self.missing_type();
                self.pop_delimiter();
                self.expect(SyntaxKind::ParenClose, "`)` after the missing node's type");
                self.finish_node();
                return;
            }
            SyntaxKind::Underscore | SyntaxKind::Id | SyntaxKind::KwError => {
                self.start_node_at(checkpoint, SyntaxKind::Tree);
                self.bump();
            }
            SyntaxKind::ParenOpen | SyntaxKind::BracketOpen | SyntaxKind::DoubleQuote => {
                self.start_node_at(checkpoint, SyntaxKind::Group);
            }
            _ => {
                self.start_node_at(checkpoint, SyntaxKind::Tree);
                self.error("expected a node type");
            }
        }

        self.node_children();
        self.pop_delimiter();
        self.expect(SyntaxKind::ParenClose, "`)`");
        self.finish_node();
    }

    /// Optional type after `MISSING`: an identifier or a string.
    fn missing_type(&mut self) {
        match self.peek() {
            SyntaxKind::Id => self.bump(),
            SyntaxKind::DoubleQuote => self.string_tokens(),
            SyntaxKind::ParenClose => {}
            _ => self.error("`MISSING` takes at most a node type"),
        }
    }

    fn node_children(&mut self) {
        loop {
            if self.eof() {
                self.error_unclosed_delimiter("expected `)`");
                break;
            }
            let kind = self.peek();
            if kind == SyntaxKind::ParenClose {
                break;
            }
            if CHILD_START.contains(&kind) {
                self.expr();
                continue;
            }
            if kind == SyntaxKind::At {
                self.error_and_bump("capture has no pattern before it");
                continue;
            }
            self.error_and_bump("not valid inside a node; expected a child pattern or `)`");
        }
    }

    /// Alternation: `[(a) (b) "c"]`
    fn alternation(&mut self) {
        self.start_node(SyntaxKind::Alt);
        self.push_delimiter();
        self.expect(SyntaxKind::BracketOpen, "`[`");

        let mut branches = 0;
        loop {
            if self.eof() {
                self.error_unclosed_delimiter("expected `]`");
                break;
            }
            let kind = self.peek();
            if kind == SyntaxKind::BracketClose {
                if branches == 0 {
                    self.error("empty alternation");
                }
                break;
            }
            if PATTERN_START.contains(&kind) {
                self.expr();
                branches += 1;
                continue;
            }
            if ALT_STOP.contains(&kind) {
                break;
            }
            self.error_and_bump("not valid inside an alternation; expected a pattern or `]`");
        }

        self.pop_delimiter();
        self.expect(SyntaxKind::BracketClose, "`]`");
        self.finish_node();
    }

    /// A node holding exactly the next token: `_` and `.`.
    fn token_node(&mut self, kind: SyntaxKind) {
        self.start_node(kind);
        self.bump();
        self.finish_node();
    }

    fn string(&mut self) {
        self.start_node(SyntaxKind::Str);
        self.string_tokens();
        self.finish_node();
    }

    /// Quote, optional content, quote. The lexer only emits complete literals.
    fn string_tokens(&mut self) {
        self.bump(); // opening quote
        if self.peek() == SyntaxKind::StrVal {
            self.bump();
        }
        self.expect(SyntaxKind::DoubleQuote, "closing `\"`");
    }

    /// `!field`
    fn negated_field(&mut self) {
        self.start_node(SyntaxKind::NegatedField);
        self.bump();
        if self.peek() == SyntaxKind::Id {
            self.bump();
        } else {
            self.error("expected a field name after `!`");
        }
        self.finish_node();
    }

    /// `field: pattern`
    fn field(&mut self) {
        self.start_node(SyntaxKind::Field);
        self.bump(); // name
        self.bump(); // ':'

        if self.at_set(PATTERN_START) {
            self.bare_expr();
        } else {
            self.error("expected a pattern after the field name");
        }

        self.finish_node();
    }

    /// Arguments of `(#name? ...)`: captures, strings and bare identifiers.
    fn predicate_args(&mut self) {
        loop {
            if self.eof() {
                self.error_unclosed_delimiter("expected `)` to close the predicate");
                break;
            }
            match self.peek() {
                SyntaxKind::ParenClose => break,
                SyntaxKind::At => {
                    self.start_node(SyntaxKind::CaptureRef);
                    self.bump();
                    if self.peek() == SyntaxKind::Id {
                        self.bump();
                    } else {
                        self.error("expected a capture name after `@`");
                    }
                    self.finish_node();
                }
                SyntaxKind::DoubleQuote => self.string(),
                SyntaxKind::Id | SyntaxKind::KwError | SyntaxKind::KwMissing => self.bump(),
                kind if PREDICATE_STOP.contains(&kind) => {
                    self.error("predicate arguments must be captures, strings or identifiers");
                    break;
                }
                _ => self.error_and_bump("predicate arguments must be captures, strings or identifiers"),
            }
        }
    }

    fn quantifier_suffix(&mut self, checkpoint: Checkpoint) {
        if self.at_set(QUANTIFIER) {
            self.start_node_at(checkpoint, SyntaxKind::Quantifier);
            self.bump();
            self.finish_node();
        }
    }

    /// `@a @b` wraps the expression once per capture.
    fn capture_suffixes(&mut self, checkpoint: Checkpoint) {
        while self.peek() == SyntaxKind::At {
            self.start_node_at(checkpoint, SyntaxKind::Capture);
            self.bump();
            if self.peek() == SyntaxKind::Id {
                self.bump();
            } else {
                self.error("expected a capture name after `@`");
            }
            self.finish_node();
        }
    }
}
