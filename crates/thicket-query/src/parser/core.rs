//! Token cursor and green tree sink shared by the grammar productions.

use rowan::{Checkpoint, GreenNode, GreenNodeBuilder, TextRange, TextSize};

use super::cst::SyntaxKind;
use super::lexer::{Token, token_text};

const MAX_NESTING: u32 = 256;

/// A syntax error found while parsing a pattern source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub range: TextRange,
    pub message: String,
}

/// Recursive-descent state over a lexed pattern source.
///
/// `cursor` may run ahead of `flushed` over trivia while looking ahead; the
/// skipped trivia is written into the tree right before the next node,
/// checkpoint or token, so every source byte ends up in the CST.
pub struct Parser<'src> {
    src: &'src str,
    tokens: Vec<Token>,
    cursor: usize,
    flushed: usize,
    sink: GreenNodeBuilder<'static>,
    errors: Vec<SyntaxError>,
    nesting: u32,
    reported_at: Option<TextSize>,
    open: Vec<TextRange>,
}

impl<'src> Parser<'src> {
    pub fn new(src: &'src str, tokens: Vec<Token>) -> Self {
        Self {
            src,
            tokens,
            cursor: 0,
            flushed: 0,
            sink: GreenNodeBuilder::new(),
            errors: Vec::new(),
            nesting: 0,
            reported_at: None,
            open: Vec::new(),
        }
    }

    pub(super) fn finish(self) -> (GreenNode, Vec<SyntaxError>) {
        (self.sink.finish(), self.errors)
    }

    fn skip_trivia(&mut self) {
        while self
            .tokens
            .get(self.cursor)
            .is_some_and(|token| token.kind.is_trivia())
        {
            self.cursor += 1;
        }
    }

    fn flush_trivia(&mut self) {
        for token in &self.tokens[self.flushed..self.cursor] {
            self.sink.token(token.kind.into(), token_text(self.src, token));
        }
        self.flushed = self.cursor;
    }

    fn current(&mut self) -> Option<Token> {
        self.skip_trivia();
        self.tokens.get(self.cursor).copied()
    }

    /// Kind of the next significant token; `Error` at end of input.
    pub(super) fn peek(&mut self) -> SyntaxKind {
        self.current().map_or(SyntaxKind::Error, |token| token.kind)
    }

    /// Kind of the significant token `n` places after the next one.
    pub(super) fn peek_nth(&mut self, n: usize) -> SyntaxKind {
        self.skip_trivia();
        self.tokens[self.cursor..]
            .iter()
            .filter(|token| !token.kind.is_trivia())
            .nth(n)
            .map_or(SyntaxKind::Error, |token| token.kind)
    }

    pub(super) fn at_set(&mut self, kinds: &[SyntaxKind]) -> bool {
        let kind = self.peek();
        kinds.contains(&kind)
    }

    pub(super) fn eof(&mut self) -> bool {
        self.current().is_none()
    }

    fn span(&mut self) -> TextRange {
        match self.current() {
            Some(token) => token.span,
            None => TextRange::empty(TextSize::of(self.src)),
        }
    }

    pub(super) fn eat_trivia(&mut self) {
        self.skip_trivia();
        self.flush_trivia();
    }

    pub(super) fn start_node(&mut self, kind: SyntaxKind) {
        self.flush_trivia();
        self.sink.start_node(kind.into());
    }

    pub(super) fn start_node_at(&mut self, checkpoint: Checkpoint, kind: SyntaxKind) {
        self.sink.start_node_at(checkpoint, kind.into());
    }

    pub(super) fn finish_node(&mut self) {
        self.sink.finish_node();
    }

    /// Taken after leading trivia so a later wrap starts at the expression.
    pub(super) fn checkpoint(&mut self) -> Checkpoint {
        self.eat_trivia();
        self.sink.checkpoint()
    }

    pub(super) fn bump(&mut self) {
        let Some(token) = self.current() else {
            debug_assert!(false, "bump past the end of input");
            return;
        };
        self.flush_trivia();
        self.sink.token(token.kind.into(), token_text(self.src, &token));
        self.cursor += 1;
        self.flushed = self.cursor;
    }

    /// Consumes `kind` if it is next; otherwise reports `expected {what}` and
    /// leaves the input alone.
    pub(super) fn expect(&mut self, kind: SyntaxKind, what: &str) -> bool {
        if self.peek() == kind {
            self.bump();
            true
        } else {
            self.error(format!("expected {what}"));
            false
        }
    }

    pub(super) fn error(&mut self, message: impl Into<String>) {
        let range = self.span();
        self.report(range, message.into());
    }

    /// One error per offset; cascades from a single bad token stay quiet.
    fn report(&mut self, range: TextRange, message: String) {
        if self.reported_at == Some(range.start()) {
            return;
        }
        self.reported_at = Some(range.start());
        self.errors.push(SyntaxError { range, message });
    }

    /// Reports the next token and consumes it inside an `Error` node.
    pub(super) fn error_and_bump(&mut self, message: impl Into<String>) {
        self.error(message);
        if !self.eof() {
            self.start_node(SyntaxKind::Error);
            self.bump();
            self.finish_node();
        }
    }

    pub(super) fn enter_recursion(&mut self) -> bool {
        if self.nesting == MAX_NESTING {
            return false;
        }
        self.nesting += 1;
        true
    }

    pub(super) fn exit_recursion(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    /// Remembers the opening bracket at the cursor for unclosed reports.
    pub(super) fn push_delimiter(&mut self) {
        let span = self.span();
        self.open.push(span);
    }

    pub(super) fn pop_delimiter(&mut self) {
        self.open.pop();
    }

    /// Reports from the innermost open bracket up to the current position.
    pub(super) fn error_unclosed_delimiter(&mut self, message: impl Into<String>) {
        let here = self.span();
        let from = self.open.last().copied().unwrap_or(here);
        self.report(from.cover(here), message.into());
    }
}
