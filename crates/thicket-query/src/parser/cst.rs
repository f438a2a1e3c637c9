//! Token and node kinds of the pattern language CST.
//!
//! One enum serves the lexer (through the Logos derive) and the Rowan tree.

use logos::Logos;
use rowan::Language;

/// Token kinds come first; everything from `Root` on is a node kind.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum SyntaxKind {
    #[token("(")]
    ParenOpen = 0,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(":")]
    Colon,
    #[token("!")]
    Negation,
    #[token("_")]
    Underscore,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("?")]
    Question,
    #[token(".")]
    Dot,
    #[token("@")]
    At,

    /// Whole quoted literal. `lex` splits it into `DoubleQuote`, `StrVal`
    /// and `DoubleQuote`, so it never reaches the tree.
    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    #[doc(hidden)]
    StringLiteral,
    DoubleQuote,
    /// Literal content with escapes still in place.
    StrVal,

    #[token("ERROR")]
    KwError,
    #[token("MISSING")]
    KwMissing,

    /// Node, field, capture and property names. `.` and `-` are allowed
    /// inside, so `injection.language` is a single identifier.
    #[regex(r"[a-zA-Z][a-zA-Z0-9_.\-]*")]
    #[regex(r"_[a-zA-Z0-9_.\-]+")]
    Id,

    /// `#eq?`, `#set!`, `#not-any-of?`
    #[regex(r"#[a-zA-Z_][a-zA-Z0-9_\-]*[?!]?")]
    PredicateName,

    #[regex(r"[ \t]+")]
    Whitespace,
    #[token("\n")]
    #[token("\r\n")]
    Newline,
    #[regex(r";[^\n]*", allow_greedy = true)]
    LineComment,

    /// A run of characters no rule accepts.
    Garbage,
    Error,

    Root,
    Pattern,
    Tree,
    Group,
    Str,
    Alt,
    Wildcard,
    Capture,
    Quantifier,
    Field,
    NegatedField,
    Anchor,
    Predicate,
    CaptureRef,
}

impl SyntaxKind {
    const LAST: SyntaxKind = SyntaxKind::CaptureRef;

    #[inline]
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            SyntaxKind::Whitespace | SyntaxKind::Newline | SyntaxKind::LineComment
        )
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    #[inline]
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryLang {}

impl Language for QueryLang {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> SyntaxKind {
        assert!(
            raw.0 <= SyntaxKind::LAST as u16,
            "raw kind {} is not a pattern syntax kind",
            raw.0
        );
        // SAFETY: `SyntaxKind` is a fieldless repr(u16) enum numbered
        // contiguously from zero, and `raw.0` was checked against its last
        // variant.
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }

    fn kind_to_raw(kind: SyntaxKind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type SyntaxNode = rowan::SyntaxNode<QueryLang>;
pub type SyntaxToken = rowan::SyntaxToken<QueryLang>;

/// Tokens that can open a top-level pattern.
pub(super) const PATTERN_START: &[SyntaxKind] = &[
    SyntaxKind::ParenOpen,
    SyntaxKind::BracketOpen,
    SyntaxKind::Underscore,
    SyntaxKind::Id,
    SyntaxKind::DoubleQuote,
];

/// Tokens that can open a child of a node pattern: a top-level start, an
/// anchor or a negated field.
pub(super) const CHILD_START: &[SyntaxKind] = &[
    SyntaxKind::ParenOpen,
    SyntaxKind::BracketOpen,
    SyntaxKind::Underscore,
    SyntaxKind::Id,
    SyntaxKind::DoubleQuote,
    SyntaxKind::Dot,
    SyntaxKind::Negation,
];

pub(super) const QUANTIFIER: &[SyntaxKind] =
    &[SyntaxKind::Star, SyntaxKind::Plus, SyntaxKind::Question];

/// An alternation stops at a stray `)` so the enclosing node can close.
pub(super) const ALT_STOP: &[SyntaxKind] = &[SyntaxKind::ParenClose];

pub(super) const PREDICATE_STOP: &[SyntaxKind] = &[
    SyntaxKind::ParenOpen,
    SyntaxKind::BracketOpen,
    SyntaxKind::BracketClose,
];
