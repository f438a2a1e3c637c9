//! Typed views over the pattern CST.
//!
//! A view only checks the node kind when cast. Accessors return `None` for
//! pieces the parser had to leave out after an error, and the query compiler
//! decides what that means.

use rowan::TextRange;

use super::cst::{SyntaxKind, SyntaxNode, SyntaxToken};
use super::lexer::unescape;

macro_rules! nodes {
    ($($name:ident),* $(,)?) => {$(
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(SyntaxNode);

        impl $name {
            pub fn cast(node: SyntaxNode) -> Option<Self> {
                if node.kind() == SyntaxKind::$name {
                    Some(Self(node))
                } else {
                    None
                }
            }

            pub fn syntax(&self) -> &SyntaxNode {
                &self.0
            }

            pub fn text_range(&self) -> TextRange {
                self.0.text_range()
            }
        }
    )*};
}

nodes!(
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
);

macro_rules! expr_enum {
    ($($variant:ident),* $(,)?) => {
        /// Any element of a pattern, including the ones only valid between
        /// siblings.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Expr {
            $($variant($variant),)*
        }

        impl Expr {
            pub fn cast(node: SyntaxNode) -> Option<Self> {
                let wrapped = match node.kind() {
                    $(SyntaxKind::$variant => Expr::$variant($variant(node)),)*
                    _ => return None,
                };
                Some(wrapped)
            }

            pub fn syntax(&self) -> &SyntaxNode {
                match self {
                    $(Expr::$variant(inner) => &inner.0,)*
                }
            }
        }
    };
}

expr_enum!(
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
);

impl Expr {
    pub fn text_range(&self) -> TextRange {
        self.syntax().text_range()
    }
}

/// First expression child; wrappers like captures and fields hold exactly one.
fn first_expr(node: &SyntaxNode) -> Option<Expr> {
    node.children().find_map(Expr::cast)
}

fn tokens(node: &SyntaxNode) -> impl Iterator<Item = SyntaxToken> + '_ {
    node.children_with_tokens()
        .filter_map(rowan::NodeOrToken::into_token)
        .filter(|token| !token.kind().is_trivia())
}

fn token_of(node: &SyntaxNode, kind: SyntaxKind) -> Option<SyntaxToken> {
    tokens(node).find(|t| t.kind() == kind)
}

impl Root {
    pub fn patterns(&self) -> impl Iterator<Item = Pattern> + '_ {
        self.0.children().filter_map(Pattern::cast)
    }
}

impl Pattern {
    pub fn body(&self) -> Option<Expr> {
        first_expr(&self.0)
    }

    /// Every predicate nested anywhere in the pattern, in source order.
    pub fn predicates(&self) -> impl Iterator<Item = Predicate> + '_ {
        self.0.descendants().filter_map(Predicate::cast)
    }
}

/// What a parenthesized node pattern tests for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    /// `(identifier)`
    Named(SyntaxToken),
    /// `(_)`
    Wildcard,
    /// `(ERROR)`
    Error,
    /// `(MISSING)`, `(MISSING identifier)`, `(MISSING ";")`
    Missing(Option<(String, bool, TextRange)>),
}

fn expr_children(node: &SyntaxNode) -> impl Iterator<Item = Expr> + '_ {
    node.children().filter_map(Expr::cast)
}

impl Tree {
    pub fn node_type(&self) -> Option<NodeType> {
        let mut tokens = tokens(&self.0);
        let first = tokens.find(|t| t.kind() != SyntaxKind::ParenOpen)?;
        match first.kind() {
            SyntaxKind::Id => Some(NodeType::Named(first)),
            SyntaxKind::Underscore => Some(NodeType::Wildcard),
            SyntaxKind::KwError => Some(NodeType::Error),
            SyntaxKind::KwMissing => {
                let kind = match tokens.next() {
                    Some(t) if t.kind() == SyntaxKind::Id => {
                        Some((t.text().to_owned(), true, t.text_range()))
                    }
                    Some(open) if open.kind() == SyntaxKind::DoubleQuote => {
                        let value = tokens.next().filter(|t| t.kind() == SyntaxKind::StrVal);
                        let text = value.as_ref().map_or(String::new(), |t| unescape(t.text()));
                        Some((text, false, open.text_range()))
                    }
                    _ => None,
                };
                Some(NodeType::Missing(kind))
            }
            _ => None,
        }
    }

    /// The token naming the node type, for error locations.
    pub fn node_type_range(&self) -> TextRange {
        tokens(&self.0)
            .find(|t| t.kind() != SyntaxKind::ParenOpen)
            .map_or(self.0.text_range(), |t| t.text_range())
    }

    pub fn children(&self) -> impl Iterator<Item = Expr> + '_ {
        expr_children(&self.0)
    }
}

impl Group {
    pub fn children(&self) -> impl Iterator<Item = Expr> + '_ {
        expr_children(&self.0)
    }
}

impl Alt {
    pub fn branches(&self) -> impl Iterator<Item = Expr> + '_ {
        expr_children(&self.0)
    }
}

impl Str {
    /// The literal's value with escapes resolved.
    pub fn value(&self) -> String {
        token_of(&self.0, SyntaxKind::StrVal).map_or(String::new(), |t| unescape(t.text()))
    }
}

impl Capture {
    /// The name after `@`, without the sigil.
    pub fn name(&self) -> Option<SyntaxToken> {
        token_of(&self.0, SyntaxKind::Id)
    }

    pub fn inner(&self) -> Option<Expr> {
        first_expr(&self.0)
    }
}

/// Repetition operator of a [`Quantifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantifierKind {
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Quantifier {
    pub fn inner(&self) -> Option<Expr> {
        first_expr(&self.0)
    }

    pub fn kind(&self) -> Option<QuantifierKind> {
        tokens(&self.0).find_map(|t| match t.kind() {
            SyntaxKind::Question => Some(QuantifierKind::Optional),
            SyntaxKind::Star => Some(QuantifierKind::ZeroOrMore),
            SyntaxKind::Plus => Some(QuantifierKind::OneOrMore),
            _ => None,
        })
    }
}

impl Field {
    pub fn name(&self) -> Option<SyntaxToken> {
        token_of(&self.0, SyntaxKind::Id)
    }

    pub fn value(&self) -> Option<Expr> {
        first_expr(&self.0)
    }
}

impl NegatedField {
    pub fn name(&self) -> Option<SyntaxToken> {
        token_of(&self.0, SyntaxKind::Id)
    }
}

/// One argument of a predicate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateArg {
    Capture(CaptureRef),
    Str(Str),
    /// Bare identifiers read as strings, e.g. property keys.
    Ident(SyntaxToken),
}

impl PredicateArg {
    pub fn text_range(&self) -> TextRange {
        match self {
            PredicateArg::Capture(c) => c.text_range(),
            PredicateArg::Str(s) => s.text_range(),
            PredicateArg::Ident(t) => t.text_range(),
        }
    }
}

impl Predicate {
    pub fn name(&self) -> Option<SyntaxToken> {
        token_of(&self.0, SyntaxKind::PredicateName)
    }

    pub fn args(&self) -> Vec<PredicateArg> {
        self.0
            .children_with_tokens()
            .filter_map(|element| match element {
                rowan::NodeOrToken::Node(node) => match node.kind() {
                    SyntaxKind::CaptureRef => CaptureRef::cast(node).map(PredicateArg::Capture),
                    SyntaxKind::Str => Str::cast(node).map(PredicateArg::Str),
                    _ => None,
                },
                rowan::NodeOrToken::Token(token) => matches!(
                    token.kind(),
                    SyntaxKind::Id | SyntaxKind::KwError | SyntaxKind::KwMissing
                )
                .then_some(PredicateArg::Ident(token)),
            })
            .collect()
    }
}

impl CaptureRef {
    pub fn name(&self) -> Option<SyntaxToken> {
        token_of(&self.0, SyntaxKind::Id)
    }
}
