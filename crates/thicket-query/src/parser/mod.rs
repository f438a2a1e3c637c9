//! Front end of the pattern language: lexing, a recursive-descent parser
//! building a Rowan green tree, and typed views over the result.
//!
//! Every byte of the source, comments included, is kept in the tree. Suffix
//! operators (`*`, `+`, `?`, `@name`) are parsed after their operand and
//! wrap it through a builder checkpoint.
//!
//! Parsing never gives up. A token that fits nowhere is consumed into an
//! `Error` node; a token that is expected but absent is reported and left
//! for the enclosing production to recover from. At most one error is kept
//! per source offset.

pub mod ast;
pub mod cst;
pub mod lexer;

mod core;
mod grammar;

#[cfg(test)]
mod ast_tests;
#[cfg(test)]
mod lexer_tests;

pub use ast::{Expr, Pattern, Root};
pub use self::core::SyntaxError;
pub use cst::{SyntaxKind, SyntaxNode, SyntaxToken};

use self::core::Parser;
use lexer::lex;

/// Lossless CST of a pattern source and the syntax errors found in it.
#[derive(Debug, Clone)]
pub struct Parse {
    green: rowan::GreenNode,
    errors: Vec<SyntaxError>,
}

impl Parse {
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    pub fn root(&self) -> Option<Root> {
        Root::cast(self.syntax())
    }

    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }
}

/// Parses a pattern source. Never fails; problems land in [`Parse::errors`].
pub fn parse(source: &str) -> Parse {
    let mut parser = Parser::new(source, lex(source));
    parser.parse_source();
    let (green, errors) = parser.finish();
    Parse { green, errors }
}
