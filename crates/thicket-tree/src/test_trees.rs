//! Hand-assembled trees over a small call grammar:
//!
//! ```text
//! program -> call
//! call    -> identifier "(" _args ")"     function: 0
//! _args   -> identifier identifier         argument: 0, argument: 1
//! ```

use std::sync::Arc;

use thicket_core::{Language, LanguageBuilder, Length, LexMode, LexState, LexTable, Point, Range};

use crate::subtree::{LeafFlags, Subtree};
use crate::tree::Tree;

pub const IDENTIFIER: u16 = 1;
pub const LPAREN: u16 = 2;
pub const RPAREN: u16 = 3;
pub const COMMENT: u16 = 4;
pub const PROGRAM: u16 = 5;
pub const CALL: u16 = 6;
pub const ARGS: u16 = 7;

pub const CALL_PRODUCTION: u16 = 1;
pub const ARGS_PRODUCTION: u16 = 2;

pub fn language() -> Language {
    let mut b = LanguageBuilder::new("calls");
    b.token("identifier", true);
    b.token("(", false);
    b.token(")", false);
    let comment = b.token("comment", true);
    b.nonterminal("program", true);
    b.nonterminal("call", true);
    b.nonterminal("_args", false);
    let function = b.field("function");
    let argument = b.field("argument");
    b.production(&[(function, 0)], &[]);
    b.production(&[(argument, 0), (argument, 1)], &[]);
    b.extra(comment);
    b.add_state(LexMode::default());
    b.lex_table(LexTable::new(vec![LexState::new()]));
    b.build().unwrap()
}

/// A token on row 0 with `padding` spaces before it.
pub fn leaf(lang: &Language, symbol: u16, padding: u32, size: u32) -> Subtree {
    Subtree::new_leaf(
        lang,
        symbol,
        Length::new(padding, Point::new(0, padding)),
        Length::new(size, Point::new(0, size)),
        1,
        1,
        LeafFlags::default(),
    )
}

/// `f(a b)`
pub fn call_subtree(lang: &Language) -> Subtree {
    let args = Subtree::new_node(
        lang,
        ARGS,
        vec![leaf(lang, IDENTIFIER, 0, 1), leaf(lang, IDENTIFIER, 1, 1)],
        ARGS_PRODUCTION,
    );
    let call = Subtree::new_node(
        lang,
        CALL,
        vec![
            leaf(lang, IDENTIFIER, 0, 1),
            leaf(lang, LPAREN, 0, 1),
            args,
            leaf(lang, RPAREN, 0, 1),
        ],
        CALL_PRODUCTION,
    );
    Subtree::new_node(lang, PROGRAM, vec![call], 0)
}

pub fn call_tree() -> Tree {
    let lang = language();
    let root = call_subtree(&lang);
    Tree::new(
        root,
        lang,
        vec![Range::EVERYTHING],
        Some(Arc::from(&b"f(a b)"[..])),
    )
}
