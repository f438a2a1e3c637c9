//! Binary sums with no associativity:
//!
//! ```text
//! expr -> left:expr "+" right:expr | num
//! ```
//!
//! After `expr + expr` a `+` can either reduce or shift, so the parser has
//! to fork and later merge its stack versions.

use thicket_core::{Language, LanguageBuilder, LanguageError, LexMode, LexState, LexTable, Symbol};

pub const NUM: Symbol = 1;
pub const PLUS: Symbol = 2;
pub const EXPR: Symbol = 3;

pub fn build() -> Result<Language, LanguageError> {
    let mut b = LanguageBuilder::new("ambiguous");
    let num = b.token("num", true);
    let plus = b.token("+", false);
    let expr = b.nonterminal("expr", true);
    let left = b.field("left");
    let right = b.field("right");
    let binary = b.production(&[(left, 0), (right, 2)], &[]);

    let mode = LexMode::new(0, 0);
    // 1: start   2: num .   3: expr .   4: expr + .   5: expr + expr .
    let first = b.add_states(5, mode);
    let [s1, s2, s3, s4, s5] = std::array::from_fn(|i| first + i as u16);

    b.shift(s1, num, s2);
    b.goto(s1, expr, s3);

    b.reduce(s2, 0, expr, 1, 0);
    b.reduce(s2, plus, expr, 1, 0);

    b.accept(s3, 0);
    b.shift(s3, plus, s4);

    b.shift(s4, num, s2);
    b.goto(s4, expr, s5);

    b.reduce(s5, 0, expr, 3, binary);
    b.reduce(s5, plus, expr, 3, binary);
    b.shift(s5, plus, s4);

    b.lex_table(LexTable::new(vec![
        LexState::new()
            .skip(&[(' ', ' ')], 0)
            .on(&[('0', '9')], 1)
            .on(&[('+', '+')], 2),
        LexState::new().accept(num).on(&[('0', '9')], 1),
        LexState::new().accept(plus),
    ]));

    b.build()
}
