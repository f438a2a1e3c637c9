//! Sums of integers:
//!
//! ```text
//! expr             -> num | num _expr_repeat1
//! _expr_repeat1    -> _expr_repeat1 plus num | plus num
//! ```
//!
//! Whitespace between tokens is skipped by the lexer.

use thicket_core::{Language, LanguageBuilder, LanguageError, LexMode, LexState, LexTable, Symbol};

pub const NUM: Symbol = 1;
pub const PLUS: Symbol = 2;
pub const EXPR: Symbol = 3;
pub const EXPR_REPEAT: Symbol = 4;

const WHITESPACE: &[(char, char)] = &[(' ', ' '), ('\t', '\n'), ('\r', '\r')];

pub fn build() -> Result<Language, LanguageError> {
    let mut b = LanguageBuilder::new("arithmetic");
    let num = b.token("num", true);
    let plus = b.token("plus", true);
    let expr = b.nonterminal("expr", true);
    let repeat = b.nonterminal("_expr_repeat1", false);
    debug_assert_eq!([num, plus, expr, repeat], [NUM, PLUS, EXPR, EXPR_REPEAT]);

    let mode = LexMode::new(0, 0);
    // 1: start          2: num .           3: expr .
    // 4: plus . num     5: num repeat .    6: plus num .
    // 7: repeat plus .  8: repeat plus num .
    let start = b.add_states(8, mode);
    let [s1, s2, s3, s4, s5, s6, s7, s8] = std::array::from_fn(|i| start + i as u16);

    b.shift(s1, num, s2);
    b.goto(s1, expr, s3);

    b.reduce(s2, 0, expr, 1, 0);
    b.shift(s2, plus, s4);
    b.goto(s2, repeat, s5);

    b.accept(s3, 0);

    b.shift(s4, num, s6);

    b.reduce(s5, 0, expr, 2, 0);
    b.shift(s5, plus, s7);

    b.reduce(s6, 0, repeat, 2, 0);
    b.reduce(s6, plus, repeat, 2, 0);

    b.shift(s7, num, s8);

    b.reduce(s8, 0, repeat, 3, 0);
    b.reduce(s8, plus, repeat, 3, 0);

    b.lex_table(LexTable::new(vec![
        LexState::new()
            .skip(WHITESPACE, 0)
            .on(&[('0', '9')], 1)
            .on(&[('+', '+')], 2),
        LexState::new().accept(num).on(&[('0', '9')], 1),
        LexState::new().accept(plus),
    ]));

    b.build()
}
