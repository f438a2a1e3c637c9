//! A small definition language with keywords, fields and an external scanner:
//!
//! ```text
//! program             -> _program_repeat1?
//! _program_repeat1    -> _program_repeat1 function_definition | function_definition
//! function_definition -> "def" name:identifier "(" ")" body:block
//! block               -> "{" _block_repeat1? "}"
//! _block_repeat1      -> _block_repeat1 call | call
//! call                -> function:identifier "(" arguments:identifier? ")" ";"
//! ```
//!
//! `def` is extracted from `identifier` through the keyword lexer. Line
//! comments starting with `#` are extras recognized by [`CommentScanner`],
//! whose persisted state is the number of comments seen so far.

use std::sync::Arc;

use thicket_core::{
    ExternalScanner, Language, LanguageBuilder, LanguageError, LexMode, LexState, LexTable,
    ScanLexer, Symbol,
};

pub const IDENTIFIER: Symbol = 1;
pub const DEF: Symbol = 2;
pub const LPAREN: Symbol = 3;
pub const RPAREN: Symbol = 4;
pub const LBRACE: Symbol = 5;
pub const RBRACE: Symbol = 6;
pub const SEMICOLON: Symbol = 7;
pub const COMMENT: Symbol = 8;
pub const PROGRAM: Symbol = 9;
pub const FUNCTION_DEFINITION: Symbol = 10;
pub const BLOCK: Symbol = 11;
pub const CALL: Symbol = 12;

const WHITESPACE: &[(char, char)] = &[(' ', ' '), ('\t', '\n'), ('\r', '\r')];
const WORD_START: &[(char, char)] = &[('a', 'z'), ('A', 'Z'), ('_', '_')];
const WORD_CHAR: &[(char, char)] = &[('a', 'z'), ('A', 'Z'), ('0', '9'), ('_', '_')];

/// Scans `#` line comments.
#[derive(Debug, Default)]
pub struct CommentScanner {
    seen: u8,
}

impl ExternalScanner for CommentScanner {
    fn scan(&mut self, lexer: &mut dyn ScanLexer, valid_symbols: &[bool]) -> bool {
        if !valid_symbols.first().copied().unwrap_or(false) {
            return false;
        }
        while lexer.lookahead().is_some_and(char::is_whitespace) {
            lexer.advance(true);
        }
        if lexer.lookahead() != Some('#') {
            return false;
        }
        while let Some(c) = lexer.lookahead()
            && c != '\n'
        {
            lexer.advance(false);
        }
        lexer.mark_end();
        lexer.set_result_symbol(0);
        self.seen = self.seen.saturating_add(1);
        true
    }

    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.push(self.seen);
    }

    fn deserialize(&mut self, buffer: &[u8]) {
        self.seen = buffer.first().copied().unwrap_or(0);
    }
}

pub fn build() -> Result<Language, LanguageError> {
    let mut b = LanguageBuilder::new("toy");
    let identifier = b.token("identifier", true);
    let def = b.token("def", false);
    let lparen = b.token("(", false);
    let rparen = b.token(")", false);
    let lbrace = b.token("{", false);
    let rbrace = b.token("}", false);
    let semicolon = b.token(";", false);
    let comment = b.external_token("comment", true);
    let program = b.nonterminal("program", true);
    let function_definition = b.nonterminal("function_definition", true);
    let block = b.nonterminal("block", true);
    let call = b.nonterminal("call", true);
    let program_repeat = b.nonterminal("_program_repeat1", false);
    let block_repeat = b.nonterminal("_block_repeat1", false);
    b.extra(comment);

    let name = b.field("name");
    let body = b.field("body");
    let function = b.field("function");
    let arguments = b.field("arguments");
    let definition_fields = b.production(&[(name, 1), (body, 4)], &[]);
    let call_fields = b.production(&[(function, 0)], &[]);
    let call_with_argument_fields = b.production(&[(function, 0), (arguments, 2)], &[]);

    let comments = b.external_lex_state(vec![true]);
    let mode = LexMode::new(0, comments);
    b.set_lex_mode(0, mode);
    let first = b.add_states(23, mode);
    let s: [u16; 24] = std::array::from_fn(|i| if i == 0 { 0 } else { first + i as u16 - 1 });

    b.reduce(s[1], 0, program, 0, 0);
    b.shift(s[1], def, s[4]);
    b.goto(s[1], program, s[2]);
    b.goto(s[1], program_repeat, s[3]);
    b.goto(s[1], function_definition, s[5]);

    b.accept(s[2], 0);

    b.reduce(s[3], 0, program, 1, 0);
    b.shift(s[3], def, s[4]);
    b.goto(s[3], function_definition, s[6]);

    b.shift(s[4], identifier, s[7]);

    for lookahead in [0, def] {
        b.reduce(s[5], lookahead, program_repeat, 1, 0);
        b.reduce(s[6], lookahead, program_repeat, 2, 0);
        b.reduce(s[11], lookahead, function_definition, 5, definition_fields);
        b.reduce(s[12], lookahead, block, 2, 0);
        b.reduce(s[17], lookahead, block, 3, 0);
    }

    b.shift(s[7], lparen, s[8]);
    b.shift(s[8], rparen, s[9]);
    b.shift(s[9], lbrace, s[10]);
    b.goto(s[9], block, s[11]);

    b.shift(s[10], rbrace, s[12]);
    b.shift(s[10], identifier, s[13]);
    b.goto(s[10], block_repeat, s[14]);
    b.goto(s[10], call, s[15]);

    b.shift(s[13], lparen, s[16]);

    b.shift(s[14], rbrace, s[17]);
    b.shift(s[14], identifier, s[13]);
    b.goto(s[14], call, s[18]);

    b.shift(s[16], rparen, s[19]);
    b.shift(s[16], identifier, s[20]);
    b.shift(s[19], semicolon, s[21]);
    b.shift(s[20], rparen, s[22]);
    b.shift(s[22], semicolon, s[23]);

    for lookahead in [rbrace, identifier] {
        b.reduce(s[15], lookahead, block_repeat, 1, 0);
        b.reduce(s[18], lookahead, block_repeat, 2, 0);
        b.reduce(s[21], lookahead, call, 4, call_fields);
        b.reduce(s[23], lookahead, call, 5, call_with_argument_fields);
    }

    b.lex_table(LexTable::new(vec![
        LexState::new()
            .skip(WHITESPACE, 0)
            .on(WORD_START, 1)
            .on(&[('(', '(')], 2)
            .on(&[(')', ')')], 3)
            .on(&[('{', '{')], 4)
            .on(&[('}', '}')], 5)
            .on(&[(';', ';')], 6),
        LexState::new().accept(identifier).on(WORD_CHAR, 1),
        LexState::new().accept(lparen),
        LexState::new().accept(rparen),
        LexState::new().accept(lbrace),
        LexState::new().accept(rbrace),
        LexState::new().accept(semicolon),
    ]));
    b.keywords(
        LexTable::new(vec![
            LexState::new().on(&[('d', 'd')], 1),
            LexState::new().on(&[('e', 'e')], 2),
            LexState::new().on(&[('f', 'f')], 3),
            LexState::new().accept(def),
        ]),
        identifier,
    );
    b.external_scanner(Arc::new(|| Box::new(CommentScanner::default())));

    b.build()
}
