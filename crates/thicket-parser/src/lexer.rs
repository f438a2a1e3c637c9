//! Character-level cursor over the input plus the lexical DFA interpreter.
//!
//! The lexer only ever sees the included ranges: advancing past the end of
//! one range jumps to the start of the next, and the end of the last range
//! is end of input.

use std::borrow::Cow;

use thicket_core::{LexTable, Length, Point, Range, ScanLexer, Symbol, SYMBOL_END};

use crate::input::{InputEncoding, Source};
use crate::log::{LogType, Logger};

const BYTE_ORDER_MARK: char = '\u{feff}';

pub(crate) struct Lexer<'a> {
    source: Source<'a>,
    encoding: InputEncoding,
    chunk: Option<Cow<'a, [u8]>>,
    chunk_start: u32,
    lookahead: char,
    lookahead_size: u32,
    decode_error: bool,
    included_ranges: Vec<Range>,
    current_included_range_index: usize,
    pub current_position: Length,
    pub token_start_position: Length,
    token_end_position: Option<Length>,
    pub result_symbol: Symbol,
    pub did_get_column: bool,
    pub logger: Option<Logger>,
}

impl<'a> Lexer<'a> {
    pub fn new(
        source: Source<'a>,
        encoding: InputEncoding,
        included_ranges: Vec<Range>,
        logger: Option<Logger>,
    ) -> Self {
        let included_ranges = if included_ranges.is_empty() {
            vec![Range::EVERYTHING]
        } else {
            included_ranges
        };
        let mut lexer = Self {
            source,
            encoding,
            chunk: None,
            chunk_start: 0,
            lookahead: '\0',
            lookahead_size: 0,
            decode_error: false,
            included_ranges,
            current_included_range_index: 0,
            current_position: Length::ZERO,
            token_start_position: Length::ZERO,
            token_end_position: None,
            result_symbol: 0,
            did_get_column: false,
            logger,
        };
        lexer.goto(Length::ZERO);
        lexer
    }

    pub fn included_ranges(&self) -> &[Range] {
        &self.included_ranges
    }

    pub fn token_end_position(&self) -> Length {
        self.token_end_position.unwrap_or(self.current_position)
    }

    /// The current character; U+FFFD when the input could not be decoded.
    pub fn lookahead_char(&self) -> char {
        if self.decode_error {
            char::REPLACEMENT_CHARACTER
        } else {
            self.lookahead
        }
    }

    pub fn is_eof(&self) -> bool {
        self.current_included_range_index == self.included_ranges.len()
    }

    pub fn log(&mut self, kind: LogType, message: &str) {
        if let Some(logger) = &mut self.logger {
            logger(kind, message);
        }
    }

    fn clear_chunk(&mut self) {
        self.chunk = None;
        self.chunk_start = 0;
    }

    fn chunk_len(&self) -> u32 {
        self.chunk.as_ref().map_or(0, |c| c.len() as u32)
    }

    fn get_chunk(&mut self) {
        self.chunk_start = self.current_position.bytes;
        let chunk = self
            .source
            .read(self.current_position.bytes, self.current_position.extent);
        if chunk.is_empty() {
            self.current_included_range_index = self.included_ranges.len();
            self.chunk = None;
        } else {
            self.chunk = Some(chunk);
        }
    }

    fn decode_at_current(&self) -> Option<(Option<char>, u32, usize)> {
        let chunk = self.chunk.as_ref()?;
        let offset = self.current_position.bytes.saturating_sub(self.chunk_start) as usize;
        let rest = chunk.get(offset..).unwrap_or(&[]);
        if rest.is_empty() {
            return None;
        }
        let (c, size) = self.encoding.decode(rest);
        Some((c, size, rest.len()))
    }

    fn get_lookahead(&mut self) {
        let mut decoded = self.decode_at_current();

        // A character split across chunks: fetch a fresh chunk from here.
        if let Some((None, _, remaining)) = decoded
            && remaining < 4
        {
            self.get_chunk();
            decoded = self.decode_at_current();
        }

        match decoded {
            None => {
                self.lookahead = '\0';
                self.lookahead_size = 1;
                self.decode_error = false;
            }
            Some((Some(c), size, _)) => {
                self.lookahead = c;
                self.lookahead_size = size;
                self.decode_error = false;
            }
            Some((None, size, _)) => {
                self.lookahead = '\0';
                self.lookahead_size = size.max(1);
                self.decode_error = true;
            }
        }
    }

    /// Moves to `position`, snapping forward into the next included range.
    fn goto(&mut self, position: Length) {
        self.current_position = position;

        let found = self.included_ranges.iter().enumerate().find(|(_, range)| {
            range.end_byte > position.bytes && range.end_byte > range.start_byte
        });

        match found {
            Some((index, range)) => {
                if range.start_byte >= position.bytes {
                    self.current_position = range.start();
                }
                self.current_included_range_index = index;

                let bytes = self.current_position.bytes;
                if self.chunk.is_some()
                    && (bytes < self.chunk_start || bytes >= self.chunk_start + self.chunk_len())
                {
                    self.clear_chunk();
                }
                self.lookahead_size = 0;
                self.lookahead = '\0';
                self.decode_error = false;
            }
            None => {
                self.current_included_range_index = self.included_ranges.len();
                if let Some(last) = self.included_ranges.last() {
                    self.current_position = last.end();
                }
                self.clear_chunk();
                self.lookahead_size = 1;
                self.lookahead = '\0';
                self.decode_error = false;
            }
        }
    }

    fn do_advance(&mut self, skip: bool) {
        if self.lookahead_size > 0 {
            if self.lookahead == '\n' && !self.decode_error {
                self.current_position.extent.row += 1;
                self.current_position.extent.column = 0;
            } else {
                self.current_position.extent.column += self.lookahead_size;
            }
            self.current_position.bytes += self.lookahead_size;
        }

        let mut in_range = true;
        loop {
            let Some(range) = self.included_ranges.get(self.current_included_range_index) else {
                in_range = false;
                break;
            };
            if self.current_position.bytes < range.end_byte && range.end_byte != range.start_byte {
                break;
            }
            self.current_included_range_index += 1;
            match self.included_ranges.get(self.current_included_range_index) {
                Some(next) => self.current_position = next.start(),
                None => {
                    in_range = false;
                    break;
                }
            }
        }

        if skip {
            self.token_start_position = self.current_position;
        }

        if in_range {
            let bytes = self.current_position.bytes;
            if self.chunk.is_none()
                || bytes < self.chunk_start
                || bytes >= self.chunk_start + self.chunk_len()
            {
                self.get_chunk();
            }
            self.get_lookahead();
        } else {
            self.clear_chunk();
            self.lookahead = '\0';
            self.lookahead_size = 1;
            self.decode_error = false;
        }
    }

    pub fn advance(&mut self, skip: bool) {
        if self.chunk.is_none() {
            return;
        }
        if self.logger.is_some() {
            let verb = if skip { "skip" } else { "consume" };
            let c = self.lookahead_char();
            let message = if (' '..='~').contains(&c) {
                format!("{verb} character:'{c}'")
            } else {
                format!("{verb} character:{}", c as u32)
            };
            self.log(LogType::Lex, &message);
        }
        self.do_advance(skip);
    }

    pub fn mark_end(&mut self) {
        if !self.is_eof() {
            // A token ending where an included range starts really ends
            // where the previous range stopped.
            let index = self.current_included_range_index;
            if index > 0
                && let Some(current) = self.included_ranges.get(index)
                && self.current_position.bytes == current.start_byte
            {
                self.token_end_position = Some(self.included_ranges[index - 1].end());
                return;
            }
        }
        self.token_end_position = Some(self.current_position);
    }

    /// Column of the current position in characters.
    pub fn get_column(&mut self) -> u32 {
        let goal_byte = self.current_position.bytes;
        self.did_get_column = true;
        let start_of_line = Length::new(
            self.current_position.bytes - self.current_position.extent.column,
            Point::new(self.current_position.extent.row, 0),
        );
        self.goto(start_of_line);
        self.get_chunk();

        let mut column = 0;
        if !self.is_eof() {
            self.get_lookahead();
            while self.current_position.bytes < goal_byte && self.chunk.is_some() {
                column += 1;
                self.do_advance(false);
                if self.is_eof() {
                    break;
                }
            }
        }
        column
    }

    pub fn at_included_range_start(&self) -> bool {
        self.included_ranges
            .get(self.current_included_range_index)
            .is_some_and(|r| r.start_byte == self.current_position.bytes)
    }

    pub fn reset(&mut self, position: Length) {
        if position.bytes != self.current_position.bytes {
            self.goto(position);
        }
    }

    /// Prepares to scan a token from the current position.
    pub fn start(&mut self) {
        self.token_start_position = self.current_position;
        self.token_end_position = None;
        self.result_symbol = 0;
        self.did_get_column = false;
        if !self.is_eof() {
            if self.chunk.is_none() {
                self.get_chunk();
            }
            if self.lookahead_size == 0 {
                self.get_lookahead();
            }
            if self.current_position.bytes == 0 && self.lookahead_char() == BYTE_ORDER_MARK {
                self.advance(true);
            }
        }
    }

    /// Closes the token and widens `lookahead_end_byte` to cover every byte
    /// the lexer looked at.
    pub fn finish(&mut self, lookahead_end_byte: &mut u32) {
        if self.token_end_position.is_none() {
            self.mark_end();
        }

        let mut current_end = self.current_position.bytes.saturating_add(1);
        // Deciding that bytes are invalid may require looking past them.
        if self.decode_error {
            current_end = current_end.saturating_add(4);
        }
        if current_end > *lookahead_end_byte {
            *lookahead_end_byte = current_end;
        }
    }

    /// Runs the lexical automaton from `start`, keeping the longest accepted
    /// token. End of input right at the token start yields the end symbol.
    pub fn run_dfa(&mut self, table: &LexTable, start: u16) -> bool {
        let mut state = start;
        let mut result = false;
        loop {
            let Some(lex_state) = table.states.get(state as usize) else {
                return result;
            };
            if let Some(symbol) = lex_state.accept {
                result = true;
                self.result_symbol = symbol;
                self.mark_end();
            }
            if self.is_eof() {
                if !result && self.current_position.bytes == self.token_start_position.bytes {
                    self.result_symbol = SYMBOL_END;
                    self.mark_end();
                    return true;
                }
                return result;
            }
            let Some(transition) = lex_state.transition_for(self.lookahead_char()) else {
                return result;
            };
            let (next, skip) = (transition.next, transition.skip);
            self.advance(skip);
            state = next;
        }
    }
}

impl ScanLexer for Lexer<'_> {
    fn lookahead(&self) -> Option<char> {
        if self.is_eof() {
            None
        } else {
            Some(self.lookahead_char())
        }
    }

    fn advance(&mut self, skip: bool) {
        Lexer::advance(self, skip);
    }

    fn mark_end(&mut self) {
        Lexer::mark_end(self);
    }

    fn column(&mut self) -> u32 {
        self.get_column()
    }

    fn eof(&self) -> bool {
        self.is_eof()
    }

    fn set_result_symbol(&mut self, external_index: u16) {
        self.result_symbol = external_index;
    }

    fn is_at_included_range_start(&self) -> bool {
        self.at_included_range_start()
    }
}
