//! Grammar-supplied scanners for context-sensitive tokens.
//!
//! A grammar can delegate some of its terminals to native code. The parser
//! creates one scanner per parse through the [`ExternalScannerFactory`]
//! attached to the [`Language`](crate::Language), and calls
//! [`ExternalScanner::scan`] before falling back to the table lexer.

use std::sync::Arc;

/// Upper bound on the state a scanner may persist between tokens.
pub const SERIALIZATION_BUFFER_SIZE: usize = 1024;

/// The lexer surface visible to an external scanner.
pub trait ScanLexer {
    /// The current character, or `None` at the end of the included input.
    fn lookahead(&self) -> Option<char>;

    /// Consumes the lookahead. Skipped characters become padding, not token text.
    fn advance(&mut self, skip: bool);

    /// Marks the current position as the end of the token being scanned.
    /// Without a call the token ends wherever scanning stopped.
    fn mark_end(&mut self);

    /// Column of the current position, counted in characters.
    fn column(&mut self) -> u32;

    fn eof(&self) -> bool;

    /// Reports which external token was recognized, by its index in the
    /// grammar's external token list.
    fn set_result_symbol(&mut self, external_index: u16);

    fn is_at_included_range_start(&self) -> bool;
}

/// Native scanner for a grammar's external tokens.
pub trait ExternalScanner: Send {
    /// Tries to recognize one of the tokens flagged in `valid_symbols`
    /// (indexed like the grammar's external token list).
    fn scan(&mut self, lexer: &mut dyn ScanLexer, valid_symbols: &[bool]) -> bool;

    /// Writes the scanner state. At most [`SERIALIZATION_BUFFER_SIZE`]
    /// bytes are kept; the rest is discarded.
    fn serialize(&self, buffer: &mut Vec<u8>);

    /// Restores a state written by [`ExternalScanner::serialize`].
    /// An empty slice means "initial state".
    fn deserialize(&mut self, buffer: &[u8]);
}

/// Creates a fresh scanner for every parse.
pub type ExternalScannerFactory = Arc<dyn Fn() -> Box<dyn ExternalScanner> + Send + Sync>;
