#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures shared by every thicket crate.
//!
//! - [`position`]: byte/point coordinates and text edits
//! - [`language`]: the grammar table consumed by the parser
//! - [`scanner`]: the callback interface for grammar-supplied token scanners
//! - [`interner`]: string deduplication used by query compilation

pub mod error;
pub mod interner;
pub mod language;
pub mod position;
pub mod scanner;

#[cfg(test)]
mod interner_tests;

pub use error::LanguageError;
pub use interner::{Interner, Name};
pub use language::{
    FieldMapEntry, Language, LanguageBuilder, LanguageData, LexMode, LexState, LexTable,
    LexTransition, LookaheadIterator, ParseAction, ParseStateData, Production, SymbolInfo,
    TableEntry,
};
pub use position::{InputEdit, Length, Point, Range, extent_of};
pub use scanner::{ExternalScanner, ExternalScannerFactory, ScanLexer, SERIALIZATION_BUFFER_SIZE};

/// Grammar symbol id. Terminals come first, then external tokens, then nonterminals.
pub type Symbol = u16;

/// Field id. Zero means "no field".
pub type FieldId = u16;

/// Parse state id.
pub type StateId = u16;

/// The end-of-input terminal.
pub const SYMBOL_END: Symbol = 0;

/// Error nodes produced by recovery.
pub const SYMBOL_ERROR: Symbol = u16::MAX;

/// Hidden accumulator for input skipped during recovery.
pub const SYMBOL_ERROR_REPEAT: Symbol = u16::MAX - 1;

/// The state the parser sits in while recovering.
pub const ERROR_STATE: StateId = 0;

/// The state every parse starts in.
pub const START_STATE: StateId = 1;

/// Artifact ABI version produced by this engine.
pub const LANGUAGE_VERSION: u32 = 15;

/// Oldest artifact ABI version this engine still loads.
pub const MIN_COMPATIBLE_LANGUAGE_VERSION: u32 = 13;
