//! Thicket: an incremental, error-tolerant parsing engine driven by
//! precompiled grammar tables, with a pattern query language over the
//! resulting syntax trees.
//!
//! # Example
//!
//! ```
//! use thicket::{Parser, Query, QueryCursor, TreeText};
//!
//! let language = thicket::langs::toy();
//! let mut parser = Parser::new(language.clone());
//! let tree = parser
//!     .parse("def foo() {}\ndef bar() {}", None)
//!     .unwrap()
//!     .tree()
//!     .unwrap();
//!
//! let query = Query::new(&language, "(function_definition name: (identifier) @fn)").unwrap();
//! let mut cursor = QueryCursor::new();
//! let names: Vec<_> = cursor
//!     .captures(&query, tree.root_node(), TreeText)
//!     .map(|(m, i)| m.captures[i].node.utf8_text().unwrap_or_default().to_owned())
//!     .collect();
//! assert_eq!(names, ["foo", "bar"]);
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod visit;

pub use thicket_core::{
    ExternalScanner, ExternalScannerFactory, FieldId, InputEdit, LANGUAGE_VERSION, Language,
    LanguageBuilder, LanguageError, LookaheadIterator, MIN_COMPATIBLE_LANGUAGE_VERSION, Point,
    Range, ScanLexer, StateId, Symbol,
};
pub use thicket_parser::{
    ConfigError, DecodeFn, InputEncoding, Interruption, LogType, Logger, ParseOutcome, Parser,
    ReadCallback,
};
pub use thicket_query::{
    CaptureQuantifier, CustomPredicate, NoText, Query, QueryCapture, QueryCaptures, QueryCursor,
    QueryError, QueryErrorKind, QueryMatch, QueryMatches, QueryPredicate, QueryPredicateArg,
    QueryProperty, TextProvider, TreeText,
};
pub use thicket_tree::{Node, Tree, TreeCursor};

/// Grammar tables bundled for tests and demos.
#[cfg(feature = "thicket-langs")]
pub mod langs {
    pub use thicket_langs::{all, ambiguous, arithmetic, from_name, toy};
}
