#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Pattern queries over thicket syntax trees.
//!
//! A [`Query`] compiles S-expression patterns against one language:
//!
//! ```text
//! (function_definition
//!   name: (identifier) @name
//!   body: (block . (call) @first))
//! ((identifier) @id (#match? @id "^_"))
//! ```
//!
//! A [`QueryCursor`] runs a query over a node, either as whole matches or as
//! a stream of individual captures. Text predicates read node text through a
//! [`TextProvider`]; when text is unavailable the match is dropped.

pub mod parser;

mod compile;
mod cursor;
mod error;
mod predicate;
mod query;
mod text;

#[cfg(test)]
mod predicate_tests;
#[cfg(test)]
mod query_tests;

pub use compile::CaptureQuantifier;
pub use cursor::{
    CustomPredicate, QueryCapture, QueryCaptures, QueryCursor, QueryMatch, QueryMatches,
};
pub use error::{QueryError, QueryErrorKind};
pub use predicate::{QueryPredicate, QueryPredicateArg, QueryProperty};
pub use query::Query;
pub use text::{NoText, TextProvider, TreeText};
