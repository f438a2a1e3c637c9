//! Incremental GLR parser for thicket grammars.
//!
//! # Example
//!
//! ```ignore
//! use thicket_parser::{ParseOutcome, Parser};
//!
//! let mut parser = Parser::new(language);
//! let ParseOutcome::Complete(tree) = parser.parse("1+2", None)? else {
//!     unreachable!("no budget was set");
//! };
//! println!("{}", tree.root_node());
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod error;
mod input;
mod lexer;
mod log;
mod parser;
mod recovery;
mod reusable;
mod session;
mod stack;

#[cfg(test)]
mod incremental_tests;
#[cfg(test)]
mod input_tests;
#[cfg(test)]
mod recovery_tests;

pub use error::ConfigError;
pub use input::{DecodeFn, InputEncoding, ReadCallback};
pub use log::{LogType, Logger};
pub use parser::{Interruption, ParseOutcome, Parser};
