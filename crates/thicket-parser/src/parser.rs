//! The public parser handle.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thicket_core::{Language, Point, Range};
use thicket_tree::Tree;

use crate::error::ConfigError;
use crate::input::{InputEncoding, Source};
use crate::lexer::Lexer;
use crate::log::Logger;
use crate::session::{Budget, Session};

/// Why a parse stopped before producing a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interruption {
    /// The wall-clock budget ran out.
    Timeout,
    /// The operation-count budget ran out.
    FuelExhausted,
    /// The cancellation flag was raised.
    Cancelled,
}

/// Result of a parse call that got far enough to start.
#[derive(Debug)]
pub enum ParseOutcome {
    Complete(Tree),
    Interrupted(Interruption),
}

impl ParseOutcome {
    pub fn tree(self) -> Option<Tree> {
        match self {
            ParseOutcome::Complete(tree) => Some(tree),
            ParseOutcome::Interrupted(_) => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ParseOutcome::Complete(_))
    }
}

/// Parses text with one grammar at a time.
///
/// Configuration persists across calls. A parser is not shareable between
/// threads while parsing, but separate parsers may share a [`Language`].
#[derive(Default)]
pub struct Parser {
    language: Option<Language>,
    included_ranges: Vec<Range>,
    timeout: Option<Duration>,
    fuel: Option<u64>,
    cancellation_flag: Option<Arc<AtomicBool>>,
    logger: Option<Logger>,
    dot_graph: Option<Box<dyn io::Write + Send>>,
}

impl Parser {
    pub fn new(language: Language) -> Self {
        Self {
            language: Some(language),
            ..Self::default()
        }
    }

    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = Some(language);
    }

    pub fn included_ranges(&self) -> &[Range] {
        &self.included_ranges
    }

    /// Restricts parsing to `ranges`, which must be ordered and disjoint.
    /// An empty list means the whole document.
    pub fn set_included_ranges(&mut self, ranges: &[Range]) -> Result<(), ConfigError> {
        for (index, range) in ranges.iter().enumerate() {
            let starts_before_previous = index > 0 && range.start_byte < ranges[index - 1].end_byte;
            if starts_before_previous || range.end_byte < range.start_byte {
                return Err(ConfigError::InvalidIncludedRanges { index });
            }
        }
        self.included_ranges = ranges.to_vec();
        Ok(())
    }

    pub fn with_included_ranges(mut self, ranges: &[Range]) -> Result<Self, ConfigError> {
        self.set_included_ranges(ranges)?;
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn fuel(&self) -> Option<u64> {
        self.fuel
    }

    /// Caps the number of parse actions a single call may perform.
    pub fn set_fuel(&mut self, fuel: Option<u64>) {
        self.fuel = fuel;
    }

    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = Some(fuel);
        self
    }

    pub fn cancellation_flag(&self) -> Option<&Arc<AtomicBool>> {
        self.cancellation_flag.as_ref()
    }

    pub fn set_cancellation_flag(&mut self, flag: Option<Arc<AtomicBool>>) {
        self.cancellation_flag = flag;
    }

    pub fn with_cancellation_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancellation_flag = Some(flag);
        self
    }

    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    pub fn set_logger(&mut self, logger: Option<Logger>) {
        self.logger = logger;
    }

    /// Emits a DOT graph of the parse stack after every step, interleaved
    /// with labelled one-node graphs for the parser's log messages.
    pub fn print_dot_graphs(&mut self, out: Option<Box<dyn io::Write + Send>>) {
        self.dot_graph = out;
    }

    /// Re-arms the parser after a cancelled call by lowering the
    /// cancellation flag.
    pub fn reset(&mut self) {
        if let Some(flag) = &self.cancellation_flag {
            flag.store(false, Ordering::Relaxed);
        }
    }

    /// Parses UTF-8 text. The text is kept on the tree for node text lookups.
    pub fn parse(
        &mut self,
        text: impl AsRef<[u8]>,
        old_tree: Option<&Tree>,
    ) -> Result<ParseOutcome, ConfigError> {
        let text: Arc<[u8]> = Arc::from(text.as_ref());
        self.run(Source::Buffer(&text), InputEncoding::Utf8, old_tree, Some(text.clone()))
    }

    /// Parses UTF-16 code units. Byte offsets in the tree count two bytes
    /// per unit.
    pub fn parse_utf16(
        &mut self,
        text: &[u16],
        old_tree: Option<&Tree>,
    ) -> Result<ParseOutcome, ConfigError> {
        let bytes: Arc<[u8]> = text.iter().flat_map(|unit| unit.to_le_bytes()).collect();
        self.run(Source::Buffer(&bytes), InputEncoding::Utf16Le, old_tree, Some(bytes.clone()))
    }

    pub fn parse_with_encoding(
        &mut self,
        text: &[u8],
        encoding: InputEncoding,
        old_tree: Option<&Tree>,
    ) -> Result<ParseOutcome, ConfigError> {
        let text: Arc<[u8]> = Arc::from(text);
        self.run(Source::Buffer(&text), encoding, old_tree, Some(text.clone()))
    }

    /// Parses text pulled chunk by chunk from `read`. The resulting tree has
    /// no text attached.
    pub fn parse_with<F>(
        &mut self,
        read: &mut F,
        encoding: InputEncoding,
        old_tree: Option<&Tree>,
    ) -> Result<ParseOutcome, ConfigError>
    where
        F: FnMut(usize, Point) -> Vec<u8>,
    {
        self.run(Source::Reader(read), encoding, old_tree, None)
    }

    fn run(
        &mut self,
        source: Source<'_>,
        encoding: InputEncoding,
        old_tree: Option<&Tree>,
        text: Option<Arc<[u8]>>,
    ) -> Result<ParseOutcome, ConfigError> {
        let language = self.language.clone().ok_or(ConfigError::NoLanguage)?;
        if let Some(old) = old_tree
            && old.language() != &language
        {
            return Err(ConfigError::LanguageMismatch);
        }

        let budget = Budget {
            deadline: self.timeout.map(|timeout| Instant::now() + timeout),
            fuel: self.fuel,
            cancellation_flag: self.cancellation_flag.clone(),
        };
        let lexer = Lexer::new(source, encoding, self.included_ranges.clone(), self.logger.take());
        let mut session = Session::new(language.clone(), lexer, budget, self.dot_graph.take());

        let result = session.run(old_tree);
        let included_ranges = session.included_ranges().to_vec();
        let (logger, dot_graph) = session.into_sinks();
        self.logger = logger;
        self.dot_graph = dot_graph;

        Ok(match result {
            Ok(root) => ParseOutcome::Complete(Tree::new(root, language, included_ranges, text)),
            Err(interruption) => ParseOutcome::Interrupted(interruption),
        })
    }
}
