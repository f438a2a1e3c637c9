//! One parse, from the first token to the accepted tree.
//!
//! A session owns everything that only lives for the duration of a parse:
//! the lexer over the input, the GLR stack, the reuse cursor into the
//! previous tree and the external scanner instance.

use std::cmp::Ordering as CmpOrdering;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use thicket_core::{
    ERROR_STATE, ExternalScanner, Language, Length, ParseAction, Range, SERIALIZATION_BUFFER_SIZE,
    ScanLexer, StateId, Symbol, SYMBOL_END, SYMBOL_ERROR, TableEntry,
};
use thicket_tree::subtree::{ERROR_COST_PER_SKIPPED_TREE, external_scanner_state_eq};
use thicket_tree::{LeafFlags, Subtree, TREE_STATE_NONE, Tree, write_subtree_dot_graph};

use crate::lexer::Lexer;
use crate::log::{LogType, Logger, write_dot_label};
use crate::parser::Interruption;
use crate::reusable::ReusableNode;
use crate::stack::{Stack, Version};

pub(crate) const MAX_VERSION_COUNT: usize = 6;
pub(crate) const MAX_VERSION_COUNT_OVERFLOW: usize = 4;
pub(crate) const MAX_SUMMARY_DEPTH: u32 = 16;
const MAX_COST_DIFFERENCE: u32 = 18 * ERROR_COST_PER_SKIPPED_TREE;
const OP_COUNT_PER_TIMEOUT_CHECK: u64 = 100;

/// Writes a parse-stage message to every attached sink.
macro_rules! log {
    ($session:ident, $kind:ident => $($arg:tt)*) => {
        if $session.is_logging() {
            let message = format!($($arg)*);
            $session.log($crate::log::LogType::$kind, &message);
        }
    };
    ($session:ident, $($arg:tt)*) => {
        log!($session, Parse => $($arg)*)
    };
}
pub(crate) use log;

/// Limits checked while the parse runs.
#[derive(Default)]
pub(crate) struct Budget {
    pub deadline: Option<Instant>,
    pub fuel: Option<u64>,
    pub cancellation_flag: Option<Arc<AtomicBool>>,
}

struct TokenCache {
    token: Subtree,
    last_external_token: Option<Subtree>,
    byte_index: u32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ErrorStatus {
    pub cost: u32,
    pub node_count: u32,
    pub dynamic_precedence: i32,
    pub is_in_error: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorComparison {
    TakeLeft,
    PreferLeft,
    None,
    PreferRight,
    TakeRight,
}

pub(crate) fn compare_versions(a: ErrorStatus, b: ErrorStatus) -> ErrorComparison {
    if !a.is_in_error && b.is_in_error {
        return if a.cost < b.cost {
            ErrorComparison::TakeLeft
        } else {
            ErrorComparison::PreferLeft
        };
    }

    if a.is_in_error && !b.is_in_error {
        return if b.cost < a.cost {
            ErrorComparison::TakeRight
        } else {
            ErrorComparison::PreferRight
        };
    }

    if a.cost < b.cost {
        return if (b.cost - a.cost).saturating_mul(1 + a.node_count) > MAX_COST_DIFFERENCE {
            ErrorComparison::TakeLeft
        } else {
            ErrorComparison::PreferLeft
        };
    }

    if b.cost < a.cost {
        return if (a.cost - b.cost).saturating_mul(1 + b.node_count) > MAX_COST_DIFFERENCE {
            ErrorComparison::TakeRight
        } else {
            ErrorComparison::PreferRight
        };
    }

    match a.dynamic_precedence.cmp(&b.dynamic_precedence) {
        CmpOrdering::Greater => ErrorComparison::PreferLeft,
        CmpOrdering::Less => ErrorComparison::PreferRight,
        CmpOrdering::Equal => ErrorComparison::None,
    }
}

/// Splits the trailing extras off `trees`, in their original order.
pub(crate) fn remove_trailing_extras(trees: &mut Vec<Subtree>) -> Vec<Subtree> {
    let keep = trees
        .iter()
        .rposition(|t| !t.extra)
        .map_or(0, |i| i + 1);
    trees.split_off(keep)
}

/// Ranges present in one list but not identically in the other.
fn included_range_differences(old: &[Range], new: &[Range]) -> Vec<Range> {
    let mut differences = Vec::new();
    for i in 0..old.len().max(new.len()) {
        match (old.get(i), new.get(i)) {
            (Some(a), Some(b)) if a == b => {}
            (Some(a), Some(b)) => differences.push(a.union(b)),
            (Some(r), None) | (None, Some(r)) => differences.push(*r),
            (None, None) => {}
        }
    }
    differences.sort_by_key(|r| r.start_byte);
    differences
}

pub(crate) struct Session<'a> {
    pub(crate) language: Language,
    pub(crate) lexer: Lexer<'a>,
    pub(crate) stack: Stack,
    pub(crate) reusable: ReusableNode,
    token_cache: Option<TokenCache>,
    pub(crate) finished_tree: Option<Subtree>,
    pub(crate) accept_count: usize,
    operation_count: u64,
    budget: Budget,
    scanner: Option<Box<dyn ExternalScanner>>,
    included_range_differences: Vec<Range>,
    included_range_difference_index: usize,
    pub(crate) has_error: bool,
    dot_graph: Option<Box<dyn io::Write + Send>>,
}

impl<'a> Session<'a> {
    pub fn new(
        language: Language,
        lexer: Lexer<'a>,
        budget: Budget,
        dot_graph: Option<Box<dyn io::Write + Send>>,
    ) -> Self {
        Self {
            language,
            lexer,
            stack: Stack::new(),
            reusable: ReusableNode::default(),
            token_cache: None,
            finished_tree: None,
            accept_count: 0,
            operation_count: 0,
            budget,
            scanner: None,
            included_range_differences: Vec::new(),
            included_range_difference_index: 0,
            has_error: false,
            dot_graph,
        }
    }

    pub fn included_ranges(&self) -> &[Range] {
        self.lexer.included_ranges()
    }

    /// Hands the host sinks back once the session is over.
    pub fn into_sinks(self) -> (Option<Logger>, Option<Box<dyn io::Write + Send>>) {
        (self.lexer.logger, self.dot_graph)
    }

    pub(crate) fn is_logging(&self) -> bool {
        self.lexer.logger.is_some()
            || self.dot_graph.is_some()
            || tracing::enabled!(tracing::Level::TRACE)
    }

    pub(crate) fn log(&mut self, kind: LogType, message: &str) {
        tracing::trace!(?kind, "{message}");
        self.lexer.log(kind, message);
        if kind == LogType::Parse
            && let Some(out) = &mut self.dot_graph
            && let Err(error) = write_dot_label(out.as_mut(), message)
        {
            tracing::warn!(%error, "debug graph sink failed; detaching it");
            self.dot_graph = None;
        }
    }

    pub(crate) fn log_stack(&mut self) {
        let Some(out) = &mut self.dot_graph else {
            return;
        };
        let written = self
            .stack
            .print_dot_graph(&self.language, out.as_mut())
            .and_then(|()| out.write_all(b"\n\n"));
        if let Err(error) = written {
            tracing::warn!(%error, "debug graph sink failed; detaching it");
            self.dot_graph = None;
        }
    }

    fn log_tree(&mut self, tree: &Subtree) {
        let Some(out) = &mut self.dot_graph else {
            return;
        };
        let written = write_subtree_dot_graph(tree, &self.language, out.as_mut())
            .and_then(|()| out.write_all(b"\n"));
        if let Err(error) = written {
            tracing::warn!(%error, "debug graph sink failed; detaching it");
            self.dot_graph = None;
        }
    }

    pub(crate) fn tree_name(&self, tree: &Subtree) -> String {
        self.language.symbol_name_or_end(tree.symbol).to_owned()
    }

    pub(crate) fn symbol_name(&self, symbol: Symbol) -> String {
        self.language.symbol_name_or_end(symbol).to_owned()
    }

    /// Drives every stack version over the input until a tree is accepted.
    pub fn run(&mut self, old_tree: Option<&Tree>) -> Result<Subtree, Interruption> {
        self.scanner = self.language.create_external_scanner();

        match old_tree {
            Some(old) => {
                self.included_range_differences =
                    included_range_differences(old.included_ranges(), self.lexer.included_ranges());
                self.reusable.reset(old.root_subtree().clone());
                log!(self, "parse_after_edit");
                self.log_tree(old.root_subtree());
                let differences = self.included_range_differences.clone();
                for range in differences {
                    log!(self, "different_included_range {} - {}", range.start_byte, range.end_byte);
                }
            }
            None => {
                self.reusable.clear();
                log!(self, "new_parse");
            }
        }

        let mut position = 0;
        let mut last_position = 0;
        loop {
            let mut version = 0;
            let version_count = loop {
                let count = self.stack.version_count();
                if version >= count {
                    break count;
                }
                let allow_node_reuse = count == 1;
                while self.stack.is_active(version) {
                    log!(
                        self,
                        "process version:{}, version_count:{}, state:{}, row:{}, col:{}",
                        version,
                        self.stack.version_count(),
                        self.stack.state(version),
                        self.stack.position(version).extent.row,
                        self.stack.position(version).extent.column
                    );

                    self.advance(version, allow_node_reuse)?;
                    self.log_stack();

                    position = self.stack.position(version).bytes;
                    if position > last_position || (version > 0 && position == last_position) {
                        last_position = position;
                        break;
                    }
                }
                version += 1;
            };

            let min_error_cost = self.condense_stack();

            // A finished tree better than every live version ends the parse.
            if let Some(finished) = &self.finished_tree
                && finished.error_cost() < min_error_cost
            {
                self.stack.clear();
                break;
            }

            while let Some(range) = self
                .included_range_differences
                .get(self.included_range_difference_index)
            {
                if range.end_byte <= position {
                    self.included_range_difference_index += 1;
                } else {
                    break;
                }
            }

            if version_count == 0 {
                break;
            }
        }

        let root = match self.finished_tree.take() {
            Some(root) => root,
            None => {
                debug_assert!(false, "parse loop ended without an accepted tree");
                Subtree::new_error_node(&self.language, Vec::new(), false)
            }
        };
        log!(self, "done");
        self.log_tree(&root);
        tracing::debug!(
            language = self.language.name(),
            error_cost = root.error_cost(),
            bytes = root.total_bytes(),
            "parse complete"
        );
        Ok(root)
    }

    fn check_progress(&mut self) -> Result<(), Interruption> {
        if self.operation_count % OP_COUNT_PER_TIMEOUT_CHECK == 0 {
            if let Some(flag) = &self.budget.cancellation_flag
                && flag.load(Ordering::Relaxed)
            {
                tracing::debug!("parse cancelled");
                return Err(Interruption::Cancelled);
            }
            if let Some(deadline) = self.budget.deadline
                && Instant::now() >= deadline
            {
                tracing::debug!("parse timed out");
                return Err(Interruption::Timeout);
            }
        }
        self.operation_count += 1;
        if let Some(fuel) = self.budget.fuel
            && self.operation_count > fuel
        {
            tracing::debug!(fuel, "parse ran out of fuel");
            return Err(Interruption::FuelExhausted);
        }
        Ok(())
    }

    fn advance(&mut self, version: Version, allow_node_reuse: bool) -> Result<(), Interruption> {
        let language = self.language.clone();
        let mut state = self.stack.state(version);
        let position = self.stack.position(version).bytes;
        let last_external_token = self.stack.last_external_token(version).cloned();

        let mut did_reuse = true;
        let mut lookahead = None;
        if allow_node_reuse {
            lookahead = self.reuse_node(version, &mut state, position, last_external_token.as_ref());
        }
        if lookahead.is_none() {
            did_reuse = false;
            lookahead = self.cached_token(state, position, last_external_token.as_ref());
        }

        let mut needs_lex = lookahead.is_none();
        let mut entry: &TableEntry = match &lookahead {
            Some(token) => language.table_entry(state, token.leaf_symbol()),
            None => language.table_entry(state, SYMBOL_END),
        };

        loop {
            if needs_lex {
                needs_lex = false;
                lookahead = self.lex(version, state);
                entry = match &lookahead {
                    Some(token) => {
                        self.token_cache = Some(TokenCache {
                            token: token.clone(),
                            last_external_token: last_external_token.clone(),
                            byte_index: position,
                        });
                        language.table_entry(state, token.symbol)
                    }
                    // The end of a non-terminal extra: its reduction lives
                    // under the end symbol.
                    None => language.table_entry(state, SYMBOL_END),
                };
            }

            self.check_progress()?;

            let mut last_reduction_version = None;
            for action in &entry.actions {
                match *action {
                    ParseAction::Shift {
                        state: shift_state,
                        extra,
                        repetition,
                    } => {
                        if repetition {
                            continue;
                        }
                        let Some(mut token) = lookahead.take() else {
                            continue;
                        };
                        let mut next_state = if extra {
                            log!(self, "shift_extra");
                            state
                        } else {
                            log!(self, "shift state:{shift_state}");
                            shift_state
                        };

                        if token.child_count() > 0 {
                            token = self.breakdown_lookahead(token, state);
                            next_state = language.next_state(state, token.symbol);
                        }

                        self.shift(version, next_state, token, extra);
                        if did_reuse {
                            self.reusable.advance();
                        }
                        return Ok(());
                    }

                    ParseAction::Reduce {
                        symbol,
                        child_count,
                        dynamic_precedence,
                        production_id,
                    } => {
                        let is_fragile = entry.actions.len() > 1;
                        let end_of_non_terminal_extra = lookahead.is_none();
                        log!(
                            self,
                            "reduce sym:{}, child_count:{child_count}",
                            self.symbol_name(symbol)
                        );
                        if let Some(reduced) = self.reduce(
                            version,
                            symbol,
                            child_count as u32,
                            dynamic_precedence as i32,
                            production_id,
                            is_fragile,
                            end_of_non_terminal_extra,
                        ) {
                            last_reduction_version = Some(reduced);
                        }
                    }

                    ParseAction::Accept => {
                        log!(self, "accept");
                        if let Some(token) = lookahead.take() {
                            self.accept(version, token);
                        }
                        return Ok(());
                    }

                    ParseAction::Recover => {
                        let Some(mut token) = lookahead.take() else {
                            continue;
                        };
                        if token.child_count() > 0 {
                            token = self.breakdown_lookahead(token, ERROR_STATE);
                        }
                        self.recover(version, token);
                        if did_reuse {
                            self.reusable.advance();
                        }
                        return Ok(());
                    }
                }
            }

            // Carry on with the reduced version and the same lookahead.
            if let Some(reduced) = last_reduction_version {
                self.stack.renumber_version(reduced, version);
                self.log_stack();
                state = self.stack.state(version);
                match &lookahead {
                    Some(token) => entry = language.table_entry(state, token.leaf_symbol()),
                    None => needs_lex = true,
                }
                continue;
            }

            // A finished non-terminal extra merged into another version.
            let Some(mut token) = lookahead.take() else {
                self.stack.halt(version);
                return Ok(());
            };

            // An invalid keyword may still be valid as the plain word token.
            if token.is_keyword
                && let Some(word) = language.keyword_capture_token()
                && token.symbol != word
            {
                let word_entry = language.table_entry(state, word);
                if !word_entry.actions.is_empty() {
                    log!(
                        self,
                        "switch from_keyword:{}, to_word_token:{}",
                        self.tree_name(&token),
                        self.symbol_name(word)
                    );
                    token.make_mut().set_symbol(word, &language);
                    lookahead = Some(token);
                    entry = word_entry;
                    continue;
                }
            }

            // The subtree below was reused too eagerly: split it and retry.
            if self.breakdown_top_of_stack(version) {
                state = self.stack.state(version);
                needs_lex = true;
                continue;
            }

            log!(self, "detect_error lookahead:{}", self.tree_name(&token));
            self.stack.pause(version, token);
            return Ok(());
        }
    }

    fn lex(&mut self, version: Version, parse_state: StateId) -> Option<Subtree> {
        let language = self.language.clone();
        let mut lex_mode = language.lex_mode(parse_state);
        if lex_mode.lex_state == u16::MAX {
            log!(self, "no_lookahead_after_non_terminal_extra");
            return None;
        }

        let start_position = self.stack.position(version);
        let external_token = self.stack.last_external_token(version).cloned();

        let mut found_external_token = false;
        let mut error_mode = parse_state == ERROR_STATE;
        let mut skipped_error = false;
        let mut called_get_column = false;
        let mut first_error_character = None;
        let mut error_start_position = Length::ZERO;
        let mut error_end_position = Length::ZERO;
        let mut lookahead_end_byte = 0;
        let mut external_state: Vec<u8> = Vec::new();
        let mut external_state_changed = false;
        self.lexer.reset(start_position);

        loop {
            let current_position = self.lexer.current_position;

            if lex_mode.external_lex_state != 0 && self.scanner.is_some() {
                log!(
                    self,
                    "lex_external state:{}, row:{}, column:{}",
                    lex_mode.external_lex_state,
                    current_position.extent.row,
                    current_position.extent.column
                );
                self.lexer.start();
                let mut found_token =
                    self.external_scan(external_token.as_ref(), lex_mode.external_lex_state);
                self.lexer.finish(&mut lookahead_end_byte);

                if found_token {
                    external_state = self.external_serialize();
                    let previous = external_token
                        .as_ref()
                        .map(|t| t.external_scanner_state())
                        .unwrap_or(&[]);
                    external_state_changed = previous != external_state.as_slice();

                    // Empty external tokens loop forever unless they change
                    // the scanner state or move the parser.
                    if self.lexer.token_end_position().bytes <= current_position.bytes
                        && !external_state_changed
                    {
                        let symbol = language
                            .external_symbol(self.lexer.result_symbol)
                            .unwrap_or(SYMBOL_ERROR);
                        let token_is_extra = language.next_state(parse_state, symbol) == parse_state;
                        if error_mode || !self.stack.has_advanced_since_error(version) || token_is_extra {
                            log!(self, "ignore_empty_external_token symbol:{}", self.symbol_name(symbol));
                            found_token = false;
                        }
                    }
                }

                if found_token {
                    found_external_token = true;
                    called_get_column = self.lexer.did_get_column;
                    break;
                }

                self.lexer.reset(current_position);
            }

            log!(
                self,
                "lex_internal state:{}, row:{}, column:{}",
                lex_mode.lex_state,
                current_position.extent.row,
                current_position.extent.column
            );
            self.lexer.start();
            let found_token = self.lexer.run_dfa(language.lex_table(), lex_mode.lex_state);
            self.lexer.finish(&mut lookahead_end_byte);
            if found_token {
                break;
            }

            if !error_mode {
                error_mode = true;
                lex_mode = language.lex_mode(ERROR_STATE);
                self.lexer.reset(start_position);
                continue;
            }

            if !skipped_error {
                log!(self, "skip_unrecognized_character");
                skipped_error = true;
                error_start_position = self.lexer.token_start_position;
                error_end_position = self.lexer.token_start_position;
                first_error_character = ScanLexer::lookahead(&self.lexer);
            }

            if self.lexer.current_position.bytes == error_end_position.bytes {
                if self.lexer.is_eof() {
                    self.lexer.result_symbol = SYMBOL_ERROR;
                    break;
                }
                self.lexer.advance(false);
            }

            error_end_position = self.lexer.current_position;
        }

        let result = if skipped_error {
            let padding = error_start_position.sub(start_position);
            let size = error_end_position.sub(error_start_position);
            let lookahead_bytes = lookahead_end_byte.saturating_sub(error_end_position.bytes);
            Subtree::new_error(
                &language,
                first_error_character,
                padding,
                size,
                lookahead_bytes,
                parse_state,
            )
        } else {
            let mut symbol = self.lexer.result_symbol;
            let token_start = self.lexer.token_start_position;
            let token_end = self.lexer.token_end_position();
            let padding = token_start.sub(start_position);
            let size = token_end.sub(token_start);
            let lookahead_bytes = lookahead_end_byte.saturating_sub(token_end.bytes);
            let mut is_keyword = false;

            if found_external_token {
                symbol = language.external_symbol(symbol).unwrap_or(SYMBOL_ERROR);
            } else if symbol != SYMBOL_END
                && language.keyword_capture_token() == Some(symbol)
                && let Some(keywords) = language.keyword_lex_table()
            {
                self.lexer.reset(token_start);
                self.lexer.start();
                is_keyword = self.lexer.run_dfa(keywords, 0);
                if is_keyword
                    && self.lexer.token_end_position().bytes == token_end.bytes
                    && language.has_actions(parse_state, self.lexer.result_symbol)
                {
                    symbol = self.lexer.result_symbol;
                }
            }

            let mut leaf = Subtree::new_leaf(
                &language,
                symbol,
                padding,
                size,
                lookahead_bytes,
                parse_state,
                LeafFlags {
                    has_external_tokens: found_external_token,
                    depends_on_column: called_get_column,
                    is_keyword,
                },
            );
            if found_external_token {
                let data = leaf.make_mut();
                data.external_scanner_state = Some(Arc::from(external_state));
                data.has_external_scanner_state_change = external_state_changed;
            }
            leaf
        };

        log!(
            self,
            Lex => "lexed_lookahead sym:{}, size:{}",
            self.tree_name(&result),
            result.total_size().bytes
        );
        Some(result)
    }

    fn external_scan(&mut self, external_token: Option<&Subtree>, external_lex_state: u16) -> bool {
        let Some(scanner) = self.scanner.as_mut() else {
            return false;
        };
        let Some(valid_symbols) = self.language.enabled_external_tokens(external_lex_state) else {
            return false;
        };
        let state = external_token
            .map(|t| t.external_scanner_state())
            .unwrap_or(&[]);
        scanner.deserialize(state);
        scanner.scan(&mut self.lexer, valid_symbols)
    }

    fn external_serialize(&mut self) -> Vec<u8> {
        let mut buffer = Vec::new();
        if let Some(scanner) = &self.scanner {
            scanner.serialize(&mut buffer);
        }
        buffer.truncate(SERIALIZATION_BUFFER_SIZE);
        buffer
    }

    fn cached_token(
        &mut self,
        state: StateId,
        position: u32,
        last_external_token: Option<&Subtree>,
    ) -> Option<Subtree> {
        let cache = self.token_cache.as_ref()?;
        if cache.byte_index != position
            || !external_scanner_state_eq(cache.last_external_token.as_ref(), last_external_token)
        {
            return None;
        }
        let token = cache.token.clone();
        let language = self.language.clone();
        let entry = language.table_entry(state, token.symbol);
        self.can_reuse_first_leaf(state, &token, entry).then_some(token)
    }

    fn can_reuse_first_leaf(&self, state: StateId, tree: &Subtree, entry: &TableEntry) -> bool {
        let language = &self.language;
        let current_lex_mode = language.lex_mode(state);
        let leaf_symbol = tree.leaf_symbol();
        let leaf_lex_mode = language.lex_mode(tree.leaf_parse_state());

        // No lookahead is lexed at the end of a non-terminal extra.
        if current_lex_mode.lex_state == u16::MAX {
            return false;
        }

        // Lexed under the same lexical rules: reusable.
        if !entry.actions.is_empty()
            && leaf_lex_mode == current_lex_mode
            && (language.keyword_capture_token() != Some(leaf_symbol)
                || (!tree.is_keyword && tree.parse_state == state))
        {
            return true;
        }

        if tree.size.bytes == 0 && leaf_symbol != SYMBOL_END {
            return false;
        }

        current_lex_mode.external_lex_state == 0 && entry.reusable
    }

    fn has_included_range_difference(&self, start: u32, end: u32) -> bool {
        for range in &self.included_range_differences[self.included_range_difference_index..] {
            if range.end_byte > start {
                return range.start_byte < end;
            }
        }
        false
    }

    fn reuse_node(
        &mut self,
        version: Version,
        state: &mut StateId,
        position: u32,
        last_external_token: Option<&Subtree>,
    ) -> Option<Subtree> {
        let language = self.language.clone();
        while let Some(result) = self.reusable.tree().cloned() {
            let byte_offset = self.reusable.byte_offset();
            let mut end_byte_offset = byte_offset + result.total_bytes();

            // Never reuse the end token while included ranges change later on.
            if result.is_eof() {
                end_byte_offset = u32::MAX;
            }

            if byte_offset > position {
                log!(self, "before_reusable_node symbol:{}", self.tree_name(&result));
                break;
            }

            if byte_offset < position {
                log!(self, "past_reusable_node symbol:{}", self.tree_name(&result));
                if end_byte_offset <= position || !self.reusable.descend() {
                    self.reusable.advance();
                }
                continue;
            }

            if !external_scanner_state_eq(self.reusable.last_external_token.as_ref(), last_external_token) {
                log!(
                    self,
                    "reusable_node_has_different_external_scanner_state symbol:{}",
                    self.tree_name(&result)
                );
                self.reusable.advance();
                continue;
            }

            let reason = if result.has_changes {
                Some("has_changes")
            } else if result.is_error() {
                Some("is_error")
            } else if result.is_missing {
                Some("is_missing")
            } else if result.is_fragile() {
                Some("is_fragile")
            } else if self.has_included_range_difference(byte_offset, end_byte_offset) {
                Some("contains_different_included_range")
            } else {
                None
            };

            if let Some(reason) = reason {
                log!(self, "cant_reuse_node_{reason} tree:{}", self.tree_name(&result));
                if !self.reusable.descend() {
                    self.reusable.advance();
                    self.breakdown_top_of_stack(version);
                    *state = self.stack.state(version);
                }
                continue;
            }

            let leaf_symbol = result.leaf_symbol();
            let entry = language.table_entry(*state, leaf_symbol);
            if !self.can_reuse_first_leaf(*state, &result, entry) {
                log!(
                    self,
                    "cant_reuse_node symbol:{}, first_leaf_symbol:{}",
                    self.tree_name(&result),
                    self.symbol_name(leaf_symbol)
                );
                self.reusable.advance_past_leaf();
                break;
            }

            log!(self, "reuse_node symbol:{}", self.tree_name(&result));
            tracing::trace!(symbol = result.symbol, byte_offset, "reused subtree");
            return Some(result);
        }
        None
    }

    /// Descends into the reused lookahead until reaching a subtree that was
    /// parsed in `state`.
    pub(crate) fn breakdown_lookahead(&mut self, lookahead: Subtree, state: StateId) -> Subtree {
        let mut descended = None;
        loop {
            let Some(tree) = self.reusable.tree().cloned() else {
                break;
            };
            if tree.child_count() == 0 || tree.parse_state == state {
                break;
            }
            log!(self, "state_mismatch sym:{}", self.tree_name(&tree));
            self.reusable.descend();
            descended = self.reusable.tree().cloned();
        }
        descended.unwrap_or(lookahead)
    }

    /// Replaces pending subtrees on top of the stack with their children.
    pub(crate) fn breakdown_top_of_stack(&mut self, version: Version) -> bool {
        let language = self.language.clone();
        let mut did_break_down = false;
        loop {
            let pop = self.stack.pop_pending(version);
            if pop.is_empty() {
                break;
            }

            did_break_down = true;
            let mut pending = false;
            for slice in pop {
                let mut state = self.stack.state(slice.version);
                let mut subtrees = slice.subtrees.into_iter();
                let Some(parent) = subtrees.next() else {
                    continue;
                };

                for child in &parent.children {
                    pending = child.child_count() > 0;
                    if child.is_error() {
                        state = ERROR_STATE;
                    } else if !child.extra {
                        state = language.next_state(state, child.symbol);
                    }
                    self.stack.push(slice.version, Some(child.clone()), pending, state);
                }

                for tree in subtrees {
                    self.stack.push(slice.version, Some(tree), false, state);
                }

                log!(self, "breakdown_top_of_stack tree:{}", self.tree_name(&parent));
                self.log_stack();
            }

            if !pending {
                break;
            }
        }
        did_break_down
    }

    fn shift(&mut self, version: Version, state: StateId, mut lookahead: Subtree, extra: bool) {
        let is_leaf = lookahead.child_count() == 0;
        if is_leaf {
            lookahead.set_extra(extra);
        }
        let last_external_token = lookahead.last_external_token();
        let has_external_tokens = lookahead.has_external_tokens;
        self.stack.push(version, Some(lookahead), !is_leaf, state);
        if has_external_tokens {
            self.stack.set_last_external_token(version, last_external_token);
        }
    }

    /// Pops `count` subtrees along every path and pushes a new parent over
    /// each. Returns the first version the reduction created, if any.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn reduce(
        &mut self,
        version: Version,
        symbol: Symbol,
        count: u32,
        dynamic_precedence: i32,
        production_id: u16,
        is_fragile: bool,
        end_of_non_terminal_extra: bool,
    ) -> Option<Version> {
        let language = self.language.clone();
        let initial_version_count = self.stack.version_count();

        let pop = self.stack.pop_count(version, count);
        let pop_len = pop.len();
        let halted_version_count = self.stack.halted_version_count();
        let mut removed_version_count = 0;
        let mut slices = pop.into_iter().peekable();

        while let Some(slice) = slices.next() {
            let slice_version = slice.version - removed_version_count;

            // New versions may overshoot the cap for a while, but only so far.
            if slice_version > MAX_VERSION_COUNT + MAX_VERSION_COUNT_OVERFLOW + halted_version_count {
                self.stack.remove_version(slice_version);
                removed_version_count += 1;
                while slices.next_if(|next| next.version == slice.version).is_some() {
                    log!(self, "aborting reduce with too many versions");
                }
                continue;
            }

            let mut children = slice.subtrees;
            let mut trailing_extras = remove_trailing_extras(&mut children);
            let mut parent = Subtree::new_node(&language, symbol, children, production_id);

            // Several paths reached the same version: keep the best children.
            while let Some(next) = slices.next_if(|next| next.version == slice.version) {
                let mut next_children = next.subtrees;
                let next_trailing = remove_trailing_extras(&mut next_children);
                if self.select_children(&parent, &next_children) {
                    trailing_extras = next_trailing;
                    parent = Subtree::new_node(&language, symbol, next_children, production_id);
                }
            }

            let state = self.stack.state(slice_version);
            let next_state = language.next_state(state, symbol);
            {
                let data = parent.make_mut();
                if end_of_non_terminal_extra && next_state == state {
                    data.extra = true;
                }
                if is_fragile || pop_len > 1 || initial_version_count > 1 {
                    data.fragile_left = true;
                    data.fragile_right = true;
                    data.parse_state = TREE_STATE_NONE;
                } else {
                    data.parse_state = state;
                }
                data.dynamic_precedence += dynamic_precedence;
            }

            self.stack.push(slice_version, Some(parent), false, next_state);
            for extra in trailing_extras {
                self.stack.push(slice_version, Some(extra), false, next_state);
            }

            for j in 0..slice_version {
                if j == version {
                    continue;
                }
                if self.stack.merge(j, slice_version) {
                    removed_version_count += 1;
                    break;
                }
            }
        }

        (self.stack.version_count() > initial_version_count).then_some(initial_version_count)
    }

    fn select_children(&mut self, left: &Subtree, children: &[Subtree]) -> bool {
        let scratch = Subtree::new_node(&self.language, left.symbol, children.to_vec(), 0);
        self.select_tree(Some(left), Some(&scratch))
    }

    /// Whether `right` should replace `left`.
    pub(crate) fn select_tree(&mut self, left: Option<&Subtree>, right: Option<&Subtree>) -> bool {
        let Some(left) = left else {
            return true;
        };
        let Some(right) = right else {
            return false;
        };

        if right.error_cost() < left.error_cost() {
            log!(self, "select_smaller_error symbol:{}, over_symbol:{}", self.tree_name(right), self.tree_name(left));
            return true;
        }
        if left.error_cost() < right.error_cost() {
            log!(self, "select_smaller_error symbol:{}, over_symbol:{}", self.tree_name(left), self.tree_name(right));
            return false;
        }
        if right.dynamic_precedence > left.dynamic_precedence {
            log!(
                self,
                "select_higher_precedence symbol:{}, prec:{}, over_symbol:{}, other_prec:{}",
                self.tree_name(right),
                right.dynamic_precedence,
                self.tree_name(left),
                left.dynamic_precedence
            );
            return true;
        }
        if left.dynamic_precedence > right.dynamic_precedence {
            log!(
                self,
                "select_higher_precedence symbol:{}, prec:{}, over_symbol:{}, other_prec:{}",
                self.tree_name(left),
                left.dynamic_precedence,
                self.tree_name(right),
                right.dynamic_precedence
            );
            return false;
        }
        if left.error_cost() > 0 {
            return true;
        }

        match left.compare(right) {
            CmpOrdering::Less => {
                log!(self, "select_earlier symbol:{}, over_symbol:{}", self.tree_name(left), self.tree_name(right));
                false
            }
            CmpOrdering::Greater => {
                log!(self, "select_earlier symbol:{}, over_symbol:{}", self.tree_name(right), self.tree_name(left));
                true
            }
            CmpOrdering::Equal => {
                log!(self, "select_existing symbol:{}, over_symbol:{}", self.tree_name(left), self.tree_name(right));
                false
            }
        }
    }

    /// Wraps everything on the stack into the root and keeps the best root
    /// seen so far.
    pub(crate) fn accept(&mut self, version: Version, lookahead: Subtree) {
        debug_assert!(lookahead.is_eof());
        let language = self.language.clone();
        self.stack.push(version, Some(lookahead), false, 1);

        let pop = self.stack.pop_all(version);
        let first_version = pop.first().map(|s| s.version);
        for slice in pop {
            let mut trees = slice.subtrees;
            let Some(index) = trees.iter().rposition(|t| !t.extra) else {
                continue;
            };
            let top = trees.remove(index);
            trees.splice(index..index, top.children.iter().cloned());
            let root = Subtree::new_node(&language, top.symbol, trees, top.production_id);
            self.accept_count += 1;

            let finished = self.finished_tree.take();
            self.finished_tree = match finished {
                Some(finished) if !self.select_tree(Some(&finished), Some(&root)) => Some(finished),
                _ => Some(root),
            };
        }

        if let Some(first_version) = first_version {
            self.stack.remove_version(first_version);
        }
        self.stack.halt(version);
    }

    pub(crate) fn version_status(&mut self, version: Version) -> ErrorStatus {
        let mut cost = self.stack.error_cost(version);
        let is_paused = self.stack.is_paused(version);
        if is_paused {
            cost += ERROR_COST_PER_SKIPPED_TREE;
        }
        ErrorStatus {
            cost,
            node_count: self.stack.node_count_since_error(version),
            dynamic_precedence: self.stack.dynamic_precedence(version),
            is_in_error: is_paused || self.stack.state(version) == ERROR_STATE,
        }
    }

    pub(crate) fn better_version_exists(&mut self, version: Version, is_in_error: bool, cost: u32) -> bool {
        if let Some(finished) = &self.finished_tree
            && finished.error_cost() <= cost
        {
            return true;
        }

        let position = self.stack.position(version);
        let status = ErrorStatus {
            cost,
            is_in_error,
            dynamic_precedence: self.stack.dynamic_precedence(version),
            node_count: self.stack.node_count_since_error(version),
        };

        for i in 0..self.stack.version_count() {
            if i == version
                || !self.stack.is_active(i)
                || self.stack.position(i).bytes < position.bytes
            {
                continue;
            }
            let status_i = self.version_status(i);
            match compare_versions(status, status_i) {
                ErrorComparison::TakeRight => return true,
                ErrorComparison::PreferRight if self.stack.can_merge(i, version) => return true,
                _ => {}
            }
        }
        false
    }

    /// Drops hopeless versions, orders the rest best-first and starts
    /// recovery on the best paused version. Returns the lowest error cost
    /// among versions that are not recovering.
    fn condense_stack(&mut self) -> u32 {
        let mut made_changes = false;
        let mut min_error_cost = u32::MAX;

        let mut i = 0;
        while i < self.stack.version_count() {
            if self.stack.is_halted(i) {
                self.stack.remove_version(i);
                continue;
            }

            let status_i = self.version_status(i);
            if !status_i.is_in_error && status_i.cost < min_error_cost {
                min_error_cost = status_i.cost;
            }

            let mut removed_i = false;
            let mut j = 0;
            while j < i {
                let status_j = self.version_status(j);
                match compare_versions(status_j, status_i) {
                    ErrorComparison::TakeLeft => {
                        made_changes = true;
                        self.stack.remove_version(i);
                        removed_i = true;
                        break;
                    }
                    ErrorComparison::PreferLeft | ErrorComparison::None => {
                        if self.stack.merge(j, i) {
                            made_changes = true;
                            removed_i = true;
                            break;
                        }
                    }
                    ErrorComparison::PreferRight => {
                        made_changes = true;
                        if self.stack.merge(j, i) {
                            removed_i = true;
                            break;
                        }
                        self.stack.swap_versions(i, j);
                    }
                    ErrorComparison::TakeRight => {
                        made_changes = true;
                        self.stack.remove_version(j);
                        i -= 1;
                        continue;
                    }
                }
                j += 1;
            }

            if !removed_i {
                i += 1;
            }
        }

        // Hard cap on live versions.
        while self.stack.version_count() > MAX_VERSION_COUNT {
            self.stack.remove_version(MAX_VERSION_COUNT);
            made_changes = true;
        }

        // Resume the best paused version if nothing better is running;
        // drop the other paused ones.
        if self.stack.version_count() > 0 {
            let mut has_unpaused_version = false;
            let mut count = self.stack.version_count();
            let mut i = 0;
            while i < count {
                if self.stack.is_paused(i) {
                    if !has_unpaused_version && self.accept_count < MAX_VERSION_COUNT {
                        log!(self, "resume version:{i}");
                        min_error_cost = self.stack.error_cost(i);
                        if let Some(lookahead) = self.stack.resume(i) {
                            self.handle_error(i, lookahead);
                        }
                        has_unpaused_version = true;
                    } else {
                        self.stack.remove_version(i);
                        made_changes = true;
                        count -= 1;
                        continue;
                    }
                } else {
                    has_unpaused_version = true;
                }
                i += 1;
            }
        }

        if made_changes {
            log!(self, "condense");
            self.log_stack();
        }

        min_error_cost
    }
}
