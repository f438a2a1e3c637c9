//! Error recovery.
//!
//! When no version can consume the lookahead, the best paused version is
//! resumed here. Recovery either inserts a zero-width missing token, pops
//! back to an earlier state in which the lookahead is valid, or skips the
//! lookahead into an error node and tries again with the next token.

use thicket_core::{ERROR_STATE, ParseAction, StateId, Symbol, SYMBOL_ERROR_REPEAT};
use thicket_tree::Subtree;
use thicket_tree::subtree::{
    ERROR_COST_PER_SKIPPED_CHAR, ERROR_COST_PER_SKIPPED_LINE, ERROR_COST_PER_SKIPPED_TREE,
};

use crate::session::{MAX_SUMMARY_DEPTH, MAX_VERSION_COUNT, Session, log, remove_trailing_extras};
use crate::stack::Version;

#[derive(Clone, Copy)]
struct ReduceAction {
    symbol: Symbol,
    count: u32,
    dynamic_precedence: i32,
    production_id: u16,
}

impl Session<'_> {
    pub(crate) fn handle_error(&mut self, version: Version, mut lookahead: Subtree) {
        let language = self.language.clone();
        let previous_version_count = self.stack.version_count();

        // A skipped token may have unblocked reductions that need no lookahead.
        self.do_all_potential_reductions(version, 0);
        let version_count = self.stack.version_count();
        let position = self.stack.position(version);

        // Mark a discontinuity on every version created above.
        let mut did_insert_missing_token = false;
        let mut v = version;
        while v < version_count {
            if !did_insert_missing_token {
                let state = self.stack.state(v);
                for missing_symbol in 1..language.token_count() {
                    let state_after_missing = language.next_state(state, missing_symbol);
                    if state_after_missing == 0 || state_after_missing == state {
                        continue;
                    }
                    if !language.has_reduce_action(state_after_missing, lookahead.leaf_symbol()) {
                        continue;
                    }

                    // Outside any included range the lexer snaps forward,
                    // which places the missing token inside the next range.
                    self.lexer.reset(position);
                    self.lexer.mark_end();
                    let padding = self.lexer.token_end_position().sub(position);
                    let lookahead_bytes = lookahead.total_bytes() + lookahead.lookahead_bytes;

                    let version_with_missing_tree = self.stack.copy_version(v);
                    let missing_tree =
                        Subtree::new_missing_leaf(&language, missing_symbol, padding, lookahead_bytes);
                    self.stack.push(
                        version_with_missing_tree,
                        Some(missing_tree),
                        false,
                        state_after_missing,
                    );

                    if self.do_all_potential_reductions(
                        version_with_missing_tree,
                        lookahead.leaf_symbol(),
                    ) {
                        log!(
                            self,
                            "recover_with_missing symbol:{}, state:{}",
                            self.symbol_name(missing_symbol),
                            self.stack.state(version_with_missing_tree)
                        );
                        did_insert_missing_token = true;
                        break;
                    }
                }
            }

            self.stack.push(v, None, false, ERROR_STATE);
            v = if v == version {
                previous_version_count
            } else {
                v + 1
            };
        }

        for _ in previous_version_count..version_count {
            let did_merge = self.stack.merge(version, previous_version_count);
            debug_assert!(did_merge, "recovery versions share the error discontinuity");
        }

        self.stack.record_summary(version, MAX_SUMMARY_DEPTH);

        // Recover with this lookahead now so its lookahead bytes are counted.
        if lookahead.child_count() > 0 {
            lookahead = self.breakdown_lookahead(lookahead, ERROR_STATE);
        }
        self.recover(version, lookahead);

        self.log_stack();
    }

    /// Performs every reduction available in the version's state, for the
    /// given lookahead or (with `0`) for any terminal. Returns whether some
    /// resulting version can shift that lookahead.
    pub(crate) fn do_all_potential_reductions(
        &mut self,
        starting_version: Version,
        lookahead_symbol: Symbol,
    ) -> bool {
        let language = self.language.clone();
        let initial_version_count = self.stack.version_count();

        let mut can_shift_lookahead_symbol = false;
        let mut version = starting_version;
        let mut reduce_actions: Vec<ReduceAction> = Vec::new();
        let mut i = 0;
        loop {
            let version_count = self.stack.version_count();
            if version >= version_count {
                break;
            }
            let iteration = i;
            i += 1;

            let merged = (initial_version_count..version).any(|j| self.stack.merge(j, version));
            if merged {
                continue;
            }

            let state = self.stack.state(version);
            let mut has_shift_action = false;
            reduce_actions.clear();

            let symbols = if lookahead_symbol != 0 {
                lookahead_symbol..lookahead_symbol + 1
            } else {
                1..language.token_count()
            };

            for symbol in symbols {
                for action in language.actions(state, symbol) {
                    match *action {
                        ParseAction::Shift {
                            extra, repetition, ..
                        } => {
                            if !extra && !repetition {
                                has_shift_action = true;
                            }
                        }
                        ParseAction::Recover => has_shift_action = true,
                        ParseAction::Reduce {
                            symbol,
                            child_count,
                            dynamic_precedence,
                            production_id,
                        } if child_count > 0 => {
                            let count = child_count as u32;
                            if !reduce_actions
                                .iter()
                                .any(|a| a.symbol == symbol && a.count == count)
                            {
                                reduce_actions.push(ReduceAction {
                                    symbol,
                                    count,
                                    dynamic_precedence: dynamic_precedence as i32,
                                    production_id,
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }

            let mut reduction_version = None;
            for action in &reduce_actions {
                reduction_version = self.reduce(
                    version,
                    action.symbol,
                    action.count,
                    action.dynamic_precedence,
                    action.production_id,
                    true,
                    false,
                );
            }

            if has_shift_action {
                can_shift_lookahead_symbol = true;
            } else if let Some(reduced) = reduction_version
                && iteration < MAX_VERSION_COUNT
            {
                self.stack.renumber_version(reduced, version);
                continue;
            } else if lookahead_symbol != 0 {
                self.stack.remove_version(version);
            }

            if version == starting_version {
                version = version_count;
            } else {
                version += 1;
            }
        }

        can_shift_lookahead_symbol
    }

    pub(crate) fn recover(&mut self, version: Version, mut lookahead: Subtree) {
        let language = self.language.clone();
        let mut did_recover = false;
        let previous_version_count = self.stack.version_count();
        let position = self.stack.position(version);
        let summary = self.stack.summary(version);
        let node_count_since_error = self.stack.node_count_since_error(version);
        let current_error_cost = self.stack.error_cost(version);

        // Look for an earlier state in which the lookahead is valid.
        if let Some(summary) = summary
            && !lookahead.is_error()
        {
            for entry in summary.iter() {
                if entry.state == ERROR_STATE || entry.position.bytes == position.bytes {
                    continue;
                }
                let mut depth = entry.depth;
                if node_count_since_error > 0 {
                    depth += 1;
                }

                // Skip recoveries that would only duplicate a live version.
                let would_merge = (0..previous_version_count).any(|j| {
                    self.stack.state(j) == entry.state
                        && self.stack.position(j).bytes == position.bytes
                });
                if would_merge {
                    continue;
                }

                let new_cost = current_error_cost
                    + entry.depth * ERROR_COST_PER_SKIPPED_TREE
                    + (position.bytes - entry.position.bytes) * ERROR_COST_PER_SKIPPED_CHAR
                    + (position.extent.row - entry.position.extent.row)
                        * ERROR_COST_PER_SKIPPED_LINE;
                if self.better_version_exists(version, false, new_cost) {
                    break;
                }

                if language.has_actions(entry.state, lookahead.symbol)
                    && self.recover_to_state(version, depth, entry.state)
                {
                    did_recover = true;
                    log!(self, "recover_to_previous state:{}, depth:{depth}", entry.state);
                    self.log_stack();
                    break;
                }
            }
        }

        // Drop versions that were created and halted while trying.
        let mut i = previous_version_count;
        while i < self.stack.version_count() {
            if !self.stack.is_active(i) {
                log!(self, "removed paused version:{i}");
                self.stack.remove_version(i);
                self.log_stack();
            } else {
                i += 1;
            }
        }

        // Still in error at the end of input: wrap everything and finish.
        if lookahead.is_eof() {
            log!(self, "recover_eof");
            let parent = Subtree::new_error_node(&language, Vec::new(), false);
            self.stack.push(version, Some(parent), false, 1);
            self.accept(version, lookahead);
            return;
        }

        if did_recover
            && (self.stack.version_count() > MAX_VERSION_COUNT
                || lookahead.has_external_scanner_state_change)
        {
            self.stack.halt(version);
            return;
        }

        let new_cost = current_error_cost
            + ERROR_COST_PER_SKIPPED_TREE
            + lookahead.total_bytes() * ERROR_COST_PER_SKIPPED_CHAR
            + lookahead.total_size().extent.row * ERROR_COST_PER_SKIPPED_LINE;
        if self.better_version_exists(version, false, new_cost) {
            self.stack.halt(version);
            return;
        }

        // Skipped extras do not count toward the error cost.
        if let Some(ParseAction::Shift { extra: true, .. }) =
            language.actions(1, lookahead.symbol).last()
        {
            lookahead.set_extra(true);
        }

        log!(self, "skip_token symbol:{}", self.tree_name(&lookahead));
        let has_external_tokens = lookahead.has_external_tokens;
        let last_external_token = lookahead.last_external_token();
        let mut error_repeat = Subtree::new_node(&language, SYMBOL_ERROR_REPEAT, vec![lookahead], 0);

        // Fold into the repeat node left by earlier skipped tokens.
        if node_count_since_error > 0 {
            let mut pop = self.stack.pop_count(version, 1);
            if pop.len() > 1 {
                // Several merged paths: keep the first error arbitrarily.
                pop.truncate(1);
                let keep = pop[0].version;
                while self.stack.version_count() > keep + 1 {
                    self.stack.remove_version(keep + 1);
                }
            }
            if let Some(slice) = pop.pop() {
                self.stack.renumber_version(slice.version, version);
                let mut children = slice.subtrees;
                children.push(error_repeat);
                error_repeat = Subtree::new_node(&language, SYMBOL_ERROR_REPEAT, children, 0);
            }
        }

        self.stack.push(version, Some(error_repeat), false, ERROR_STATE);
        if has_external_tokens {
            self.stack.set_last_external_token(version, last_external_token);
        }

        let version_count = self.stack.version_count();
        let all_in_error = (0..version_count).all(|i| self.version_status(i).is_in_error);
        self.has_error = all_in_error;
    }

    /// Pops `depth` subtrees, wrapping them into an error node, so that the
    /// version is back in `goal_state`.
    pub(crate) fn recover_to_state(&mut self, version: Version, depth: u32, goal_state: StateId) -> bool {
        let language = self.language.clone();
        let pop = self.stack.pop_count(version, depth);
        let mut previous_version = None;

        for slice in pop {
            if Some(slice.version) == previous_version {
                continue;
            }

            if self.stack.state(slice.version) != goal_state {
                self.stack.halt(slice.version);
                continue;
            }

            let mut subtrees = slice.subtrees;
            let error_trees = self.stack.pop_error(slice.version);
            if let Some(error_tree) = error_trees.into_iter().next()
                && error_tree.child_count() > 0
            {
                subtrees.splice(0..0, error_tree.children.iter().cloned());
            }

            let trailing_extras = remove_trailing_extras(&mut subtrees);

            if !subtrees.is_empty() {
                let error = Subtree::new_error_node(&language, subtrees, true);
                self.stack.push(slice.version, Some(error), false, goal_state);
            }

            for tree in trailing_extras {
                self.stack.push(slice.version, Some(tree), false, goal_state);
            }

            previous_version = Some(slice.version);
        }

        previous_version.is_some()
    }
}
