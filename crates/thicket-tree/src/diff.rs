//! Lock-step comparison of an edited tree with its reparse.
//!
//! Two walkers move over the subtree structure in byte order. A walker sits
//! either on a visible node or in the padding before one. Pairs that provably
//! match are skipped whole, pairs that may differ are descended into, and
//! anything else is reported. Visible nodes that one walker passes over
//! without a counterpart in the other tree are reported too.

use thicket_core::{ERROR_STATE, Language, Length, Range, SYMBOL_ERROR, Symbol};

use crate::subtree::{Subtree, TREE_STATE_NONE, external_scanner_state_eq};
use crate::tree::Tree;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Comparison {
    Matches,
    MayDiffer,
    Differs,
}

#[derive(Clone, Copy)]
struct Frame<'a> {
    subtree: &'a Subtree,
    /// Absolute position where the subtree's padding starts.
    position: Length,
    child_index: usize,
    structural_child_index: usize,
}

struct Walker<'a> {
    stack: Vec<Frame<'a>>,
    language: &'a Language,
    visible_depth: u32,
    in_padding: bool,
    prev_external_token: Option<Subtree>,
}

impl<'a> Walker<'a> {
    fn new(root: &'a Subtree, language: &'a Language) -> Self {
        Self {
            stack: vec![Frame {
                subtree: root,
                position: Length::ZERO,
                child_index: 0,
                structural_child_index: 0,
            }],
            language,
            visible_depth: 1,
            in_padding: false,
            prev_external_token: None,
        }
    }

    fn done(&self) -> bool {
        self.stack.is_empty()
    }

    fn start_position(&self) -> Length {
        match self.stack.last() {
            Some(top) if self.in_padding => top.position,
            Some(top) => top.position.add(top.subtree.padding),
            None => Length::ZERO,
        }
    }

    fn end_position(&self) -> Length {
        let Some(top) = self.stack.last() else {
            return Length::ZERO;
        };
        let start = top.position.add(top.subtree.padding);
        if self.in_padding {
            start
        } else {
            start.add(top.subtree.size)
        }
    }

    fn alias_at(&self, depth: usize) -> Symbol {
        if depth == 0 {
            return 0;
        }
        let frame = &self.stack[depth];
        if frame.subtree.extra {
            return 0;
        }
        let parent = self.stack[depth - 1].subtree;
        self.language
            .alias_at(parent.production_id, frame.structural_child_index)
    }

    fn is_visible(&self) -> bool {
        let Some(top) = self.stack.last() else {
            return false;
        };
        top.subtree.visible || self.alias_at(self.stack.len() - 1) != 0
    }

    /// The innermost visible node at the walker: the node itself, or its
    /// closest visible ancestor while in padding.
    fn visible_state(&self) -> Option<(&'a Subtree, Symbol, u32)> {
        let mut depth = self.stack.len().checked_sub(1)?;
        if self.in_padding {
            depth = depth.checked_sub(1)?;
        }
        loop {
            let frame = self.stack[depth];
            let alias = self.alias_at(depth);
            if frame.subtree.visible || alias != 0 {
                return Some((frame.subtree, alias, frame.position.bytes));
            }
            depth = depth.checked_sub(1)?;
        }
    }

    fn visible_symbol(&self) -> Symbol {
        match self.stack.last() {
            Some(top) => match self.alias_at(self.stack.len() - 1) {
                0 => top.subtree.symbol,
                alias => alias,
            },
            None => 0,
        }
    }

    fn note_external_token(&mut self, subtree: &Subtree) {
        if let Some(token) = subtree.last_external_token() {
            self.prev_external_token = Some(token);
        }
    }

    /// Moves to the first visible descendant ending after `goal`, landing in
    /// its padding when the padding covers `goal`. Hidden nodes on the way
    /// stay on the stack even when nothing visible is found.
    fn descend(&mut self, goal: u32) -> bool {
        if self.in_padding {
            return false;
        }
        loop {
            let Some(&top) = self.stack.last() else {
                return false;
            };
            let mut position = top.position;
            let mut structural_child_index = 0;
            let mut entered = false;
            for (child_index, child) in top.subtree.children.iter().enumerate() {
                let left = position.add(child.padding);
                let right = left.add(child.size);
                if right.bytes > goal {
                    self.stack.push(Frame {
                        subtree: child,
                        position,
                        child_index,
                        structural_child_index,
                    });
                    if self.is_visible() {
                        if left.bytes > goal {
                            self.in_padding = true;
                        } else {
                            self.visible_depth += 1;
                        }
                        return true;
                    }
                    entered = true;
                    break;
                }
                position = right;
                if !child.extra {
                    structural_child_index += 1;
                }
                self.note_external_token(child);
            }
            if !entered {
                return false;
            }
        }
    }

    fn advance(&mut self) {
        if self.in_padding {
            self.in_padding = false;
            if self.is_visible() {
                self.visible_depth += 1;
            } else {
                self.descend(0);
            }
            return;
        }

        loop {
            if self.is_visible() {
                self.visible_depth = self.visible_depth.saturating_sub(1);
            }
            let Some(left) = self.stack.pop() else {
                return;
            };
            let Some(&parent) = self.stack.last() else {
                return;
            };
            self.note_external_token(left.subtree);

            let child_index = left.child_index + 1;
            if let Some(next) = parent.subtree.children.get(child_index) {
                self.stack.push(Frame {
                    subtree: next,
                    position: left.position.add(left.subtree.total_size()),
                    child_index,
                    structural_child_index: left.structural_child_index
                        + usize::from(!left.subtree.extra),
                });
                if self.is_visible() {
                    if next.padding.bytes > 0 {
                        self.in_padding = true;
                    } else {
                        self.visible_depth += 1;
                    }
                } else {
                    self.descend(0);
                }
                return;
            }
        }
    }

    fn ascend(&mut self) {
        if self.done() {
            return;
        }
        if self.is_visible() && !self.in_padding {
            self.visible_depth = self.visible_depth.saturating_sub(1);
        }
        if self.stack.last().is_some_and(|top| top.child_index > 0) {
            self.in_padding = false;
        }
        self.stack.pop();
    }

    /// Advances until the walker ends past `goal`. Visible nodes entered and
    /// left again without being compared are recorded in `skipped`.
    fn catch_up(&mut self, goal: u32, skipped: &mut Vec<Symbol>) {
        let mut compared = true;
        while !self.done() && self.end_position().bytes <= goal {
            if !compared && !self.in_padding && self.is_visible() {
                skipped.push(self.visible_symbol());
            }
            compared = false;
            self.advance();
        }
    }
}

fn compare(old: &Walker<'_>, new: &Walker<'_>) -> Comparison {
    let (old_state, new_state) = match (old.visible_state(), new.visible_state()) {
        (None, None) => return Comparison::Matches,
        (Some(old_state), Some(new_state)) => (old_state, new_state),
        _ => return Comparison::Differs,
    };
    let (old_tree, old_alias, old_start) = old_state;
    let (new_tree, new_alias, new_start) = new_state;
    if old_alias != new_alias || old_tree.symbol != new_tree.symbol {
        return Comparison::Differs;
    }

    let old_state = old_tree.parse_state;
    let new_state = new_tree.parse_state;
    let may_differ = old_start != new_start
        || old_tree.symbol == SYMBOL_ERROR
        || old_tree.size.bytes != new_tree.size.bytes
        || old_state == TREE_STATE_NONE
        || new_state == TREE_STATE_NONE
        || (old_state == ERROR_STATE) != (new_state == ERROR_STATE)
        || old_tree.error_cost() != new_tree.error_cost()
        || old_tree.has_external_tokens != new_tree.has_external_tokens
        || old_tree.has_changes
        || (old_tree.has_external_tokens
            && !external_scanner_state_eq(
                old.prev_external_token.as_ref(),
                new.prev_external_token.as_ref(),
            ));
    if may_differ {
        Comparison::MayDiffer
    } else {
        Comparison::Matches
    }
}

fn push_range(ranges: &mut Vec<Range>, start: Length, end: Length) {
    if start.bytes >= end.bytes {
        return;
    }
    if let Some(last) = ranges.last_mut()
        && start.bytes <= last.end_byte
    {
        if end.bytes > last.end_byte {
            last.end_byte = end.bytes;
            last.end_point = end.extent;
        }
        return;
    }
    ranges.push(Range::new(start.bytes, end.bytes, start.extent, end.extent));
}

fn min_length(a: Length, b: Length) -> Length {
    if a.bytes <= b.bytes { a } else { b }
}

/// Whether any of `ranges[from..]` overlaps `start..end`.
fn intersects(ranges: &[Range], from: usize, start: u32, end: u32) -> bool {
    ranges[from..]
        .iter()
        .take_while(|range| range.start_byte < end)
        .any(|range| range.end_byte > start)
}

pub(crate) fn changed_ranges(old: &Tree, new: &Tree) -> Vec<Range> {
    let included = included_range_differences(old.included_ranges(), new.included_ranges());
    let mut ranges = Vec::new();
    let mut old_walk = Walker::new(old.root_subtree(), old.language());
    let mut new_walk = Walker::new(new.root_subtree(), new.language());
    let mut included_index = 0;
    let mut old_skipped = Vec::new();
    let mut new_skipped = Vec::new();

    let mut position = old_walk.start_position();
    let new_start = new_walk.start_position();
    if position.bytes < new_start.bytes {
        push_range(&mut ranges, position, new_start);
        position = new_start;
    } else if new_start.bytes < position.bytes {
        push_range(&mut ranges, new_start, position);
    }

    loop {
        let mut comparison = compare(&old_walk, &new_walk);
        if comparison == Comparison::Matches
            && intersects(
                &included,
                included_index,
                position.bytes,
                old_walk.end_position().bytes,
            )
        {
            comparison = Comparison::MayDiffer;
        }

        let mut is_changed = false;
        let next_position = match comparison {
            Comparison::Matches => old_walk.end_position(),
            Comparison::MayDiffer => {
                if old_walk.descend(position.bytes) {
                    if new_walk.descend(position.bytes) {
                        position
                    } else {
                        is_changed = true;
                        old_walk.end_position()
                    }
                } else if new_walk.descend(position.bytes) {
                    is_changed = true;
                    new_walk.end_position()
                } else {
                    min_length(old_walk.end_position(), new_walk.end_position())
                }
            }
            Comparison::Differs => {
                is_changed = true;
                min_length(old_walk.end_position(), new_walk.end_position())
            }
        };

        old_skipped.clear();
        new_skipped.clear();
        old_walk.catch_up(next_position.bytes, &mut old_skipped);
        new_walk.catch_up(next_position.bytes, &mut new_skipped);
        if old_skipped != new_skipped {
            is_changed = true;
        }

        while old_walk.visible_depth > new_walk.visible_depth {
            old_walk.ascend();
        }
        while new_walk.visible_depth > old_walk.visible_depth {
            new_walk.ascend();
        }

        if is_changed {
            push_range(&mut ranges, position, next_position);
        }
        position = next_position;

        while included
            .get(included_index)
            .is_some_and(|range| range.end_byte <= position.bytes)
        {
            included_index += 1;
        }

        if old_walk.done() || new_walk.done() {
            break;
        }
    }

    let old_size = old.root_subtree().total_size();
    let new_size = new.root_subtree().total_size();
    if old_size.bytes < new_size.bytes {
        push_range(&mut ranges, old_size, new_size);
    } else if new_size.bytes < old_size.bytes {
        push_range(&mut ranges, new_size, old_size);
    }

    for range in included {
        insert_range(&mut ranges, range);
    }

    tracing::debug!(count = ranges.len(), "changed ranges");
    ranges
}

/// Ranges covered by one tree's included ranges but not the other's, sorted.
fn included_range_differences(old: &[Range], new: &[Range]) -> Vec<Range> {
    let mut out = Vec::new();
    for i in 0..old.len().max(new.len()) {
        match (old.get(i), new.get(i)) {
            (Some(a), Some(b)) if a == b => {}
            (Some(a), Some(b)) => out.push(a.union(b)),
            (Some(r), None) | (None, Some(r)) => out.push(*r),
            (None, None) => {}
        }
    }
    out.sort_by_key(|r| r.start_byte);
    out
}

/// Inserts keeping the list sorted and disjoint.
fn insert_range(ranges: &mut Vec<Range>, range: Range) {
    if range.start_byte >= range.end_byte {
        return;
    }
    ranges.push(range);
    ranges.sort_by_key(|r| r.start_byte);
    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
    for r in ranges.drain(..) {
        match merged.last_mut() {
            Some(last) if r.start_byte <= last.end_byte => {
                if r.end_byte > last.end_byte {
                    last.end_byte = r.end_byte;
                    last.end_point = r.end_point;
                }
            }
            _ => merged.push(r),
        }
    }
    *ranges = merged;
}
