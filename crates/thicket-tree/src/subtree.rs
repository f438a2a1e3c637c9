//! Persistent syntax tree storage.
//!
//! A [`Subtree`] is a reference-counted record describing one grammar
//! symbol and its children. Trees produced by successive parses share
//! every subtree the reuse engine kept; edits copy only the path from the
//! root to the changed region.
//!
//! Sizes are relative: each subtree stores the whitespace before it
//! (`padding`) and its own `size`, never an absolute offset.

use std::cmp::Ordering;
use std::ops::Deref;
use std::sync::Arc;

use thicket_core::{
    InputEdit, Language, Length, SYMBOL_END, SYMBOL_ERROR, SYMBOL_ERROR_REPEAT, StateId, Symbol,
};

pub const ERROR_COST_PER_RECOVERY: u32 = 500;
pub const ERROR_COST_PER_MISSING_TREE: u32 = 110;
pub const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;
pub const ERROR_COST_PER_SKIPPED_LINE: u32 = 30;
pub const ERROR_COST_PER_SKIPPED_CHAR: u32 = 1;

/// Parse state recorded on subtrees that must never be reused as-is.
pub const TREE_STATE_NONE: StateId = StateId::MAX;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FirstLeaf {
    pub symbol: Symbol,
    pub parse_state: StateId,
}

#[derive(Clone, Debug)]
pub struct SubtreeData {
    pub symbol: Symbol,
    pub padding: Length,
    pub size: Length,
    /// How far past its end the lexer looked while producing this subtree.
    pub lookahead_bytes: u32,
    pub parse_state: StateId,
    pub error_cost: u32,
    pub children: Vec<Subtree>,
    pub production_id: u16,
    pub dynamic_precedence: i32,
    pub repeat_depth: u32,
    pub visible_child_count: u32,
    pub named_child_count: u32,
    pub visible_descendant_count: u32,
    pub node_count: u32,
    pub first_leaf: FirstLeaf,
    /// Scanner state serialized after this token was scanned.
    pub external_scanner_state: Option<Arc<[u8]>>,
    /// First character of an unexpected-character error leaf.
    pub lookahead_char: Option<char>,
    pub visible: bool,
    pub named: bool,
    pub extra: bool,
    pub fragile_left: bool,
    pub fragile_right: bool,
    pub has_changes: bool,
    pub has_external_tokens: bool,
    pub has_external_scanner_state_change: bool,
    pub depends_on_column: bool,
    pub is_missing: bool,
    pub is_keyword: bool,
}

/// Shared handle to a [`SubtreeData`].
#[derive(Clone, Debug)]
pub struct Subtree(Arc<SubtreeData>);

impl Deref for Subtree {
    type Target = SubtreeData;

    fn deref(&self) -> &SubtreeData {
        &self.0
    }
}

/// Properties of a freshly lexed token.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeafFlags {
    pub has_external_tokens: bool,
    pub depends_on_column: bool,
    pub is_keyword: bool,
}

impl SubtreeData {
    fn blank(symbol: Symbol, language: &Language) -> Self {
        Self {
            symbol,
            padding: Length::ZERO,
            size: Length::ZERO,
            lookahead_bytes: 0,
            parse_state: 0,
            error_cost: 0,
            children: Vec::new(),
            production_id: 0,
            dynamic_precedence: 0,
            repeat_depth: 0,
            visible_child_count: 0,
            named_child_count: 0,
            visible_descendant_count: 0,
            node_count: 1,
            first_leaf: FirstLeaf::default(),
            external_scanner_state: None,
            lookahead_char: None,
            visible: language.node_kind_is_visible(symbol),
            named: language.node_kind_is_named(symbol),
            extra: false,
            fragile_left: false,
            fragile_right: false,
            has_changes: false,
            has_external_tokens: false,
            has_external_scanner_state_change: false,
            depends_on_column: false,
            is_missing: false,
            is_keyword: false,
        }
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn total_size(&self) -> Length {
        self.padding.add(self.size)
    }

    #[inline]
    pub fn total_bytes(&self) -> u32 {
        self.padding.bytes + self.size.bytes
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.symbol == SYMBOL_ERROR
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.symbol == SYMBOL_END
    }

    #[inline]
    pub fn is_fragile(&self) -> bool {
        self.fragile_left || self.fragile_right
    }

    /// Error cost, counting a missing token as a recovery.
    pub fn error_cost(&self) -> u32 {
        if self.is_missing {
            ERROR_COST_PER_MISSING_TREE + ERROR_COST_PER_RECOVERY
        } else {
            self.error_cost
        }
    }

    pub fn leaf_symbol(&self) -> Symbol {
        if self.children.is_empty() {
            self.symbol
        } else {
            self.first_leaf.symbol
        }
    }

    pub fn leaf_parse_state(&self) -> StateId {
        if self.children.is_empty() {
            self.parse_state
        } else {
            self.first_leaf.parse_state
        }
    }

    /// Scanner state a leaf carries; empty for everything else.
    pub fn external_scanner_state(&self) -> &[u8] {
        if self.has_external_tokens && self.children.is_empty() {
            self.external_scanner_state.as_deref().unwrap_or(&[])
        } else {
            &[]
        }
    }

    pub fn set_symbol(&mut self, symbol: Symbol, language: &Language) {
        self.symbol = symbol;
        self.visible = language.node_kind_is_visible(symbol);
        self.named = language.node_kind_is_named(symbol);
    }

    /// Recomputes every aggregate derived from the children.
    pub fn summarize_children(&mut self, language: &Language) {
        self.named_child_count = 0;
        self.visible_child_count = 0;
        self.error_cost = 0;
        self.repeat_depth = 0;
        self.visible_descendant_count = 0;
        self.node_count = 1;
        self.has_external_tokens = false;
        self.depends_on_column = false;
        self.has_external_scanner_state_change = false;
        self.dynamic_precedence = 0;

        let is_error_parent = self.symbol == SYMBOL_ERROR || self.symbol == SYMBOL_ERROR_REPEAT;
        let mut structural_index = 0usize;
        let mut lookahead_end_byte = 0u32;

        for (i, child) in self.children.iter().enumerate() {
            if self.size.extent.row == 0 && child.depends_on_column {
                self.depends_on_column = true;
            }
            if child.has_external_scanner_state_change {
                self.has_external_scanner_state_change = true;
            }

            if i == 0 {
                self.padding = child.padding;
                self.size = child.size;
            } else {
                self.size = self.size.add(child.total_size());
            }

            let child_lookahead_end =
                self.padding.bytes + self.size.bytes + child.lookahead_bytes;
            lookahead_end_byte = lookahead_end_byte.max(child_lookahead_end);

            if child.symbol != SYMBOL_ERROR_REPEAT {
                self.error_cost += child.error_cost();
            }

            let grandchild_count = child.children.len();
            if is_error_parent
                && !child.extra
                && !(child.is_error() && grandchild_count == 0)
            {
                if child.visible {
                    self.error_cost += ERROR_COST_PER_SKIPPED_TREE;
                } else if grandchild_count > 0 {
                    self.error_cost += ERROR_COST_PER_SKIPPED_TREE * child.visible_child_count;
                }
            }

            self.dynamic_precedence += child.dynamic_precedence;
            self.visible_descendant_count += child.visible_descendant_count;
            self.node_count += child.node_count;

            let alias = if child.extra {
                0
            } else {
                language.alias_at(self.production_id, structural_index)
            };
            if alias != 0 {
                self.visible_descendant_count += 1;
                self.visible_child_count += 1;
                if language.node_kind_is_named(alias) {
                    self.named_child_count += 1;
                }
            } else if child.visible {
                self.visible_descendant_count += 1;
                self.visible_child_count += 1;
                if child.named {
                    self.named_child_count += 1;
                }
            } else if grandchild_count > 0 {
                self.visible_child_count += child.visible_child_count;
                self.named_child_count += child.named_child_count;
            }

            if child.has_external_tokens {
                self.has_external_tokens = true;
            }

            if child.is_error() {
                self.fragile_left = true;
                self.fragile_right = true;
                self.parse_state = TREE_STATE_NONE;
            }

            if !child.extra {
                structural_index += 1;
            }
        }

        self.lookahead_bytes = lookahead_end_byte
            .saturating_sub(self.size.bytes)
            .saturating_sub(self.padding.bytes);

        if is_error_parent {
            self.error_cost += ERROR_COST_PER_RECOVERY
                + ERROR_COST_PER_SKIPPED_CHAR * self.size.bytes
                + ERROR_COST_PER_SKIPPED_LINE * self.size.extent.row;
        }

        if let (Some(first), Some(last)) = (self.children.first(), self.children.last()) {
            self.first_leaf = FirstLeaf {
                symbol: first.leaf_symbol(),
                parse_state: first.leaf_parse_state(),
            };
            if first.fragile_left {
                self.fragile_left = true;
            }
            if last.fragile_right {
                self.fragile_right = true;
            }
            if self.children.len() >= 2
                && !self.visible
                && !self.named
                && first.symbol == self.symbol
            {
                self.repeat_depth = first.repeat_depth.max(last.repeat_depth) + 1;
            }
        }
    }
}

impl Drop for SubtreeData {
    // Deep left-recursive chains would otherwise overflow the stack when
    // the last handle goes away.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Ok(mut data) = Arc::try_unwrap(child.0) {
                pending.append(&mut data.children);
            }
        }
    }
}

impl Subtree {
    pub fn new_leaf(
        language: &Language,
        symbol: Symbol,
        padding: Length,
        size: Length,
        lookahead_bytes: u32,
        parse_state: StateId,
        flags: LeafFlags,
    ) -> Subtree {
        let mut data = SubtreeData::blank(symbol, language);
        data.padding = padding;
        data.size = size;
        data.lookahead_bytes = lookahead_bytes;
        data.parse_state = parse_state;
        data.extra = symbol == SYMBOL_END;
        data.has_external_tokens = flags.has_external_tokens;
        data.depends_on_column = flags.depends_on_column;
        data.is_keyword = flags.is_keyword;
        Subtree(Arc::new(data))
    }

    /// A leaf covering characters no token matched.
    pub fn new_error(
        language: &Language,
        lookahead_char: Option<char>,
        padding: Length,
        size: Length,
        lookahead_bytes: u32,
        parse_state: StateId,
    ) -> Subtree {
        let mut data = SubtreeData::blank(SYMBOL_ERROR, language);
        data.padding = padding;
        data.size = size;
        data.lookahead_bytes = lookahead_bytes;
        data.parse_state = parse_state;
        data.fragile_left = true;
        data.fragile_right = true;
        data.lookahead_char = lookahead_char;
        Subtree(Arc::new(data))
    }

    /// A zero-width token inserted by recovery.
    pub fn new_missing_leaf(
        language: &Language,
        symbol: Symbol,
        padding: Length,
        lookahead_bytes: u32,
    ) -> Subtree {
        let mut data = SubtreeData::blank(symbol, language);
        data.padding = padding;
        data.lookahead_bytes = lookahead_bytes;
        data.is_missing = true;
        Subtree(Arc::new(data))
    }

    pub fn new_node(
        language: &Language,
        symbol: Symbol,
        children: Vec<Subtree>,
        production_id: u16,
    ) -> Subtree {
        let mut data = SubtreeData::blank(symbol, language);
        let fragile = symbol == SYMBOL_ERROR || symbol == SYMBOL_ERROR_REPEAT;
        data.fragile_left = fragile;
        data.fragile_right = fragile;
        data.production_id = production_id;
        data.children = children;
        data.summarize_children(language);
        Subtree(Arc::new(data))
    }

    pub fn new_error_node(language: &Language, children: Vec<Subtree>, extra: bool) -> Subtree {
        let mut node = Self::new_node(language, SYMBOL_ERROR, children, 0);
        node.make_mut().extra = extra;
        node
    }

    /// Mutable access, cloning the record first if it is shared.
    pub fn make_mut(&mut self) -> &mut SubtreeData {
        Arc::make_mut(&mut self.0)
    }

    pub fn ptr_eq(&self, other: &Subtree) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_ptr(&self) -> *const SubtreeData {
        Arc::as_ptr(&self.0)
    }

    /// Detaches the children, leaving this handle childless.
    pub fn take_children(&mut self) -> Vec<Subtree> {
        std::mem::take(&mut self.make_mut().children)
    }

    pub fn set_extra(&mut self, extra: bool) {
        if self.extra != extra {
            self.make_mut().extra = extra;
        }
    }

    /// Structural ordering used to pick between equally good parses.
    pub fn compare(&self, other: &Subtree) -> Ordering {
        let mut stack = vec![(self.clone(), other.clone())];
        while let Some((left, right)) = stack.pop() {
            let ord = left
                .symbol
                .cmp(&right.symbol)
                .then(left.children.len().cmp(&right.children.len()));
            if ord != Ordering::Equal {
                return ord;
            }
            for (l, r) in left.children.iter().zip(&right.children).rev() {
                stack.push((l.clone(), r.clone()));
            }
        }
        Ordering::Equal
    }

    /// The rightmost leaf produced by the external scanner.
    pub fn last_external_token(&self) -> Option<Subtree> {
        if !self.has_external_tokens {
            return None;
        }
        let mut tree = self.clone();
        while !tree.children.is_empty() {
            let next = tree
                .children
                .iter()
                .rev()
                .find(|c| c.has_external_tokens)
                .cloned()?;
            tree = next;
        }
        Some(tree)
    }

    /// Shifts this subtree's sizes to account for `edit` and flags every
    /// subtree the edit touches.
    pub fn edit(&mut self, edit: &InputEdit) {
        edit_subtree(
            self,
            Edit {
                start: edit.start(),
                old_end: edit.old_end(),
                new_end: edit.new_end(),
            },
        );
    }
}

/// Compares the scanner state stored on two optional external tokens.
pub fn external_scanner_state_eq(a: Option<&Subtree>, b: Option<&Subtree>) -> bool {
    fn state(token: Option<&Subtree>) -> &[u8] {
        match token {
            Some(token) => token.external_scanner_state(),
            None => &[],
        }
    }
    state(a) == state(b)
}

#[derive(Clone, Copy, Debug)]
struct Edit {
    start: Length,
    old_end: Length,
    new_end: Length,
}

fn edit_subtree(tree: &mut Subtree, mut edit: Edit) {
    let is_noop = edit.old_end.bytes == edit.start.bytes && edit.new_end.bytes == edit.start.bytes;
    let is_pure_insertion = edit.old_end.bytes == edit.start.bytes;
    let column_shifted = edit.new_end.extent.column != edit.old_end.extent.column;

    let mut size = tree.size;
    let mut padding = tree.padding;
    let total_size = padding.add(size);
    let end_byte = total_size.bytes + tree.lookahead_bytes;
    if edit.start.bytes > end_byte || (is_noop && edit.start.bytes == end_byte) {
        return;
    }

    if edit.old_end.bytes <= padding.bytes {
        // entirely inside the padding
        padding = edit.new_end.add(padding.sub(edit.old_end));
    } else if edit.start.bytes < padding.bytes {
        // starts in the padding, runs into the content
        size = size.saturating_sub(edit.old_end.sub(padding));
        padding = edit.new_end;
    } else if edit.start.bytes < total_size.bytes
        || (edit.start.bytes == total_size.bytes && is_pure_insertion)
    {
        size = edit
            .new_end
            .sub(padding)
            .add(total_size.saturating_sub(edit.old_end));
    }

    let invalidate_first_row = tree.depends_on_column && column_shifted;
    let data = tree.make_mut();
    data.padding = padding;
    data.size = size;
    data.has_changes = true;
    let padding_row = data.padding.extent.row;

    let mut child_right = Length::ZERO;
    for (i, child) in data.children.iter_mut().enumerate() {
        let child_size = child.total_size();
        let child_left = child_right;
        child_right = child_left.add(child_size);

        if child_right.bytes + child.lookahead_bytes < edit.start.bytes {
            continue;
        }

        let past_edit = child_left.bytes > edit.old_end.bytes
            || (child_left.bytes == edit.old_end.bytes && child_size.bytes > 0 && i > 0);
        if past_edit && (!invalidate_first_row || child_left.extent.row > padding_row) {
            break;
        }

        let mut child_edit = Edit {
            start: edit.start.saturating_sub(child_left),
            old_end: edit.old_end.saturating_sub(child_left),
            new_end: edit.new_end.saturating_sub(child_left),
        };

        // Inserted text belongs to the first child touching the edit; later
        // children only shrink.
        if child_right.bytes > edit.start.bytes
            || (child_right.bytes == edit.start.bytes && is_pure_insertion)
        {
            edit.new_end = edit.start;
        } else {
            child_edit.old_end = child_edit.start;
            child_edit.new_end = child_edit.start;
        }

        edit_subtree(child, child_edit);
    }
}
