//! Lightweight node handles.
//!
//! A [`Node`] is a borrowed view: a tree reference, an arena index and the
//! offset the tree was rooted at. It is `Copy` and never allocates.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str;

use thicket_core::{FieldId, InputEdit, Length, Point, Range, SYMBOL_ERROR, StateId, Symbol};

use crate::arena::{Arena, Entry};
use crate::cursor::TreeCursor;
use crate::render;
use crate::subtree::TREE_STATE_NONE;
use crate::tree::Tree;

#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    index: u32,
    offset: Length,
    /// Start position after [`Node::edit`]; navigation drops it.
    moved: Option<Length>,
}

impl<'tree> Node<'tree> {
    pub(crate) fn new(tree: &'tree Tree, index: u32, offset: Length) -> Self {
        Self {
            tree,
            index,
            offset,
            moved: None,
        }
    }

    #[inline]
    pub(crate) fn arena(&self) -> &'tree Arena {
        self.tree.arena()
    }

    #[inline]
    pub(crate) fn entry(&self) -> &'tree Entry {
        self.tree.arena().entry(self.index)
    }

    #[inline]
    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub(crate) fn offset(&self) -> Length {
        self.offset
    }

    #[inline]
    fn at(&self, index: u32) -> Node<'tree> {
        Node::new(self.tree, index, self.offset)
    }

    pub fn tree(&self) -> &'tree Tree {
        self.tree
    }

    /// Unique among the live nodes of one tree.
    pub fn id(&self) -> usize {
        self.entry() as *const Entry as usize
    }

    /// Public symbol id, after aliasing.
    pub fn kind_id(&self) -> Symbol {
        self.tree.language().public_symbol(self.entry().symbol)
    }

    pub fn kind(&self) -> &'tree str {
        self.tree
            .language()
            .node_kind_for_id(self.entry().symbol)
            .unwrap_or("")
    }

    /// Symbol as the grammar produced it, ignoring aliases.
    pub fn grammar_id(&self) -> Symbol {
        self.entry().subtree.symbol
    }

    pub fn grammar_name(&self) -> &'tree str {
        self.tree
            .language()
            .node_kind_for_id(self.grammar_id())
            .unwrap_or("")
    }

    pub fn is_named(&self) -> bool {
        self.entry().named
    }

    pub fn is_extra(&self) -> bool {
        self.entry().subtree.extra
    }

    pub fn is_error(&self) -> bool {
        self.entry().symbol == SYMBOL_ERROR
    }

    pub fn is_missing(&self) -> bool {
        self.entry().subtree.is_missing
    }

    pub fn has_error(&self) -> bool {
        self.entry().subtree.error_cost() > 0
    }

    pub fn has_changes(&self) -> bool {
        self.entry().subtree.has_changes
    }

    pub fn parse_state(&self) -> StateId {
        self.entry().subtree.parse_state
    }

    pub fn next_parse_state(&self) -> StateId {
        let state = self.parse_state();
        if state == TREE_STATE_NONE {
            return TREE_STATE_NONE;
        }
        self.tree.language().next_state(state, self.grammar_id())
    }

    fn start(&self) -> Length {
        self.moved.unwrap_or_else(|| self.offset.add(self.entry().start))
    }

    fn end(&self) -> Length {
        self.start().add(self.entry().subtree.size)
    }

    /// Moves this handle to where its node lands after `edit`.
    ///
    /// Only this handle changes. Nodes reached from it, and the tree
    /// itself, keep their positions until the tree is edited too.
    pub fn edit(&mut self, edit: &InputEdit) {
        self.moved = Some(edit.apply(self.start()));
    }

    pub fn start_byte(&self) -> u32 {
        self.start().bytes
    }

    pub fn end_byte(&self) -> u32 {
        self.end().bytes
    }

    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.start_byte() as usize..self.end_byte() as usize
    }

    pub fn start_position(&self) -> Point {
        self.start().extent
    }

    pub fn end_position(&self) -> Point {
        self.end().extent
    }

    pub fn range(&self) -> Range {
        let (start, end) = (self.start(), self.end());
        Range::new(start.bytes, end.bytes, start.extent, end.extent)
    }

    pub fn child_count(&self) -> usize {
        self.arena().children_of(self.index).len()
    }

    pub fn child(&self, i: usize) -> Option<Node<'tree>> {
        self.arena()
            .children_of(self.index)
            .get(i)
            .map(|&c| self.at(c))
    }

    pub fn named_child_count(&self) -> usize {
        let arena = self.arena();
        arena
            .children_of(self.index)
            .iter()
            .filter(|&&c| arena.entry(c).named)
            .count()
    }

    pub fn named_child(&self, i: usize) -> Option<Node<'tree>> {
        let arena = self.arena();
        arena
            .children_of(self.index)
            .iter()
            .filter(|&&c| arena.entry(c).named)
            .nth(i)
            .map(|&c| self.at(c))
    }

    /// Iterates the children, repositioning `cursor` on the way.
    pub fn children<'cursor>(
        &self,
        cursor: &'cursor mut TreeCursor<'tree>,
    ) -> impl ExactSizeIterator<Item = Node<'tree>> + 'cursor {
        cursor.reset(*self);
        cursor.goto_first_child();
        let count = self.child_count();
        (0..count).map(move |_| {
            let node = cursor.node();
            cursor.goto_next_sibling();
            node
        })
    }

    pub fn named_children<'cursor>(
        &self,
        cursor: &'cursor mut TreeCursor<'tree>,
    ) -> impl Iterator<Item = Node<'tree>> + 'cursor {
        self.children(cursor).filter(|n| n.is_named())
    }

    pub fn child_by_field_id(&self, field_id: FieldId) -> Option<Node<'tree>> {
        if field_id == 0 {
            return None;
        }
        let arena = self.arena();
        arena
            .children_of(self.index)
            .iter()
            .find(|&&c| arena.entry(c).field_id == field_id)
            .map(|&c| self.at(c))
    }

    pub fn child_by_field_name(&self, name: &str) -> Option<Node<'tree>> {
        let id = self.tree.language().field_id_for_name(name)?;
        self.child_by_field_id(id)
    }

    pub fn children_by_field_id(&self, field_id: FieldId) -> impl Iterator<Item = Node<'tree>> {
        let arena = self.arena();
        let node = *self;
        arena
            .children_of(self.index)
            .iter()
            .filter(move |&&c| field_id != 0 && arena.entry(c).field_id == field_id)
            .map(move |&c| node.at(c))
    }

    pub fn children_by_field_name(&self, name: &str) -> impl Iterator<Item = Node<'tree>> {
        let id = self.tree.language().field_id_for_name(name).unwrap_or(0);
        self.children_by_field_id(id)
    }

    pub fn field_name_for_child(&self, i: usize) -> Option<&'tree str> {
        let child = self.child(i)?;
        self.tree
            .language()
            .field_name_for_id(child.entry().field_id)
    }

    pub fn parent(&self) -> Option<Node<'tree>> {
        self.entry().parent.map(|p| self.at(p))
    }

    fn sibling(&self, delta: isize) -> Option<Node<'tree>> {
        let parent = self.entry().parent?;
        let siblings = self.arena().children_of(parent);
        let i = (self.entry().child_index as isize).checked_add(delta)?;
        usize::try_from(i)
            .ok()
            .and_then(|i| siblings.get(i))
            .map(|&c| self.at(c))
    }

    fn named_sibling(&self, forward: bool) -> Option<Node<'tree>> {
        let parent = self.entry().parent?;
        let arena = self.arena();
        let siblings = arena.children_of(parent);
        let i = self.entry().child_index as usize;
        let found = if forward {
            siblings[i + 1..].iter().find(|&&c| arena.entry(c).named)
        } else {
            siblings[..i].iter().rev().find(|&&c| arena.entry(c).named)
        };
        found.map(|&c| self.at(c))
    }

    pub fn next_sibling(&self) -> Option<Node<'tree>> {
        self.sibling(1)
    }

    pub fn prev_sibling(&self) -> Option<Node<'tree>> {
        self.sibling(-1)
    }

    pub fn next_named_sibling(&self) -> Option<Node<'tree>> {
        self.named_sibling(true)
    }

    pub fn prev_named_sibling(&self) -> Option<Node<'tree>> {
        self.named_sibling(false)
    }

    /// Number of nodes in this subtree, itself included.
    pub fn descendant_count(&self) -> usize {
        (self.entry().descendant_end - self.index) as usize
    }

    /// Smallest node spanning `start..end`.
    pub fn descendant_for_byte_range(&self, start: u32, end: u32) -> Option<Node<'tree>> {
        self.descend(start, end, |n| (n.start_byte(), n.end_byte()), true)
    }

    pub fn named_descendant_for_byte_range(&self, start: u32, end: u32) -> Option<Node<'tree>> {
        self.descend(start, end, |n| (n.start_byte(), n.end_byte()), false)
    }

    pub fn descendant_for_point_range(&self, start: Point, end: Point) -> Option<Node<'tree>> {
        self.descend(start, end, |n| (n.start_position(), n.end_position()), true)
    }

    pub fn named_descendant_for_point_range(
        &self,
        start: Point,
        end: Point,
    ) -> Option<Node<'tree>> {
        self.descend(start, end, |n| (n.start_position(), n.end_position()), false)
    }

    fn descend<T: Ord + Copy>(
        &self,
        range_start: T,
        range_end: T,
        span: impl Fn(&Node<'tree>) -> (T, T),
        include_anonymous: bool,
    ) -> Option<Node<'tree>> {
        if range_start > range_end {
            return None;
        }
        let mut node = *self;
        let mut last_relevant = *self;

        'descend: loop {
            for &c in self.arena().children_of(node.index) {
                let child = self.at(c);
                let (child_start, child_end) = span(&child);
                if child_end < range_end {
                    continue;
                }
                // a child ending exactly at the range start only counts when it is empty
                let too_early = if child_start == child_end {
                    child_end < range_start
                } else {
                    child_end <= range_start
                };
                if too_early {
                    continue;
                }
                if range_start < child_start {
                    break;
                }
                node = child;
                if include_anonymous || node.is_named() {
                    last_relevant = node;
                }
                continue 'descend;
            }
            return Some(last_relevant);
        }
    }

    /// The node's slice of the tree's retained text.
    pub fn text(&self) -> Option<&'tree [u8]> {
        let entry = self.entry();
        let start = entry.start.bytes as usize;
        let end = entry.end().bytes as usize;
        self.tree.text().and_then(|t| t.get(start..end))
    }

    pub fn utf8_text(&self) -> Option<&'tree str> {
        self.text().and_then(|t| str::from_utf8(t).ok())
    }

    pub fn to_sexp(&self) -> String {
        render::to_sexp(*self)
    }

    pub fn walk(&self) -> TreeCursor<'tree> {
        TreeCursor::new(*self)
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.tree.identity() == other.tree.identity() && self.index == other.index
    }
}

impl Eq for Node<'_> {}

impl Hash for Node<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tree.identity().hash(state);
        self.index.hash(state);
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Node {} {} - {}}}",
            self.kind(),
            self.start_position(),
            self.end_position()
        )
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sexp())
    }
}
