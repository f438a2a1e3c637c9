use thicket_core::{FieldId, Length, Point};

use crate::node::Node;
use crate::tree::Tree;

/// Stateful walker over the nodes below one root.
///
/// Every `goto_*` method reports whether it moved; a failed move leaves
/// the cursor where it was.
#[derive(Clone)]
pub struct TreeCursor<'tree> {
    tree: &'tree Tree,
    offset: Length,
    /// Arena indices from the cursor root to the current node.
    stack: Vec<u32>,
}

impl<'tree> TreeCursor<'tree> {
    pub fn new(node: Node<'tree>) -> Self {
        Self {
            tree: node.tree(),
            offset: node.offset(),
            stack: vec![node.index()],
        }
    }

    #[inline]
    fn current(&self) -> u32 {
        self.stack[self.stack.len() - 1]
    }

    #[inline]
    fn root(&self) -> u32 {
        self.stack[0]
    }

    pub fn node(&self) -> Node<'tree> {
        Node::new(self.tree, self.current(), self.offset)
    }

    pub fn current_field_id(&self) -> Option<FieldId> {
        if self.stack.len() < 2 {
            return None;
        }
        let id = self.tree.arena().entry(self.current()).field_id;
        (id != 0).then_some(id)
    }

    pub fn current_field_name(&self) -> Option<&'tree str> {
        self.current_field_id()
            .and_then(|id| self.tree.language().field_name_for_id(id))
    }

    /// Depth below the cursor root.
    pub fn depth(&self) -> u32 {
        (self.stack.len() - 1) as u32
    }

    /// Pre-order index of the current node, counted from the cursor root.
    pub fn descendant_index(&self) -> usize {
        (self.current() - self.root()) as usize
    }

    pub fn goto_first_child(&mut self) -> bool {
        match self.tree.arena().children_of(self.current()).first() {
            Some(&c) => {
                self.stack.push(c);
                true
            }
            None => false,
        }
    }

    pub fn goto_last_child(&mut self) -> bool {
        match self.tree.arena().children_of(self.current()).last() {
            Some(&c) => {
                self.stack.push(c);
                true
            }
            None => false,
        }
    }

    pub fn goto_parent(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    fn goto_sibling(&mut self, forward: bool) -> bool {
        let n = self.stack.len();
        if n < 2 {
            return false;
        }
        let arena = self.tree.arena();
        let siblings = arena.children_of(self.stack[n - 2]);
        let i = arena.entry(self.current()).child_index as usize;
        let next = if forward {
            siblings.get(i + 1)
        } else {
            i.checked_sub(1).and_then(|j| siblings.get(j))
        };
        match next {
            Some(&s) => {
                self.stack[n - 1] = s;
                true
            }
            None => false,
        }
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        self.goto_sibling(true)
    }

    pub fn goto_previous_sibling(&mut self) -> bool {
        self.goto_sibling(false)
    }

    /// Moves to the first child ending after `byte`, returning its index.
    pub fn goto_first_child_for_byte(&mut self, byte: u32) -> Option<usize> {
        let offset = self.offset;
        self.goto_first_child_where(|end| offset.add(end).bytes > byte)
    }

    /// Moves to the first child ending after `point`, returning its index.
    pub fn goto_first_child_for_point(&mut self, point: Point) -> Option<usize> {
        let offset = self.offset;
        self.goto_first_child_where(|end| offset.add(end).extent > point)
    }

    fn goto_first_child_where(&mut self, past: impl Fn(Length) -> bool) -> Option<usize> {
        let arena = self.tree.arena();
        let (i, &c) = arena
            .children_of(self.current())
            .iter()
            .enumerate()
            .find(|&(_, &c)| past(arena.entry(c).end()))?;
        self.stack.push(c);
        Some(i)
    }

    /// Jumps to the node with the given pre-order index below the cursor
    /// root, skipping whole subtrees on the way.
    pub fn goto_descendant(&mut self, index: usize) -> bool {
        let arena = self.tree.arena();
        let root = self.root();
        let target = root as usize + index;
        if target >= arena.entry(root).descendant_end as usize {
            return false;
        }
        let target = target as u32;

        self.stack.truncate(1);
        let mut current = root;
        while current != target {
            let next = arena
                .children_of(current)
                .iter()
                .copied()
                .find(|&c| c <= target && target < arena.entry(c).descendant_end);
            match next {
                Some(c) => {
                    self.stack.push(c);
                    current = c;
                }
                None => break,
            }
        }
        true
    }

    /// Re-roots the cursor at `node`, reusing the frame buffer.
    pub fn reset(&mut self, node: Node<'tree>) {
        self.tree = node.tree();
        self.offset = node.offset();
        self.stack.clear();
        self.stack.push(node.index());
    }

    /// Copies another cursor's position.
    pub fn reset_to(&mut self, other: &TreeCursor<'tree>) {
        self.tree = other.tree;
        self.offset = other.offset;
        self.stack.clear();
        self.stack.extend_from_slice(&other.stack);
    }
}
