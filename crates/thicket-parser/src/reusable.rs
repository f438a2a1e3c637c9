//! Pre-order walk over the previous tree, offering subtrees for reuse.

use thicket_tree::Subtree;

struct Entry {
    tree: Subtree,
    child_index: usize,
    byte_offset: u32,
}

#[derive(Default)]
pub(crate) struct ReusableNode {
    stack: Vec<Entry>,
    pub last_external_token: Option<Subtree>,
}

impl ReusableNode {
    pub fn clear(&mut self) {
        self.stack.clear();
        self.last_external_token = None;
    }

    /// Starts at the root's first child. The root itself is never offered:
    /// accepting wraps it with the end token and surrounding extras.
    pub fn reset(&mut self, root: Subtree) {
        self.clear();
        self.stack.push(Entry {
            tree: root,
            child_index: 0,
            byte_offset: 0,
        });
        if !self.descend() {
            self.clear();
        }
    }

    pub fn tree(&self) -> Option<&Subtree> {
        self.stack.last().map(|e| &e.tree)
    }

    pub fn byte_offset(&self) -> u32 {
        self.stack.last().map_or(u32::MAX, |e| e.byte_offset)
    }

    /// Moves to the next subtree that starts after the current one ends.
    pub fn advance(&mut self) {
        let Some(last) = self.stack.last() else {
            return;
        };
        let byte_offset = last.byte_offset + last.tree.total_bytes();
        if last.tree.has_external_tokens {
            self.last_external_token = last.tree.last_external_token();
        }

        loop {
            let Some(popped) = self.stack.pop() else {
                return;
            };
            let next_index = popped.child_index + 1;
            let Some(parent) = self.stack.last() else {
                return;
            };
            if let Some(next) = parent.tree.children.get(next_index) {
                let tree = next.clone();
                self.stack.push(Entry {
                    tree,
                    child_index: next_index,
                    byte_offset,
                });
                return;
            }
        }
    }

    /// Moves to the first child of the current subtree, if it has one.
    pub fn descend(&mut self) -> bool {
        let Some(last) = self.stack.last() else {
            return false;
        };
        let Some(first) = last.tree.children.first() else {
            return false;
        };
        let entry = Entry {
            tree: first.clone(),
            child_index: 0,
            byte_offset: last.byte_offset,
        };
        self.stack.push(entry);
        true
    }

    pub fn advance_past_leaf(&mut self) {
        while self.descend() {}
        self.advance();
    }
}
