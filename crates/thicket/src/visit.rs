//! Pre-order tree visitor built on [`TreeCursor`].
//!
//! # Usage
//!
//! Implement `Visitor` and override the hooks you need. Returning `false`
//! from a hook skips the node's subtree; the walk continues with its next
//! sibling.
//!
//! ```
//! use thicket::Parser;
//! use thicket::visit::{Visitor, walk};
//!
//! struct Kinds(Vec<String>);
//!
//! impl<'tree> Visitor<'tree> for Kinds {
//!     fn visit_node(&mut self, node: thicket::Node<'tree>) -> bool {
//!         self.0.push(node.kind().to_owned());
//!         true
//!     }
//! }
//!
//! let mut parser = Parser::new(thicket::langs::arithmetic());
//! let tree = parser.parse("1+2", None).unwrap().tree().unwrap();
//! let mut kinds = Kinds(Vec::new());
//! walk(tree.root_node(), &mut kinds);
//! assert_eq!(kinds.0, ["expr", "num", "plus", "num"]);
//! ```

use thicket_tree::{Node, TreeCursor};

pub trait Visitor<'tree> {
    /// Called for every node that is not an error node.
    fn visit_node(&mut self, _node: Node<'tree>) -> bool {
        true
    }

    /// Called for `ERROR` nodes instead of [`Visitor::visit_node`].
    fn visit_error(&mut self, node: Node<'tree>) -> bool {
        self.visit_node(node)
    }
}

/// Visits `root` and its descendants in pre-order.
pub fn walk<'tree, V: Visitor<'tree> + ?Sized>(root: Node<'tree>, visitor: &mut V) {
    let mut cursor = TreeCursor::new(root);
    loop {
        let node = cursor.node();
        let descend = if node.is_error() {
            visitor.visit_error(node)
        } else {
            visitor.visit_node(node)
        };
        if descend && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}
