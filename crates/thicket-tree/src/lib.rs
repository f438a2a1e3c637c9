#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Syntax trees produced by the thicket parser.
//!
//! Storage is a persistent structure of reference-counted [`Subtree`]s.
//! Navigation goes through a per-tree pre-order index of the visible nodes,
//! built on first use, so [`Node`] handles are plain `(tree, index, offset)`
//! values and parent links never form reference cycles.

mod arena;
mod cursor;
mod diff;
mod node;
mod render;
pub mod subtree;
mod tree;

#[cfg(test)]
mod test_trees;
#[cfg(test)]
mod cursor_tests;
#[cfg(test)]
mod diff_tests;
#[cfg(test)]
mod node_tests;
#[cfg(test)]
mod subtree_tests;
#[cfg(test)]
mod tree_tests;

pub use cursor::TreeCursor;
pub use node::Node;
pub use render::{escape_dot, write_subtree_dot_graph};
pub use subtree::{LeafFlags, Subtree, SubtreeData, TREE_STATE_NONE};
pub use tree::Tree;
