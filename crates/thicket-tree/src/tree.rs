use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};

use thicket_core::{InputEdit, Language, Length, Point, Range};

use crate::arena::Arena;
use crate::cursor::TreeCursor;
use crate::diff;
use crate::node::Node;
use crate::render;
use crate::subtree::Subtree;

/// A finished syntax tree.
///
/// Cloning is O(1); clones share storage and compare their nodes equal.
/// [`Tree::edit`] detaches the edited handle from its clones.
#[derive(Clone)]
pub struct Tree(Arc<TreeInner>);

struct TreeInner {
    root: Subtree,
    language: Language,
    included_ranges: Vec<Range>,
    text: Option<Arc<[u8]>>,
    arena: OnceLock<Arena>,
}

impl Tree {
    pub fn new(
        root: Subtree,
        language: Language,
        included_ranges: Vec<Range>,
        text: Option<Arc<[u8]>>,
    ) -> Self {
        Self(Arc::new(TreeInner {
            root,
            language,
            included_ranges,
            text,
            arena: OnceLock::new(),
        }))
    }

    pub fn root_subtree(&self) -> &Subtree {
        &self.0.root
    }

    pub fn language(&self) -> &Language {
        &self.0.language
    }

    pub fn included_ranges(&self) -> &[Range] {
        &self.0.included_ranges
    }

    /// The source the tree was parsed from, unless it was edited since.
    pub fn text(&self) -> Option<&[u8]> {
        self.0.text.as_deref()
    }

    pub(crate) fn arena(&self) -> &Arena {
        self.0
            .arena
            .get_or_init(|| Arena::build(&self.0.root, &self.0.language))
    }

    pub(crate) fn identity(&self) -> *const () {
        Arc::as_ptr(&self.0).cast()
    }

    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, 0, Length::ZERO)
    }

    /// The root node, reporting positions as if the tree started at
    /// `(bytes, point)` of an enclosing document.
    pub fn root_node_with_offset(&self, bytes: u32, point: Point) -> Node<'_> {
        Node::new(self, 0, Length::new(bytes, point))
    }

    pub fn walk(&self) -> TreeCursor<'_> {
        self.root_node().walk()
    }

    /// Shifts the tree to match an edit of its source text.
    ///
    /// Only stored offsets change; nothing is re-lexed. The retained text
    /// is dropped since it no longer matches the document.
    pub fn edit(&mut self, edit: &InputEdit) {
        let mut root = self.0.root.clone();
        root.edit(edit);
        let included_ranges = self
            .0
            .included_ranges
            .iter()
            .map(|r| edit_range(*r, edit))
            .collect();
        tracing::trace!(
            start = edit.start_byte,
            old_end = edit.old_end_byte,
            new_end = edit.new_end_byte,
            "edit tree"
        );
        self.0 = Arc::new(TreeInner {
            root,
            language: self.0.language.clone(),
            included_ranges,
            text: None,
            arena: OnceLock::new(),
        });
    }

    /// Ranges whose syntactic structure differs between this (edited) tree
    /// and `new`, which should have been parsed from this one.
    pub fn changed_ranges(&self, new: &Tree) -> Vec<Range> {
        diff::changed_ranges(self, new)
    }

    /// Writes the subtree structure in graphviz DOT syntax.
    pub fn print_dot_graph(&self, out: &mut dyn io::Write) -> io::Result<()> {
        render::write_dot_graph(self, out)
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Tree {}}}", self.root_node())
    }
}

fn edit_range(mut range: Range, edit: &InputEdit) -> Range {
    if range.end_byte >= edit.old_end_byte {
        if range.end_byte != u32::MAX {
            let end = edit.new_end().add(range.end().sub(edit.old_end()));
            if end.bytes < edit.new_end_byte {
                range.end_byte = u32::MAX;
                range.end_point = Point::MAX;
            } else {
                range.end_byte = end.bytes;
                range.end_point = end.extent;
            }
        }
    } else if range.end_byte > edit.start_byte {
        range.end_byte = edit.start_byte;
        range.end_point = edit.start_position;
    }

    if range.start_byte >= edit.old_end_byte {
        let start = edit.new_end().add(range.start().sub(edit.old_end()));
        if start.bytes < edit.new_end_byte {
            range.start_byte = u32::MAX;
            range.start_point = Point::MAX;
        } else {
            range.start_byte = start.bytes;
            range.start_point = start.extent;
        }
    } else if range.start_byte > edit.start_byte {
        range.start_byte = edit.start_byte;
        range.start_point = edit.start_position;
    }
    range
}
