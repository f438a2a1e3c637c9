use std::borrow::Cow;

use thicket_tree::Node;

/// Supplies node text to text predicates.
///
/// Returning `None` means the text is not available; the match that needed
/// it is dropped rather than reported.
pub trait TextProvider<'tree> {
    fn node_text(&mut self, node: Node<'tree>) -> Option<Cow<'tree, [u8]>>;
}

/// Reads the text a tree retained at parse time. Edited trees have none.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeText;

impl<'tree> TextProvider<'tree> for TreeText {
    fn node_text(&mut self, node: Node<'tree>) -> Option<Cow<'tree, [u8]>> {
        node.text().map(Cow::Borrowed)
    }
}

impl<'tree, 'src: 'tree> TextProvider<'tree> for &'src [u8] {
    fn node_text(&mut self, node: Node<'tree>) -> Option<Cow<'tree, [u8]>> {
        self.get(node.byte_range()).map(Cow::Borrowed)
    }
}

impl<'tree, 'src: 'tree> TextProvider<'tree> for &'src str {
    fn node_text(&mut self, node: Node<'tree>) -> Option<Cow<'tree, [u8]>> {
        self.as_bytes().get(node.byte_range()).map(Cow::Borrowed)
    }
}

/// Never has text, so every text predicate drops its match.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoText;

impl<'tree> TextProvider<'tree> for NoText {
    fn node_text(&mut self, _node: Node<'tree>) -> Option<Cow<'tree, [u8]>> {
        None
    }
}
