use insta::assert_snapshot;
use thicket_core::{InputEdit, Point, Range};

use crate::test_trees::call_tree;

#[test]
fn sexp_shows_named_nodes_and_fields() {
    let tree = call_tree();

    assert_snapshot!(
        tree.root_node().to_sexp(),
        @"(program (call function: (identifier) argument: (identifier) argument: (identifier)))"
    );
}

#[test]
fn clones_share_nodes() {
    let tree = call_tree();
    let copy = tree.clone();

    assert_eq!(tree.root_node(), copy.root_node());
    assert_eq!(copy.text(), Some(&b"f(a b)"[..]));
}

#[test]
fn edit_detaches_text_and_identity() {
    let tree = call_tree();
    let mut edited = tree.clone();
    edited.edit(&InputEdit {
        start_byte: 0,
        old_end_byte: 0,
        new_end_byte: 2,
        start_position: Point::new(0, 0),
        old_end_position: Point::new(0, 0),
        new_end_position: Point::new(0, 2),
    });

    assert_eq!(edited.text(), None);
    assert_ne!(edited.root_node(), tree.root_node());
    assert!(edited.root_node().has_changes());
    assert_eq!(edited.root_node().end_byte(), 8);
    assert_eq!(tree.root_node().end_byte(), 6);
}

#[test]
fn edit_adjusts_included_ranges() {
    let lang = crate::test_trees::language();
    let root = crate::test_trees::call_subtree(&lang);
    let mut tree = crate::Tree::new(
        root,
        lang,
        vec![
            Range::new(0, 2, Point::new(0, 0), Point::new(0, 2)),
            Range::new(4, 6, Point::new(0, 4), Point::new(0, 6)),
        ],
        None,
    );

    // delete bytes 1..3
    tree.edit(&InputEdit {
        start_byte: 1,
        old_end_byte: 3,
        new_end_byte: 1,
        start_position: Point::new(0, 1),
        old_end_position: Point::new(0, 3),
        new_end_position: Point::new(0, 1),
    });

    let ranges: Vec<_> = tree
        .included_ranges()
        .iter()
        .map(|r| (r.start_byte, r.end_byte))
        .collect();
    assert_eq!(ranges, vec![(0, 1), (2, 4)]);
}

#[test]
fn root_offset_shifts_reported_positions() {
    let tree = call_tree();
    let root = tree.root_node_with_offset(10, Point::new(2, 4));

    assert_eq!(root.start_byte(), 10);
    assert_eq!(root.end_byte(), 16);
    assert_eq!(root.start_position(), Point::new(2, 4));
    assert_eq!(root.end_position(), Point::new(2, 10));
    // text is still indexed by the original offsets
    assert_eq!(root.utf8_text(), Some("f(a b)"));
}

#[test]
fn dot_graph_lists_every_subtree() {
    let tree = call_tree();
    let mut out = Vec::new();
    tree.print_dot_graph(&mut out).unwrap();
    let dot = String::from_utf8(out).unwrap();

    assert!(dot.starts_with("digraph tree {\nedge [arrowhead=none]\n"));
    assert!(dot.contains("tree_0 [label=\"program\""));
    assert!(dot.contains("tree_4 [label=\"_args\", style=dashed"));
    assert!(dot.contains("tree_1 -> tree_3"));
    assert_eq!(dot.matches(" -> ").count(), 7);
    assert!(dot.ends_with("}\n"));
}
