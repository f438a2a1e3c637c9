use std::collections::HashSet;

use thicket_core::{InputEdit, Point};

use crate::test_trees::{CALL, call_tree};

#[test]
fn children_include_anonymous_tokens() {
    let tree = call_tree();
    let call = tree.root_node().child(0).unwrap();

    assert_eq!(call.kind(), "call");
    assert_eq!(call.kind_id(), CALL);
    assert_eq!(call.child_count(), 5);
    let kinds: Vec<_> = (0..call.child_count())
        .map(|i| call.child(i).unwrap().kind())
        .collect();
    assert_eq!(kinds, vec!["identifier", "(", "identifier", "identifier", ")"]);
    assert!(call.child(5).is_none());
}

#[test]
fn named_children_skip_tokens() {
    let tree = call_tree();
    let call = tree.root_node().child(0).unwrap();

    assert_eq!(call.named_child_count(), 3);
    let b = call.named_child(2).unwrap();
    assert_eq!(b.utf8_text(), Some("b"));
    assert_eq!(b.start_byte(), 4);
    assert!(call.named_child(3).is_none());

    let mut cursor = call.walk();
    let texts: Vec<_> = call
        .named_children(&mut cursor)
        .map(|n| n.utf8_text().unwrap())
        .collect();
    assert_eq!(texts, vec!["f", "a", "b"]);
}

#[test]
fn fields_resolve_through_hidden_nodes() {
    let tree = call_tree();
    let call = tree.root_node().child(0).unwrap();

    let function = call.child_by_field_name("function").unwrap();
    assert_eq!(function.utf8_text(), Some("f"));

    let arguments: Vec<_> = call
        .children_by_field_name("argument")
        .map(|n| n.utf8_text().unwrap())
        .collect();
    assert_eq!(arguments, vec!["a", "b"]);

    assert_eq!(call.field_name_for_child(0), Some("function"));
    assert_eq!(call.field_name_for_child(1), None);
    assert_eq!(call.field_name_for_child(3), Some("argument"));
    assert!(call.child_by_field_name("body").is_none());
    assert!(call.child_by_field_id(0).is_none());
}

#[test]
fn sibling_and_parent_links() {
    let tree = call_tree();
    let call = tree.root_node().child(0).unwrap();
    let paren = call.child(1).unwrap();

    assert_eq!(paren.prev_sibling(), call.child(0));
    assert_eq!(paren.next_sibling(), call.child(2));
    assert_eq!(paren.next_named_sibling().unwrap().utf8_text(), Some("a"));
    assert_eq!(paren.prev_named_sibling().unwrap().utf8_text(), Some("f"));
    assert_eq!(paren.parent(), Some(call));
    assert!(call.child(4).unwrap().next_sibling().is_none());
    assert!(call.child(0).unwrap().prev_named_sibling().is_none());
    assert!(tree.root_node().parent().is_none());
}

#[test]
fn descendant_for_range_is_minimal() {
    let tree = call_tree();
    let root = tree.root_node();

    let a = root.descendant_for_byte_range(2, 3).unwrap();
    assert_eq!(a.utf8_text(), Some("a"));

    // a boundary between two tokens prefers the following one
    let paren = root.descendant_for_byte_range(1, 1).unwrap();
    assert_eq!(paren.kind(), "(");

    let named = root.named_descendant_for_byte_range(1, 2).unwrap();
    assert_eq!(named.kind(), "call");

    let wide = root.descendant_for_byte_range(0, 3).unwrap();
    assert_eq!(wide.kind(), "call");

    let by_point = root
        .descendant_for_point_range(Point::new(0, 4), Point::new(0, 5))
        .unwrap();
    assert_eq!(by_point.utf8_text(), Some("b"));

    assert!(root.descendant_for_byte_range(3, 2).is_none());
}

#[test]
fn descendant_counts_include_self() {
    let tree = call_tree();
    let root = tree.root_node();

    assert_eq!(root.descendant_count(), 7);
    assert_eq!(root.child(0).unwrap().descendant_count(), 6);
    assert_eq!(root.child(0).unwrap().child(0).unwrap().descendant_count(), 1);
}

#[test]
fn identity_is_per_tree() {
    let first = call_tree();
    let second = call_tree();

    let mut seen = HashSet::new();
    seen.insert(first.root_node());
    seen.insert(first.root_node().child(0).unwrap());
    assert!(seen.contains(&first.clone().root_node()));
    assert!(!seen.contains(&second.root_node()));
    assert_eq!(first.root_node().id(), first.root_node().id());
    assert_ne!(first.root_node().id(), second.root_node().id());
}

#[test]
fn node_metadata() {
    let tree = call_tree();
    let root = tree.root_node();
    let f = root.child(0).unwrap().child(0).unwrap();

    assert!(f.is_named());
    assert!(!f.is_extra());
    assert!(!f.is_missing());
    assert!(!root.has_error());
    assert_eq!(f.grammar_name(), "identifier");
    assert_eq!(f.range().end_point, Point::new(0, 1));
    assert_eq!(format!("{f:?}"), "{Node identifier (0, 0) - (0, 1)}");
    assert_eq!(root.to_string(), root.to_sexp());
}

#[test]
fn edited_handle_follows_the_edit() {
    let tree = call_tree();
    let call = tree.root_node().child(0).unwrap();
    let mut f = call.child(0).unwrap();
    let mut b = call.child(3).unwrap();

    // `f(a b)` -> `fxy(a b)`
    let insertion = InputEdit {
        start_byte: 1,
        old_end_byte: 1,
        new_end_byte: 3,
        start_position: Point::new(0, 1),
        old_end_position: Point::new(0, 1),
        new_end_position: Point::new(0, 3),
    };
    f.edit(&insertion);
    b.edit(&insertion);
    assert_eq!(f.byte_range(), 0..1);
    assert_eq!(b.byte_range(), 6..7);
    assert_eq!(b.start_position(), Point::new(0, 6));
    assert_eq!(b, call.child(3).unwrap());
    assert_eq!(b.prev_sibling().unwrap().start_byte(), 2);

    // `fxy(a b)` -> `fxy(a)`
    let deletion = InputEdit {
        start_byte: 5,
        old_end_byte: 7,
        new_end_byte: 5,
        start_position: Point::new(0, 5),
        old_end_position: Point::new(0, 7),
        new_end_position: Point::new(0, 5),
    };
    b.edit(&deletion);
    assert_eq!(b.byte_range(), 5..6);
}
