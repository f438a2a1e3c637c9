use thicket_core::Point;

use crate::test_trees::call_tree;

#[test]
fn first_child_then_parent_round_trips() {
    let tree = call_tree();
    let mut cursor = tree.walk();

    assert!(cursor.goto_first_child());
    let call = cursor.node();
    assert!(cursor.goto_first_child());
    assert_eq!(cursor.depth(), 2);
    assert!(cursor.goto_parent());
    assert_eq!(cursor.node(), call);
    assert!(cursor.goto_parent());
    assert!(!cursor.goto_parent());
    assert_eq!(cursor.node(), tree.root_node());
}

#[test]
fn siblings_run_out_and_stay_put() {
    let tree = call_tree();
    let mut cursor = tree.walk();
    cursor.goto_first_child();
    cursor.goto_first_child();

    let mut kinds = vec![cursor.node().kind()];
    while cursor.goto_next_sibling() {
        kinds.push(cursor.node().kind());
    }
    assert_eq!(kinds, vec!["identifier", "(", "identifier", "identifier", ")"]);

    let last = cursor.node();
    assert!(!cursor.goto_next_sibling());
    assert!(!cursor.goto_next_sibling());
    assert_eq!(cursor.node(), last);

    assert!(cursor.goto_previous_sibling());
    assert_eq!(cursor.node().utf8_text(), Some("b"));
}

#[test]
fn failed_moves_on_leaves_are_idempotent() {
    let tree = call_tree();
    let mut cursor = tree.walk();
    cursor.goto_first_child();
    cursor.goto_last_child();

    let leaf = cursor.node();
    assert_eq!(leaf.kind(), ")");
    assert!(!cursor.goto_first_child());
    assert!(!cursor.goto_last_child());
    assert_eq!(cursor.node(), leaf);
    assert_eq!(cursor.depth(), 2);
}

#[test]
fn field_names_follow_the_cursor() {
    let tree = call_tree();
    let mut cursor = tree.walk();
    assert_eq!(cursor.current_field_name(), None);

    cursor.goto_first_child();
    cursor.goto_first_child();
    assert_eq!(cursor.current_field_name(), Some("function"));
    cursor.goto_next_sibling();
    assert_eq!(cursor.current_field_id(), None);
    cursor.goto_next_sibling();
    assert_eq!(cursor.current_field_name(), Some("argument"));
}

#[test]
fn goto_descendant_jumps_in_preorder() {
    let tree = call_tree();
    let mut cursor = tree.walk();

    assert!(cursor.goto_descendant(5));
    assert_eq!(cursor.node().utf8_text(), Some("b"));
    assert_eq!(cursor.descendant_index(), 5);
    assert_eq!(cursor.depth(), 2);
    assert!(cursor.goto_parent());
    assert_eq!(cursor.node().kind(), "call");

    assert!(cursor.goto_descendant(0));
    assert_eq!(cursor.node(), tree.root_node());

    assert!(!cursor.goto_descendant(7));
    assert_eq!(cursor.node(), tree.root_node());
}

#[test]
fn cursor_rooted_at_inner_node() {
    let tree = call_tree();
    let call = tree.root_node().child(0).unwrap();
    let mut cursor = call.walk();

    assert!(!cursor.goto_parent());
    assert!(cursor.goto_descendant(2));
    assert_eq!(cursor.node().kind(), "(");
    assert_eq!(cursor.descendant_index(), 2);
}

#[test]
fn first_child_for_position() {
    let tree = call_tree();
    let mut cursor = tree.walk();
    cursor.goto_first_child();

    let mut lookup = cursor.clone();
    assert_eq!(lookup.goto_first_child_for_byte(3), Some(3));
    assert_eq!(lookup.node().utf8_text(), Some("b"));

    let mut lookup = cursor.clone();
    assert_eq!(lookup.goto_first_child_for_point(Point::new(0, 0)), Some(0));

    assert_eq!(cursor.goto_first_child_for_byte(6), None);
    assert_eq!(cursor.node().kind(), "call");
}

#[test]
fn reset_and_reset_to() {
    let tree = call_tree();
    let mut a = tree.walk();
    a.goto_descendant(4);

    let mut b = tree.walk();
    b.reset_to(&a);
    assert_eq!(b.node(), a.node());
    assert!(b.goto_parent());
    assert_ne!(b.node(), a.node());

    b.reset(tree.root_node().child(0).unwrap());
    assert_eq!(b.depth(), 0);
    assert!(!b.goto_parent());
}
