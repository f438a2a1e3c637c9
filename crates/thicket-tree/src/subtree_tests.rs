use std::cmp::Ordering;

use thicket_core::{InputEdit, Length, Point, SYMBOL_ERROR, SYMBOL_ERROR_REPEAT};

use crate::subtree::{
    ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_RECOVERY, LeafFlags, Subtree, TREE_STATE_NONE,
    external_scanner_state_eq,
};
use crate::test_trees::{ARGS, CALL, IDENTIFIER, LPAREN, RPAREN, call_subtree, language, leaf};

#[test]
fn summarize_counts_visible_children_through_hidden_nodes() {
    let lang = language();
    let program = call_subtree(&lang);
    let call = &program.children[0];

    assert_eq!(call.visible_child_count, 5);
    assert_eq!(call.named_child_count, 3);
    assert_eq!(call.visible_descendant_count, 5);
    assert_eq!(program.visible_descendant_count, 6);
    assert_eq!(program.node_count, 8);
    assert_eq!(program.total_bytes(), 6);
    assert_eq!(program.first_leaf.symbol, IDENTIFIER);
    assert_eq!(program.error_cost(), 0);
}

#[test]
fn error_nodes_cost_recovery_and_skipped_input() {
    let lang = language();
    let skipped = leaf(&lang, RPAREN, 0, 1);
    let error = Subtree::new_error_node(&lang, vec![skipped], false);

    assert_eq!(error.symbol, SYMBOL_ERROR);
    assert!(error.visible);
    assert!(error.fragile_left && error.fragile_right);
    // recovery + one skipped tree + one skipped byte
    assert_eq!(error.error_cost(), 500 + 100 + 1);
}

#[test]
fn error_repeat_children_do_not_double_count() {
    let lang = language();
    let inner = Subtree::new_node(
        &lang,
        SYMBOL_ERROR_REPEAT,
        vec![leaf(&lang, RPAREN, 0, 1)],
        0,
    );
    assert_eq!(inner.error_cost(), 601);

    let outer = Subtree::new_error_node(&lang, vec![inner], false);
    // the hidden repeat contributes its visible children as skipped trees
    assert_eq!(outer.error_cost(), 500 + 100 + 1);
}

#[test]
fn missing_leaves_are_expensive() {
    let lang = language();
    let missing = Subtree::new_missing_leaf(&lang, RPAREN, Length::ZERO, 0);

    assert!(missing.is_missing);
    assert_eq!(missing.size, Length::ZERO);
    assert_eq!(
        missing.error_cost(),
        ERROR_COST_PER_MISSING_TREE + ERROR_COST_PER_RECOVERY
    );

    let call = Subtree::new_node(&lang, CALL, vec![leaf(&lang, IDENTIFIER, 0, 1), missing], 1);
    assert_eq!(call.error_cost(), 610);
}

#[test]
fn error_children_make_parents_fragile() {
    let lang = language();
    let bad = Subtree::new_error(&lang, Some('$'), Length::ZERO, Length::new(1, Point::new(0, 1)), 1, 1);
    let parent = Subtree::new_node(&lang, ARGS, vec![leaf(&lang, IDENTIFIER, 0, 1), bad], 2);

    assert!(parent.fragile_left && parent.fragile_right);
    assert_eq!(parent.parse_state, TREE_STATE_NONE);
}

#[test]
fn compare_orders_by_symbol_then_shape() {
    let lang = language();
    let a = leaf(&lang, IDENTIFIER, 0, 1);
    let b = leaf(&lang, LPAREN, 0, 1);

    assert_eq!(a.compare(&b), Ordering::Less);
    assert_eq!(call_subtree(&lang).compare(&call_subtree(&lang)), Ordering::Equal);

    let short = Subtree::new_node(&lang, ARGS, vec![a.clone()], 2);
    let long = Subtree::new_node(&lang, ARGS, vec![a.clone(), a], 2);
    assert_eq!(long.compare(&short), Ordering::Greater);
}

#[test]
fn edit_inside_a_token_resizes_it_and_flags_ancestors() {
    let lang = language();
    let mut program = call_subtree(&lang);
    let original = program.clone();

    // "f(a b)" -> "f(abc b)"
    program.edit(&InputEdit {
        start_byte: 3,
        old_end_byte: 3,
        new_end_byte: 5,
        start_position: Point::new(0, 3),
        old_end_position: Point::new(0, 3),
        new_end_position: Point::new(0, 5),
    });

    assert_eq!(program.total_bytes(), 8);
    assert!(program.has_changes);
    let call = &program.children[0];
    let args = &call.children[2];
    assert_eq!(args.children[0].size.bytes, 3);
    assert!(args.children[0].has_changes);
    // untouched leading tokens are shared, not copied
    assert!(call.children[0].ptr_eq(&original.children[0].children[0]));
    assert!(!call.children[0].has_changes);
    // the old handle is unaffected
    assert_eq!(original.total_bytes(), 6);
    assert!(!original.has_changes);
}

#[test]
fn edit_in_padding_shifts_the_token() {
    let lang = language();
    let mut token = leaf(&lang, IDENTIFIER, 2, 3);

    token.edit(&InputEdit {
        start_byte: 0,
        old_end_byte: 1,
        new_end_byte: 0,
        start_position: Point::new(0, 0),
        old_end_position: Point::new(0, 1),
        new_end_position: Point::new(0, 0),
    });

    assert_eq!(token.padding.bytes, 1);
    assert_eq!(token.size.bytes, 3);
}

#[test]
fn last_external_token_walks_to_the_rightmost_leaf() {
    let lang = language();
    let flags = LeafFlags {
        has_external_tokens: true,
        ..LeafFlags::default()
    };
    let one = Length::new(1, Point::new(0, 1));
    let external = Subtree::new_leaf(&lang, IDENTIFIER, Length::ZERO, one, 0, 1, flags);
    let tree = Subtree::new_node(&lang, ARGS, vec![external.clone(), leaf(&lang, IDENTIFIER, 0, 1)], 2);

    assert!(tree.has_external_tokens);
    let found = tree.last_external_token().unwrap();
    assert!(found.ptr_eq(&external));
    assert!(leaf(&lang, IDENTIFIER, 0, 1).last_external_token().is_none());
}

#[test]
fn external_scanner_states_compare_by_bytes() {
    let lang = language();
    let external = |state: &[u8]| {
        let mut token = Subtree::new_leaf(
            &lang,
            IDENTIFIER,
            Length::ZERO,
            Length::new(1, Point::new(0, 1)),
            1,
            1,
            LeafFlags {
                has_external_tokens: true,
                ..LeafFlags::default()
            },
        );
        token.make_mut().external_scanner_state = Some(state.into());
        token
    };
    let open = external(b"\x01");
    let same = external(b"\x01");
    let other = external(b"\x02");
    let blank = external(b"");

    assert!(external_scanner_state_eq(Some(&open), Some(&same)));
    assert!(!external_scanner_state_eq(Some(&open), Some(&other)));
    assert!(!external_scanner_state_eq(Some(&open), None));
    assert!(external_scanner_state_eq(Some(&blank), None));
    assert!(external_scanner_state_eq(None, None));
}

#[test]
fn dropping_deep_chains_does_not_recurse() {
    let lang = language();
    let mut tree = leaf(&lang, IDENTIFIER, 0, 1);
    for _ in 0..200_000 {
        tree = Subtree::new_node(&lang, ARGS, vec![tree], 2);
    }
    drop(tree);
}
