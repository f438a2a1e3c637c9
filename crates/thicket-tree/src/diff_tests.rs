use std::sync::Arc;

use thicket_core::{InputEdit, Length, Point, Range};

use crate::subtree::Subtree;
use crate::test_trees::{
    ARGS, ARGS_PRODUCTION, CALL, CALL_PRODUCTION, IDENTIFIER, LPAREN, PROGRAM, RPAREN,
    call_tree, language, leaf,
};
use crate::Tree;

fn edit(start: u32, old_end: u32, new_end: u32) -> InputEdit {
    InputEdit {
        start_byte: start,
        old_end_byte: old_end,
        new_end_byte: new_end,
        start_position: Point::new(0, start),
        old_end_position: Point::new(0, old_end),
        new_end_position: Point::new(0, new_end),
    }
}

/// `f(<first> <second>)` where the argument tokens are given.
fn call_with_args(first: Subtree, second: Subtree) -> Tree {
    let lang = language();
    let args = Subtree::new_node(&lang, ARGS, vec![first, second], ARGS_PRODUCTION);
    let call = Subtree::new_node(
        &lang,
        CALL,
        vec![
            leaf(&lang, IDENTIFIER, 0, 1),
            leaf(&lang, LPAREN, 0, 1),
            args,
            leaf(&lang, RPAREN, 0, 1),
        ],
        CALL_PRODUCTION,
    );
    let root = Subtree::new_node(&lang, PROGRAM, vec![call], 0);
    Tree::new(root, lang, vec![Range::EVERYTHING], None)
}

#[test]
fn same_structure_reports_nothing() {
    let mut old = call_tree();
    old.edit(&edit(3, 3, 5));

    let lang = language();
    let new = call_with_args(leaf(&lang, IDENTIFIER, 0, 3), leaf(&lang, IDENTIFIER, 1, 1));

    assert!(old.changed_ranges(&new).is_empty());
}

#[test]
fn replaced_token_kind_is_reported() {
    let mut old = call_tree();
    old.edit(&edit(4, 5, 5));

    let lang = language();
    let one = Length::new(1, Point::new(0, 1));
    let error = Subtree::new_error(&lang, Some('$'), one, one, 1, 1);
    let new = call_with_args(leaf(&lang, IDENTIFIER, 0, 1), error);

    let ranges = old.changed_ranges(&new);
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].byte_range(), 4..5);
    assert_eq!(ranges[0].start_point, Point::new(0, 4));
}

#[test]
fn moved_token_is_reported() {
    let mut old = call_tree();
    // "f(a b)" -> "f(a  b)"
    old.edit(&edit(3, 3, 4));

    let lang = language();
    let new = call_with_args(leaf(&lang, IDENTIFIER, 0, 1), leaf(&lang, IDENTIFIER, 2, 1));

    // the edit grew `a` to 2..4 in the old tree; only the inserted byte
    // changed meaning, it is padding before `b` now
    let ranges: Vec<_> = old
        .changed_ranges(&new)
        .iter()
        .map(Range::byte_range)
        .collect();
    assert_eq!(ranges, vec![3..4]);
}

#[test]
fn appended_sibling_is_reported() {
    let lang = language();
    let old = Tree::new(
        Subtree::new_node(
            &lang,
            PROGRAM,
            vec![Subtree::new_node(
                &lang,
                CALL,
                vec![
                    leaf(&lang, IDENTIFIER, 0, 1),
                    leaf(&lang, LPAREN, 0, 1),
                    leaf(&lang, RPAREN, 0, 1),
                ],
                0,
            )],
            0,
        ),
        lang.clone(),
        vec![Range::EVERYTHING],
        None,
    );
    // "f()" -> "f() g"
    let new = Tree::new(
        Subtree::new_node(
            &lang,
            PROGRAM,
            vec![
                Subtree::new_node(
                    &lang,
                    CALL,
                    vec![
                        leaf(&lang, IDENTIFIER, 0, 1),
                        leaf(&lang, LPAREN, 0, 1),
                        leaf(&lang, RPAREN, 0, 1),
                    ],
                    0,
                ),
                leaf(&lang, IDENTIFIER, 1, 1),
            ],
            0,
        ),
        lang,
        vec![Range::EVERYTHING],
        None,
    );

    let ranges: Vec<_> = old
        .changed_ranges(&new)
        .iter()
        .map(Range::byte_range)
        .collect();
    assert_eq!(ranges, vec![3..5]);
}

#[test]
fn included_range_changes_are_reported() {
    let lang = language();
    let old = Tree::new(
        crate::test_trees::call_subtree(&lang),
        lang.clone(),
        vec![Range::new(0, 6, Point::new(0, 0), Point::new(0, 6))],
        Some(Arc::from(&b"f(a b)"[..])),
    );
    let new = Tree::new(
        crate::test_trees::call_subtree(&lang),
        lang,
        vec![Range::new(0, 3, Point::new(0, 0), Point::new(0, 3))],
        None,
    );

    let ranges = old.changed_ranges(&new);
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].byte_range(), 0..6);
}

#[test]
fn identical_trees_have_no_changes() {
    let a = call_tree();
    let b = call_tree();

    assert!(a.changed_ranges(&b).is_empty());
    assert!(a.changed_ranges(&a).is_empty());
}
